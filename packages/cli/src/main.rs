use anyhow::{anyhow, Context, Result};
use autocompounder::{
    engine::next_eligible_round, AutocompounderError, Autocompounder, BackendConfig, CreateArgs,
    FeeSchedule, Invocation, PoolConfig, PoolState, PoolStatus, SimulatedBackend, Transfer,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::{hash::hash, pubkey::Pubkey};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// ─── Defaults ─────────────────────────────────────────────────────────────────

/// Host minimum transaction fee, in native units
const DEFAULT_MIN_TX_FEE: u64 = 1_000;
/// Entries printed by `next-compound` unless --limit says otherwise
const DEFAULT_SCHEDULE_LIMIT: usize = 20;

/// Deterministic address for a scenario participant name.
fn named_key(name: &str) -> Pubkey {
    Pubkey::new_from_array(hash(name.as_bytes()).to_bytes())
}

fn short(key: &Pubkey) -> String {
    let addr = key.to_string();
    format!("{}…{}", &addr[..4], &addr[addr.len() - 4..])
}

// ─── Scenario file ────────────────────────────────────────────────────────────

/// A pool lifecycle scripted as a list of calls.
///
/// Participants are plain names; each maps to a fixed address.
#[derive(Debug, Deserialize)]
struct Scenario {
    backend_id: u64,
    #[serde(default)]
    associated_id: u64,
    start_round: u64,
    end_round: u64,
    asset_id: u64,
    claiming_period: u64,
    #[serde(default)]
    config: PoolConfig,
    #[serde(default = "default_admin")]
    admin: String,
    #[serde(default)]
    create_round: u64,
    steps: Vec<Step>,
}

fn default_admin() -> String {
    "admin".to_string()
}

#[derive(Debug, Deserialize)]
struct Step {
    round: u64,
    #[serde(default)]
    caller: String,
    #[serde(flatten)]
    action: Action,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Action {
    Setup {
        #[serde(default)]
        fee: u64,
    },
    OptIn,
    Stake {
        #[serde(default)]
        fee: u64,
        amount: u64,
    },
    TriggerCompound,
    CompoundNow {
        #[serde(default)]
        fee: u64,
    },
    Withdraw {
        #[serde(default)]
        fee: u64,
        amount: u64,
    },
    LocalClaim {
        up_to: u64,
    },
    DeleteBoxes {
        down_to: u64,
    },
    CloseOut,
    Delete,
    /// Rewards appear at the backend
    Accrue {
        amount: u64,
    },
    /// Snapshot of the pool at this round
    Status,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Setup { .. } => "setup",
            Action::OptIn => "opt_in",
            Action::Stake { .. } => "stake",
            Action::TriggerCompound => "trigger_compound",
            Action::CompoundNow { .. } => "compound_now",
            Action::Withdraw { .. } => "withdraw",
            Action::LocalClaim { .. } => "local_claim",
            Action::DeleteBoxes { .. } => "delete_boxes",
            Action::CloseOut => "close_out",
            Action::Delete => "delete",
            Action::Accrue { .. } => "accrue",
            Action::Status => "status",
        }
    }
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read scenario '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse scenario '{}'", path.display()))
}

// ─── CLI definition ───────────────────────────────────────────────────────────

/// Autocompounder: staking-pool proxy that compounds rewards for its stakers.
///
/// Every command supports --json for machine-readable output.
#[derive(Parser)]
#[command(
    name    = "autocompounder",
    version = env!("CARGO_PKG_VERSION"),
    about   = "Inspect fees, keeper pacing and backend state of an autocompounding staking pool.",
    after_help = "\
ENVIRONMENT:
  AUTOCOMPOUNDER_MIN_TX_FEE   Host minimum transaction fee  [default: 1000]
  AUTOCOMPOUNDER_SCENARIO     Scenario file for `simulate`
  RUST_LOG                    Log filter, overrides --verbose

QUICK START:
  autocompounder fees
  autocompounder next-compound --last-round 100 --end-round 1000 --balance 400000 --min-balance 200000
  autocompounder decode-config --blob <base64>
  autocompounder simulate --scenario pool.json"
)]
struct Cli {
    /// Output machine-readable JSON instead of human-readable text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Log library activity at debug level
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fee each call must prepay
    ///
    /// Every backend call costs a multiple of the host's minimum
    /// transaction fee; stakers prepay them through a companion payment.
    #[command(
        after_help = "\
EXAMPLES:
  autocompounder fees
  autocompounder fees --min-tx-fee 2000 --json"
    )]
    Fees {
        /// Host minimum transaction fee
        #[arg(long, value_name = "AMOUNT", default_value_t = DEFAULT_MIN_TX_FEE, env = "AUTOCOMPOUNDER_MIN_TX_FEE")]
        min_tx_fee: u64,
    },

    /// Compute the rounds at which keeper triggers become eligible
    ///
    /// The prepaid balance above the minimum is spread evenly over the
    /// rounds left until pool end, one compound fee per trigger.
    #[command(
        after_help = "\
EXAMPLES:
  # Five prepaid triggers over 900 rounds
  autocompounder next-compound --last-round 100 --end-round 1000 \\
      --balance 295500 --min-balance 200000

NOTES:
  --min-balance is the pool's locked minimum: account and asset minimums
  plus the storage deposit of every ledger record."
    )]
    NextCompound {
        /// Round of the last compounding
        #[arg(long, value_name = "ROUND")]
        last_round: u64,

        /// Round at which the pool ends
        #[arg(long, value_name = "ROUND")]
        end_round: u64,

        /// Pool native balance
        #[arg(long, value_name = "AMOUNT")]
        balance: u64,

        /// Minimum balance the pool must keep
        #[arg(long, value_name = "AMOUNT")]
        min_balance: u64,

        /// Host minimum transaction fee
        #[arg(long, value_name = "AMOUNT", default_value_t = DEFAULT_MIN_TX_FEE, env = "AUTOCOMPOUNDER_MIN_TX_FEE")]
        min_tx_fee: u64,

        /// Maximum number of triggers listed
        #[arg(long, value_name = "N", default_value_t = DEFAULT_SCHEDULE_LIMIT)]
        limit: usize,
    },

    /// Decode a staking backend's published state blob
    #[command(
        after_help = "\
EXAMPLES:
  autocompounder decode-config --blob AAAA...AAA=

NOTES:
  Reads big-endian u64s: asset id @48, start round @56, end round @64."
    )]
    DecodeConfig {
        /// Base64-encoded state blob
        #[arg(long, value_name = "BASE64")]
        blob: String,
    },

    /// Run a pool lifecycle scenario against an in-memory backend
    #[command(
        after_help = "\
EXAMPLES:
  autocompounder simulate --scenario pool.json
  AUTOCOMPOUNDER_SCENARIO=pool.json autocompounder simulate --json

SCENARIO FORMAT:
  {
    \"backend_id\": 42, \"start_round\": 100, \"end_round\": 1000,
    \"asset_id\": 7, \"claiming_period\": 500, \"admin\": \"admin\",
    \"steps\": [
      { \"round\": 10,  \"caller\": \"admin\", \"op\": \"setup\", \"fee\": 200000 },
      { \"round\": 10,  \"caller\": \"alice\", \"op\": \"opt_in\" },
      { \"round\": 20,  \"caller\": \"alice\", \"op\": \"stake\", \"fee\": 22100, \"amount\": 1000 },
      { \"round\": 150, \"op\": \"accrue\", \"amount\": 100 },
      { \"round\": 150, \"caller\": \"bob\",   \"op\": \"compound_now\", \"fee\": 19100 },
      { \"round\": 160, \"op\": \"status\" }
    ]
  }

  Ops: setup opt_in stake trigger_compound compound_now withdraw local_claim
       delete_boxes close_out delete accrue status
  Rejected calls are reported and leave the pool unchanged."
    )]
    Simulate {
        /// Scenario JSON file
        #[arg(long, value_name = "PATH", env = "AUTOCOMPOUNDER_SCENARIO")]
        scenario: PathBuf,
    },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    if std::env::args().len() == 1 {
        Cli::command().print_long_help().ok();
        println!();
        return Ok(());
    }

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Fees { min_tx_fee } => cmd_fees(*min_tx_fee, cli.json)?,
        Commands::NextCompound { last_round, end_round, balance, min_balance, min_tx_fee, limit } => {
            cmd_next_compound(
                *last_round, *end_round, *balance, *min_balance, *min_tx_fee, *limit,
                cli.json,
            )?;
        }
        Commands::DecodeConfig { blob } => cmd_decode_config(blob, cli.json)?,
        Commands::Simulate { scenario } => cmd_simulate(scenario, cli.json)?,
    }

    Ok(())
}

// ─── fees ─────────────────────────────────────────────────────────────────────

fn cmd_fees(min_tx_fee: u64, json_output: bool) -> Result<()> {
    let config = PoolConfig {
        fees: FeeSchedule { min_tx_fee, ..FeeSchedule::default() },
        ..PoolConfig::default()
    };
    config.validate()?;
    let fees = config.fees;

    let (stake, unstake, claim) = (fees.stake_fee()?, fees.unstake_fee()?, fees.claim_fee()?);
    let (record, compound) = (fees.record_fee()?, fees.compound_fee()?);
    let setup = config.min_balance(true, 0)?;

    if json_output {
        println!("{}", json!({
            "status":  "ok",
            "command": "fees",
            "min_tx_fee":  min_tx_fee,
            "stake_fee":   stake,
            "unstake_fee": unstake,
            "claim_fee":   claim,
            "record_fee":  record,
            "compound_fee": compound,
            "companion_payments": {
                "setup":              setup,
                "stake_pre_live":     compound + stake,
                "stake_live":         2 * compound,
                "compound_now":       compound,
                "withdraw_pre_live":  unstake,
                "withdraw_live":      compound + unstake,
            },
        }));
    } else {
        println!("─── Fee Table ────────────────────────────────────────────────────");
        println!("  Min tx fee        {:>12}", min_tx_fee);
        println!("  Stake call        {:>12}", stake);
        println!("  Unstake call      {:>12}", unstake);
        println!("  Claim call        {:>12}", claim);
        println!("  Ledger record     {:>12}  (locked while the record exists)", record);
        println!("  Compounding       {:>12}  (record + claim + stake)", compound);
        println!();
        println!("  ─── Companion payment per call ───────────────────");
        println!("  setup             {:>12}  (funds the minimum balance)", setup);
        println!("  stake, pre-live   {:>12}", compound + stake);
        println!("  stake, live       {:>12}", 2 * compound);
        println!("  compound_now      {:>12}", compound);
        println!("  withdraw, pre-live{:>12}", unstake);
        println!("  withdraw, live    {:>12}", compound + unstake);
    }
    Ok(())
}

// ─── next-compound ────────────────────────────────────────────────────────────

/// Rounds of the funded keeper triggers, assuming each one fires as soon as
/// it becomes eligible and nobody tops the balance up.
fn pacing_schedule(
    last_round: u64,
    end_round: u64,
    available: u64,
    compound_fee: u64,
    limit: usize,
) -> Result<Vec<u64>> {
    let mut state = PoolState {
        last_compound_round: last_round,
        pool_end_round: end_round,
        ..PoolState::default()
    };
    let mut available = available;
    let mut rounds = Vec::new();

    while rounds.len() < limit && available >= compound_fee {
        let next = next_eligible_round(&state, available, compound_fee)?;
        rounds.push(next);
        if next >= end_round {
            break;
        }
        state.last_compound_round = next;
        available -= compound_fee;
    }
    Ok(rounds)
}

fn cmd_next_compound(
    last_round: u64,
    end_round: u64,
    balance: u64,
    min_balance: u64,
    min_tx_fee: u64,
    limit: usize,
    json_output: bool,
) -> Result<()> {
    if last_round > end_round {
        return Err(anyhow!("--last-round {last_round} is past --end-round {end_round}"));
    }
    let fees = FeeSchedule { min_tx_fee, ..FeeSchedule::default() };
    let compound_fee = fees.compound_fee()?;
    let available = balance.saturating_sub(min_balance);
    let funded = available / compound_fee;

    let schedule = pacing_schedule(last_round, end_round, available, compound_fee, limit)?;
    debug!(available, compound_fee, funded, "pacing");

    if json_output {
        println!("{}", json!({
            "status":           "ok",
            "command":          "next-compound",
            "available":        available,
            "compound_fee":     compound_fee,
            "funded_triggers":  funded,
            "next_round":       schedule.first(),
            "schedule":         schedule,
        }));
        return Ok(());
    }

    println!("─── Keeper Pacing ────────────────────────────────────────────────");
    println!("  Last compound     {:>12}", last_round);
    println!("  Pool end          {:>12}", end_round);
    println!("  Available         {:>12}  ({balance} - {min_balance})", available);
    println!("  Compound fee      {:>12}", compound_fee);
    println!("  Funded triggers   {:>12}", funded);
    println!();
    if funded == 0 {
        println!("  No trigger is funded.  Prepay at least {} more.", compound_fee - available);
        return Ok(());
    }
    if let Some(next) = schedule.first() {
        println!("  Next eligible     {:>12}", next);
        println!();
        println!("  ─── Schedule ─────────────────────────────────────");
        for (i, round) in schedule.iter().enumerate() {
            println!("  #{:<4}             {:>12}", i + 1, round);
        }
    }
    Ok(())
}

// ─── decode-config ────────────────────────────────────────────────────────────

fn cmd_decode_config(blob: &str, json_output: bool) -> Result<()> {
    let bytes = BASE64.decode(blob.trim()).context("--blob is not valid base64")?;
    let config = BackendConfig::decode(&bytes)?;

    if json_output {
        println!("{}", json!({
            "status":      "ok",
            "command":     "decode-config",
            "bytes":       bytes.len(),
            "start_round": config.start_round,
            "end_round":   config.end_round,
            "asset_id":    config.asset_id,
        }));
    } else {
        println!("─── Backend Configuration ────────────────────────────────────────");
        println!("  Blob size         {:>20}", bytes.len());
        println!("  Start round       {:>20}", config.start_round);
        println!("  End round         {:>20}", config.end_round);
        println!("  Staking asset     {:>20}", config.asset_id);
    }
    Ok(())
}

// ─── simulate ─────────────────────────────────────────────────────────────────

type Pool = Autocompounder<SimulatedBackend>;

fn payment(pool: &Pool, amount: u64) -> Transfer {
    Transfer::Payment { receiver: pool.address(), amount }
}

/// Run one step; the pool is left unchanged when it fails.
fn run_step(
    pool: &mut Pool,
    caller: Pubkey,
    round: u64,
    action: &Action,
) -> std::result::Result<Value, AutocompounderError> {
    let ix = Invocation::new(caller, round);
    match action {
        Action::Setup { fee } => {
            pool.setup(&ix.with(payment(pool, *fee)))?;
            Ok(json!({ "min_balance": pool.min_balance()? }))
        }
        Action::OptIn => {
            pool.opt_in(&ix)?;
            Ok(json!({ "caught_up_to": pool.ledger().len() }))
        }
        Action::Stake { fee, amount } => {
            let deposit = Transfer::AssetTransfer {
                receiver: pool.address(),
                asset_id: pool.state().staking_asset_id,
                amount: *amount,
            };
            pool.stake(&ix.with(payment(pool, *fee)).with(deposit))?;
            Ok(json!({ "total_stake": pool.state().total_stake.floor() }))
        }
        Action::TriggerCompound => {
            let growth = pool.trigger_compound(&ix)?;
            Ok(json!({ "growth": growth.to_string(), "record": pool.ledger().len() }))
        }
        Action::CompoundNow { fee } => {
            let growth = pool.compound_now(&ix.with(payment(pool, *fee)))?;
            Ok(json!({ "growth": growth.to_string(), "record": pool.ledger().len() }))
        }
        Action::Withdraw { fee, amount } => {
            let paid = pool.withdraw(&ix.with(payment(pool, *fee)), *amount)?;
            Ok(json!({ "paid": paid }))
        }
        Action::LocalClaim { up_to } => {
            pool.local_claim(&ix, *up_to)?;
            let stake = pool.pending_stake(&caller)?;
            Ok(json!({ "local_stake": stake.floor() }))
        }
        Action::DeleteBoxes { down_to } => {
            let deleted = pool.delete_boxes(&ix, *down_to)?;
            Ok(json!({ "deleted": deleted, "ledger_len": pool.ledger().len() }))
        }
        Action::CloseOut => {
            pool.close_out(&ix)?;
            Ok(json!({ "staker_count": pool.state().staker_count }))
        }
        Action::Delete => {
            let teardown = pool.delete(&ix)?;
            Ok(json!({
                "recipient":          teardown.recipient.to_string(),
                "asset":              teardown.asset,
                "native":             teardown.native,
                "forfeited_accounts": teardown.forfeited_accounts,
            }))
        }
        Action::Accrue { amount } => {
            pool.backend_mut().accrue(*amount)?;
            Ok(json!({ "pending_rewards": pool.backend().pending_rewards }))
        }
        Action::Status => Ok(json!(pool.status(round)?)),
    }
}

fn print_status(status: &PoolStatus) {
    println!("  Round             {:>16}", status.round);
    println!("  Phase             {:>16}", format!("{:?}", status.phase));
    println!("  Total stake       {:>16}", status.total_stake);
    println!("  Stakers           {:>16}", status.staker_count);
    println!("  Ledger records    {:>16}", status.ledger_len);
    println!("  Last compound     {:>16}", status.last_compound_round);
    println!("  Native balance    {:>16}  (min {})",
             status.treasury.native_balance, status.min_balance);
    println!("  Asset balance     {:>16}", status.treasury.asset_balance);
    match status.next_compound_round {
        Some(round) => println!("  Next trigger      {:>16}", round),
        None => println!("  Next trigger      {:>16}", "-"),
    }
}

fn cmd_simulate(path: &Path, json_output: bool) -> Result<()> {
    let scenario = load_scenario(path)?;

    let mut names: BTreeMap<Pubkey, String> = BTreeMap::new();
    let mut key_for = |name: &str| {
        let key = named_key(name);
        names.entry(key).or_insert_with(|| name.to_string());
        key
    };

    let admin = key_for(scenario.admin.as_str());
    let backend = SimulatedBackend::new(
        scenario.backend_id,
        BackendConfig {
            start_round: scenario.start_round,
            end_round: scenario.end_round,
            asset_id: scenario.asset_id,
        },
    );
    let args = CreateArgs {
        backend_id: scenario.backend_id,
        associated_id: scenario.associated_id,
        claiming_period: scenario.claiming_period,
    };
    let mut pool = Pool::create(
        named_key("pool"),
        &Invocation::new(admin, scenario.create_round),
        backend,
        args,
        scenario.config,
    )
    .context("create pool")?;
    info!(pool = %pool.address(), admin = %admin, steps = scenario.steps.len(), "scenario loaded");

    if !json_output {
        println!("─── Scenario ─────────────────────────────────────────────────────");
        println!("  File              {}", path.display());
        println!("  Pool window       {} → {}  (claim period {})",
                 scenario.start_round, scenario.end_round, scenario.claiming_period);
        println!("  Admin             {} ({})", scenario.admin, short(&admin));
        println!();
    }

    let mut results = Vec::with_capacity(scenario.steps.len());
    let mut rejected = 0usize;
    let mut last_round = scenario.create_round;

    for (i, step) in scenario.steps.iter().enumerate() {
        let caller_name = if step.caller.is_empty() { scenario.admin.as_str() } else { step.caller.as_str() };
        let caller = key_for(caller_name);
        let op = step.action.name();
        last_round = step.round;

        let outcome = run_step(&mut pool, caller, step.round, &step.action);
        if outcome.is_err() {
            rejected += 1;
        }

        if json_output {
            results.push(match &outcome {
                Ok(detail) => json!({
                    "step": i + 1, "round": step.round, "caller": caller_name, "op": op,
                    "ok": true, "result": detail,
                }),
                Err(err) => json!({
                    "step": i + 1, "round": step.round, "caller": caller_name, "op": op,
                    "ok": false, "kind": format!("{:?}", err.kind()), "error": err.to_string(),
                }),
            });
            continue;
        }

        match (&step.action, &outcome) {
            (Action::Status, Ok(_)) => {
                println!("  ─── Status @ {} ───────────────────────────────────", step.round);
                print_status(&pool.status(step.round)?);
                println!();
            }
            (_, Ok(detail)) => {
                println!("  #{:<3} {:>6}  {:<16} {:<10} ok    {}",
                         i + 1, step.round, op, caller_name, detail);
            }
            (_, Err(err)) => {
                println!("  #{:<3} {:>6}  {:<16} {:<10} FAIL  [{:?}] {}",
                         i + 1, step.round, op, caller_name, err.kind(), err);
            }
        }
    }

    pool.audit()?;
    let status = pool.status(last_round)?;
    let accounts: Vec<Value> = pool
        .accounts()
        .map(|(owner, account)| {
            let name = names.get(owner).cloned().unwrap_or_else(|| short(owner));
            json!({
                "name":          name,
                "address":       owner.to_string(),
                "local_stake":   account.floor_stake(),
                "caught_up_to":  account.caught_up_to,
                "pending_stake": pool.pending_stake(owner).map(|s| s.floor()).ok(),
            })
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&json!({
            "status":   "ok",
            "command":  "simulate",
            "steps":    results,
            "rejected": rejected,
            "pool":     status,
            "accounts": accounts,
            "backend":  pool.backend(),
        }))?);
        return Ok(());
    }

    println!();
    println!("─── Final State ──────────────────────────────────────────────────");
    print_status(&status);
    println!("  Rejected calls    {:>16}", rejected);
    println!();
    println!("  ─── Accounts ─────────────────────────────────────");
    if accounts.is_empty() {
        println!("  (none)");
    }
    for account in &accounts {
        println!("  {:<12} stake {:>12}  pending {:>12}  cursor {:>4}",
                 account["name"].as_str().unwrap_or("?"),
                 account["local_stake"],
                 account["pending_stake"],
                 account["caught_up_to"]);
    }
    Ok(())
}
