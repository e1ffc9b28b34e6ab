//! Random operation sequences never break the pool's accounting.

mod common;

use autocompounder::{FixedPoint, Invocation};
use common::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Stake { who: usize, amount: u64 },
    Accrue(u64),
    CompoundNow { who: usize },
    Withdraw { who: usize, percent: u64 },
    Claim { who: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 1u64..5_000).prop_map(|(who, amount)| Op::Stake { who, amount }),
        (0u64..2_000).prop_map(Op::Accrue),
        (0usize..3).prop_map(|who| Op::CompoundNow { who }),
        (0usize..3, 0u64..=100).prop_map(|(who, percent)| Op::Withdraw { who, percent }),
        (0usize..3).prop_map(|who| Op::Claim { who }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn accounting_holds_across_random_operations(
        ops in proptest::collection::vec(op(), 1..40),
        round_step in 1u64..60,
    ) {
        let mut h = Harness::new();
        let stakers: Vec<_> = (0..3).map(|_| h.staker(10)).collect();
        let mut round = 20;

        for op in ops {
            round += round_step;
            let len = h.pool.ledger().len();
            // Errors are fine: a rejected call must simply leave no trace.
            let _ = match op {
                Op::Stake { who, amount } => {
                    let _ = h.pool.local_claim(&Invocation::new(stakers[who], round), len);
                    h.pool
                        .stake(&h.stake_ix(stakers[who], round, LIVE_STAKE_FEE, amount))
                        .map(|_| ())
                }
                Op::Accrue(amount) => {
                    h.accrue(amount);
                    Ok(())
                }
                Op::CompoundNow { who } => h
                    .pool
                    .compound_now(&Invocation::new(stakers[who], round).with(h.pay(COMPOUND_FEE)))
                    .map(|_| ()),
                Op::Withdraw { who, percent } => {
                    let _ = h.pool.local_claim(&Invocation::new(stakers[who], round), len);
                    let floor = h.local(&stakers[who]).floor();
                    h.pool
                        .withdraw(&h.withdraw_ix(stakers[who], round, LIVE_WITHDRAW_FEE), floor * percent / 100)
                        .map(|_| ())
                }
                Op::Claim { who } => h.pool.local_claim(&Invocation::new(stakers[who], round), len),
            };

            let state = h.pool.state();
            let len = h.pool.ledger().len();
            prop_assert!(h.floors() <= state.total_stake.floor());
            prop_assert!(h.pool.accounts().all(|(_, a)| a.caught_up_to <= len));
            prop_assert!(h.pool.ledger().iter().enumerate().all(|(i, r)| r.index == i as u64 + 1));
            prop_assert!(h.pool.ledger().iter().all(|r| r.growth >= FixedPoint::ONE));
            prop_assert!(h.pool.treasury().native_balance >= h.pool.min_balance().unwrap());
            prop_assert_eq!(h.pool.audit(), Ok(()));

            // Until the final compound the backend holds exactly the pool total.
            if !state.last_compound_done {
                prop_assert_eq!(h.pool.backend().staked, state.total_stake.floor());
                prop_assert_eq!(state.total_stake.to_bits() % (1u128 << 64), 0);
            }
        }
    }
}
