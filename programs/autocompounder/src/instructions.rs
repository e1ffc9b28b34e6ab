pub mod create;
pub mod setup;
pub mod opt_in;
pub mod stake;
pub mod trigger_compound;
pub mod compound_now;
pub mod withdraw;
pub mod local_claim;
pub mod delete_boxes;
pub mod close_out;
pub mod delete;

pub use create::CreateArgs;
pub use delete::Teardown;
