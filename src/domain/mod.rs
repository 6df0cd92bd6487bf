mod application;
mod balance;
mod entry;
mod judgement;
mod ledger;
mod money;
mod repayment;

pub use application::*;
pub use balance::*;
pub use entry::*;
pub use judgement::*;
pub use ledger::*;
pub use money::*;
pub use repayment::*;
