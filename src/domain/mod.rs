mod account;
mod customer;
mod entry;
mod ledger;
mod money;

pub use account::*;
pub use customer::*;
pub use entry::*;
pub use ledger::*;
pub use money::*;
