// IO layer - CSV export of balances and account histories.

pub mod export;

pub use export::*;
