// Application layer - transfer orchestration and the account lifecycle.

pub mod engine;
pub mod error;
pub mod service;

pub use engine::*;
pub use error::*;
pub use service::*;
