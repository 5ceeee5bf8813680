use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the store on insert.
pub type CustomerId = i64;

/// A customer owning zero or more accounts. Attribute management beyond
/// name-at-creation lives outside this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
