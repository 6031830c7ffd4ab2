//! Entity to model mappers
//!
//! This module provides conversions between domain entities (support-core) and database models.
//! - `TryFrom<Model> for Entity`: Convert database rows to domain objects; enum columns that
//!   fail to parse surface as `DomainError::DatabaseError`
//! - `*Values` structs: Prepare entity data for binding

mod conversation;
mod message;
mod participant;

pub use conversation::ConversationValues;
pub use message::MessageInsert;

use support_core::DomainError;

fn corrupt_column(column: &str, err: String) -> DomainError {
    DomainError::DatabaseError(format!("corrupt {column} column: {err}"))
}
