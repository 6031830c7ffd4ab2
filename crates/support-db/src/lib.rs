//! # support-db
//!
//! Conversation store adapter implementing the repository traits of `support-core`.
//!
//! ## Overview
//!
//! - Connection pool management and schema setup
//! - Database models with SQLx `FromRow` derives
//! - Entity ↔ Model mappers
//! - PostgreSQL repository implementations
//! - An in-memory store with the same constraints, for development and tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use support_db::{create_pool, run_migrations, PoolConfig, Repositories};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&PoolConfig::default()).await?;
//!     run_migrations(&pool).await?;
//!     let repos = Repositories::postgres(pool);
//!
//!     // Hand `repos` to the service context...
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
mod store;

// Re-export commonly used types
pub use memory::MemoryStore;
pub use pool::{create_pool, run_migrations, PgPool, PoolConfig};
pub use repositories::{PgConversationRepository, PgMessageRepository, PgParticipantRepository};
pub use store::Repositories;
