//! Business logic services
//!
//! Each service borrows the [`ServiceContext`] for the duration of one request.

pub mod context;
pub mod conversation;
pub mod error;
pub mod message;
pub mod presence;
pub mod typing;

pub use context::{ServiceContext, ServiceContextBuilder};
pub use conversation::ConversationService;
pub use error::{ServiceError, ServiceResult};
pub use message::MessageService;
pub use presence::PresenceService;
pub use typing::{TypingService, TypingTracker};
