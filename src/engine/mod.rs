//! Conversation engine: command routing, per-user sessions, and the
//! step-by-step request flow.

pub mod engine;
pub mod router;
pub mod session;

pub use engine::ConversationEngine;
pub use router::Command;
pub use session::{Session, SessionMap, Step};
