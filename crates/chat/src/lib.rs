//! DocTalk Chat
//!
//! Orchestrates one chat turn end to end: route selection (plain,
//! caller-supplied context, or retrieval-grounded), prompt rendering, and
//! the completion call, blocking or streaming. The empty-retrieval
//! fallback to plain chat is an explicit route, not an error path.

pub mod engine;
pub mod prompt;

pub use engine::{ChatEngine, ChatMode};
pub use prompt::PromptTemplate;
