//! Core logic including the agent loop, tool execution and conversation
//! bookkeeping.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod error;
mod model_client;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, AgentResponse, AssistantMessage, ContentBlock,
    DEFAULT_MAX_TURNS,
};
pub use error::{Error, ErrorKind};
