//! An agent that answers prompts with a calculator, a clock and a letter
//! counter, hosted behind the managed runtime's HTTP contract.
//!
//! The crate is usable as a library too: [`Invoker`] wraps any
//! [`AgentFactory`], so hosts can plug in their own model provider.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod agent;
pub mod config;
pub mod invocation;
pub mod runtime;
pub mod telemetry;
pub mod tools;

pub use agent::{AgentFactory, BedrockAgentFactory, SYSTEM_PROMPT, build_agent};
pub use config::Config;
pub use invocation::{InvocationResult, InvokeError, Invoker, resolve_prompt};

/// Re-exports of [`tally_agent_core`] crate.
pub mod core {
    pub use tally_agent_core::*;
}
