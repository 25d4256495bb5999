//! A provider-neutral protocol between the agent and the model.
//!
//! The agent only speaks the types defined here: a [`ModelRequest`] goes
//! in, a stream of [`ModelResponseEvent`]s comes out. Concrete providers
//! (Bedrock, the scripted test model, ...) translate these types to and
//! from their own wire formats in their own crates.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
