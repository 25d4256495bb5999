//! Tools the model can call, and the errors they report back.

mod error;
mod manager;
mod object;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub(crate) use manager::Manager;

/// What a tool hands back to the model: text on success.
pub type ToolResult = Result<String, Error>;

/// A function the model can call during a turn.
///
/// A tool is registered once per agent and may be called any number of
/// times, so it keeps no state between calls. Context such as the default
/// timezone is fixed when the tool is built and copied into each call.
pub trait Tool: Send + Sync + 'static {
    /// Arguments, decoded from the JSON the model sent.
    type Input: DeserializeOwned;

    /// Name the model refers to the tool by. Unique within an agent.
    fn name(&self) -> &str;

    /// Tells the model what the tool does and when to use it.
    fn description(&self) -> &str;

    /// JSON schema of [`Tool::Input`].
    fn parameter_schema(&self) -> &Value;

    /// Runs the tool.
    ///
    /// The returned future must not borrow `self`. Input problems should
    /// be reported as [`Error::invalid_input`], anything else as
    /// [`Error::execution_error`].
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
