use std::future::ready;
use std::pin::Pin;

use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolResult};

type BoxedCall = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Object-safe view of a [`Tool`], taking raw JSON arguments.
pub(crate) trait ErasedTool: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn call(&self, arguments: Value) -> BoxedCall;
}

impl<T: Tool> ErasedTool for T {
    #[inline]
    fn name(&self) -> &str {
        Tool::name(self)
    }

    #[inline]
    fn description(&self) -> &str {
        Tool::description(self)
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        Tool::parameter_schema(self)
    }

    fn call(&self, arguments: Value) -> BoxedCall {
        // Arguments that don't fit the input type never reach the tool.
        match serde_json::from_value::<T::Input>(arguments) {
            Ok(input) => {
                let span = debug_span!("tool call", tool = Tool::name(self));
                Box::pin(self.execute(input).instrument(span))
            }
            Err(err) => Box::pin(ready(Err(
                Error::invalid_input().with_reason(err.to_string())
            ))),
        }
    }
}
