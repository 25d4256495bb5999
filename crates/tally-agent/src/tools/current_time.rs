use std::future::ready;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tally_agent_core::tool::{Error as ToolError, Tool, ToolResult};

/// Arguments of [`CurrentTimeTool`].
#[derive(Deserialize, JsonSchema)]
pub struct CurrentTimeParameters {
    #[schemars(
        description = "IANA timezone name such as `Asia/Tokyo`. Uses the default timezone when omitted."
    )]
    timezone: Option<String>,
}

/// A tool that tells the current time in ISO 8601 format.
pub struct CurrentTimeTool {
    default_timezone: Tz,
    parameter_schema: Value,
}

impl CurrentTimeTool {
    /// Creates a tool that answers in `default_timezone` unless the model
    /// asks for another one.
    #[inline]
    pub fn new(default_timezone: Tz) -> Self {
        Self {
            default_timezone,
            parameter_schema: schema_for!(CurrentTimeParameters).to_value(),
        }
    }
}

impl Default for CurrentTimeTool {
    #[inline]
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Tool for CurrentTimeTool {
    type Input = CurrentTimeParameters;

    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Gets the current time in ISO 8601 format for the given timezone."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let result =
            resolve_timezone(input.timezone.as_deref(), self.default_timezone)
                .map(|tz| format_time(Utc::now(), tz));
        ready(result)
    }
}

fn resolve_timezone(
    name: Option<&str>,
    default: Tz,
) -> Result<Tz, ToolError> {
    match name.map(str::trim) {
        None | Some("") => Ok(default),
        Some(name) => name.parse().map_err(|_| {
            ToolError::invalid_input()
                .with_reason(format!("Unknown timezone: {name}"))
        }),
    }
}

fn format_time(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).to_rfc3339()
}
