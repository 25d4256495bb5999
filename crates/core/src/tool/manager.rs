use std::collections::BTreeMap;

use tally_agent_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::object::ErasedTool;
use crate::tool::{Error, Tool};

/// An object that manages the toolset and handles requests from the model.
///
/// Tools are kept ordered by name, so definitions sent to the model are
/// stable across requests.
#[derive(Default)]
pub struct Manager {
    tools: BTreeMap<String, Box<dyn ErasedTool>>,
}

impl Manager {
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = Tool::name(&tool).to_owned();
        if self.tools.contains_key(&name) {
            warn!("tool `{name}` registered twice, keeping the latest one");
        }
        self.tools.insert(name, Box::new(tool));
    }

    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Runs the requested tools one after another and collects their
    /// results in request order.
    ///
    /// Failures never abort the batch: they are reported back to the model
    /// as error results so it can correct itself.
    pub async fn handle_requests(
        &self,
        requests: Vec<ToolCallRequest>,
    ) -> Vec<ToolCallResult> {
        let span = debug_span!("tool manager", count = requests.len());
        self.run_all(requests).instrument(span).await
    }

    async fn run_all(
        &self,
        requests: Vec<ToolCallRequest>,
    ) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(requests.len());
        for req in requests {
            let ToolCallRequest {
                id,
                name,
                arguments,
            } = req;

            let outcome = match self.tools.get(&name) {
                Some(tool) => {
                    trace!("running tool `{name}` ({id}) with args: {arguments:?}");
                    tool.call(arguments).await
                }
                None => {
                    warn!("tool not found: {name}");
                    Err(Error::not_found().with_reason(format!(
                        "no tool named `{name}` is available"
                    )))
                }
            };

            let result = match outcome {
                Ok(content) => ToolCallResult {
                    id,
                    content,
                    is_error: false,
                },
                Err(err) => {
                    debug!("tool `{name}` failed: {err}");
                    ToolCallResult {
                        id,
                        content: format!("Error: {}", err.reason()),
                        is_error: true,
                    }
                }
            };
            results.push(result);
        }
        results
    }
}
