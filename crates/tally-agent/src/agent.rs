//! Agent construction: the standard toolset and the factories that
//! hand out a fresh agent per invocation.

use chrono_tz::Tz;
use reqwest::Client;
use tally_agent_bedrock_model::{BedrockConfigBuilder, BedrockProvider};
use tally_agent_core::{Agent, AgentBuilder};
use tally_agent_model::ModelProvider;
use thiserror::Error;

use crate::config::Config;
use crate::tools::{CalculatorTool, CurrentTimeTool, LetterCounterTool};

/// The system prompt every agent starts with.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Builds an agent on top of `provider` with the standard toolset.
pub fn build_agent<P: ModelProvider + 'static>(
    provider: P,
    default_timezone: Tz,
) -> Agent {
    AgentBuilder::with_model_provider(provider)
        .with_system_prompt(SYSTEM_PROMPT)
        .with_tool(CalculatorTool::new())
        .with_tool(CurrentTimeTool::new(default_timezone))
        .with_tool(LetterCounterTool::new())
        .build()
}

/// The agent could not be created.
#[derive(Debug, Error)]
pub enum CreateAgentError {
    /// No Bedrock API key is configured.
    #[error("AWS_BEARER_TOKEN_BEDROCK is not set")]
    MissingApiKey,
}

/// Creates a fresh agent for every invocation.
pub trait AgentFactory: Send + Sync {
    /// Creates an agent.
    fn create_agent(&self) -> Result<Agent, CreateAgentError>;
}

impl<F> AgentFactory for F
where
    F: Fn() -> Result<Agent, CreateAgentError> + Send + Sync,
{
    #[inline]
    fn create_agent(&self) -> Result<Agent, CreateAgentError> {
        self()
    }
}

/// Creates agents that talk to Amazon Bedrock.
///
/// The HTTP client is shared by all agents, so connections are reused
/// across invocations.
#[derive(Clone, Debug)]
pub struct BedrockAgentFactory {
    client: Client,
    api_key: Option<String>,
    model_id: String,
    region: String,
    default_timezone: Tz,
}

impl BedrockAgentFactory {
    /// Creates a factory from the resolved configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
            region: config.region.clone(),
            default_timezone: config.default_timezone,
        }
    }

    /// Returns the model the agents will use.
    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl AgentFactory for BedrockAgentFactory {
    fn create_agent(&self) -> Result<Agent, CreateAgentError> {
        let api_key =
            self.api_key.as_ref().ok_or(CreateAgentError::MissingApiKey)?;
        let config = BedrockConfigBuilder::with_api_key(api_key)
            .with_model_id(&self.model_id)
            .with_region(&self.region)
            .build();
        let provider = BedrockProvider::with_client(self.client.clone(), config);
        Ok(build_agent(provider, self.default_timezone))
    }
}

#[cfg(test)]
mod tests {
    use tally_agent_test_model::TestModelProvider;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        Config::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .unwrap()
    }

    #[test]
    fn test_standard_toolset() {
        let agent = build_agent(TestModelProvider::default(), Tz::UTC);
        assert_eq!(
            agent.tool_names(),
            ["calculator", "current_time", "letter_counter"]
        );
        assert_eq!(agent.system_prompt(), Some(SYSTEM_PROMPT));
    }

    #[test]
    fn test_bedrock_factory_uses_configured_model() {
        let factory = BedrockAgentFactory::new(&config_with(&[
            ("AWS_BEARER_TOKEN_BEDROCK", "key"),
            ("BEDROCK_MODEL_ID", "amazon.nova-lite-v1:0"),
        ]));
        assert_eq!(factory.model_id(), "amazon.nova-lite-v1:0");

        let agent = factory.create_agent().unwrap();
        assert_eq!(agent.model_id(), "amazon.nova-lite-v1:0");
        assert_eq!(agent.tool_names().len(), 3);
    }

    #[test]
    fn test_bedrock_factory_default_model() {
        let factory = BedrockAgentFactory::new(&config_with(&[(
            "AWS_BEARER_TOKEN_BEDROCK",
            "key",
        )]));
        let agent = factory.create_agent().unwrap();
        assert_eq!(
            agent.model_id(),
            "us.anthropic.claude-sonnet-4-20250514-v1:0"
        );
    }

    #[test]
    fn test_bedrock_factory_requires_api_key() {
        let factory = BedrockAgentFactory::new(&config_with(&[]));
        assert!(matches!(
            factory.create_agent(),
            Err(CreateAgentError::MissingApiKey)
        ));
    }
}
