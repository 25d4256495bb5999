use std::fmt::Debug;

/// The region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// The model used when none is configured.
pub const DEFAULT_MODEL_ID: &str = "us.anthropic.claude-sonnet-4-20250514-v1:0";

/// Builder for [`BedrockConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BedrockConfigBuilder {
    api_key: String,
    model_id: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
    max_tokens: Option<u32>,
}

impl BedrockConfigBuilder {
    /// Creates a builder with the given Bedrock API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: None,
            region: None,
            endpoint: None,
            max_tokens: None,
        }
    }

    /// Sets the model or inference profile to use.
    #[inline]
    pub fn with_model_id<S: Into<String>>(mut self, model_id: S) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Sets the AWS region.
    #[inline]
    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint, overriding the regional one.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Limits the number of tokens generated per model turn.
    #[inline]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> BedrockConfig {
        let region = self.region.unwrap_or_else(|| DEFAULT_REGION.to_owned());
        let endpoint = self.endpoint.unwrap_or_else(|| {
            format!("https://bedrock-runtime.{region}.amazonaws.com")
        });
        BedrockConfig {
            api_key: self.api_key,
            model_id: self
                .model_id
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_owned()),
            region,
            endpoint,
            max_tokens: self.max_tokens,
        }
    }
}

impl Debug for BedrockConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Configuration for the Bedrock provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BedrockConfig {
    pub(crate) api_key: String,
    pub(crate) model_id: String,
    pub(crate) region: String,
    pub(crate) endpoint: String,
    pub(crate) max_tokens: Option<u32>,
}

impl BedrockConfig {
    /// Returns the configured model identifier.
    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns the configured region.
    #[inline]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Returns the base URL requests are sent to.
    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Debug for BedrockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockConfig")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
