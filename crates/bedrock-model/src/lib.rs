//! A model provider for the Amazon Bedrock Converse API.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, StatusCode, Url, header};
use tally_agent_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};

pub use config::{
    BedrockConfig, BedrockConfigBuilder, DEFAULT_MODEL_ID, DEFAULT_REGION,
};
use proto::{ConverseResponse, ErrorBody};
pub use response::BedrockResponse;

/// Error type for [`BedrockProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Bedrock Converse model provider.
#[derive(Clone, Debug)]
pub struct BedrockProvider {
    client: Client,
    config: Arc<BedrockConfig>,
}

impl BedrockProvider {
    /// Creates a new `BedrockProvider` with the given configuration.
    #[inline]
    pub fn new(config: BedrockConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Creates a provider that shares an existing HTTP client.
    #[inline]
    pub fn with_client(client: Client, config: BedrockConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    fn converse_url(&self) -> Result<Url, Error> {
        let mut url = Url::parse(&self.config.endpoint).map_err(|err| {
            Error::new(format!("Invalid endpoint: {err}"), ErrorKind::Other)
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                Error::new("Endpoint cannot be a base URL", ErrorKind::Other)
            })?
            .pop_if_empty()
            .extend(["model", self.config.model_id.as_str(), "converse"]);
        Ok(url)
    }
}

impl ModelProvider for BedrockProvider {
    type Error = Error;
    type Response = BedrockResponse;

    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let converse_req = proto::create_request(req, &self.config);
        let resp_fut = self.converse_url().map(|url| {
            debug!("sending converse request to {url}");
            self.client
                .post(url)
                .bearer_auth(&self.config.api_key)
                .header(header::ACCEPT, "application/json")
                .json(&converse_req)
                .send()
        });

        async move {
            let resp = match resp_fut?.await {
                Ok(resp) => resp,
                Err(err) => {
                    return Err(Error::new(format!("{err}"), ErrorKind::Other));
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(error_from_status(status, &body));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_json = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype() == mime::JSON)
                .unwrap_or(false);
            if !is_json {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            let converse_resp: ConverseResponse =
                resp.json().await.map_err(|err| {
                    Error::new(
                        format!("Malformed converse response: {err}"),
                        ErrorKind::Other,
                    )
                })?;
            Ok(BedrockResponse::from_converse(converse_resp))
        }
    }
}

fn error_from_status(status: StatusCode, body: &str) -> Error {
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        _ => ErrorKind::Other,
    };
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.to_owned());
    Error::new(format!("Bedrock returned {status}: {detail}"), kind)
}
