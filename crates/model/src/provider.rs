use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// An error raised by a model provider.
///
/// The agent only looks at [`ErrorKind`]; the rest is for logs.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Classifies the error.
    fn kind(&self) -> ErrorKind;
}

/// A backend that answers [`ModelRequest`]s with one fixed model.
///
/// Agents are built per invocation, so providers must be cheap to create
/// and must not keep per-conversation state.
pub trait ModelProvider: Send + Sync {
    /// Error for failed requests and broken replies.
    type Error: ModelProviderError;

    /// The reply type.
    type Response: ModelResponse<Error = Self::Error>;

    /// The model identifier, e.g. a Bedrock model or inference profile id.
    fn model_id(&self) -> &str;

    /// Sends `req` to the model.
    ///
    /// The request is serialized before this returns, so the returned
    /// future does not borrow it.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
