use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use tally_agent_model::{ModelResponse, ModelResponseEvent};

use crate::proto::{self, ConverseResponse};

/// A fully buffered Converse response.
///
/// The Converse API returns the whole message at once, so the events are
/// decoded up front and handed out one by one.
#[derive(Debug)]
pub struct BedrockResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl BedrockResponse {
    pub(crate) fn from_converse(resp: ConverseResponse) -> Self {
        Self {
            events: proto::response_events(resp).into(),
        }
    }
}

impl ModelResponse for BedrockResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        Poll::Ready(Ok(self.get_mut().events.pop_front()))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use serde_json::json;
    use tally_agent_model::ModelFinishReason;

    use super::*;

    #[tokio::test]
    async fn test_drain_events() {
        let converse: ConverseResponse = serde_json::from_value(json!({
            "output": {
                "message": {
                    "role": "assistant",
                    "content": [{ "text": "Hello there" }]
                }
            },
            "stopReason": "end_turn"
        }))
        .unwrap();

        let mut resp = pin!(BedrockResponse::from_converse(converse));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            events.push(event);
        }
        assert_eq!(
            events,
            [
                ModelResponseEvent::TextBlock("Hello there".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ]
        );

        // Polling after completion keeps returning `None`.
        let next = poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await;
        assert!(matches!(next, Ok(None)));
    }
}
