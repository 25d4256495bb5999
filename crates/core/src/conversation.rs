//! Conversation-related types.

use tally_agent_model::ModelMessage;

/// The messages an agent has exchanged with its model, oldest first.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    messages: Vec<ModelMessage>,
}

impl Conversation {
    /// Returns the messages of the conversation, oldest first.
    #[inline]
    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    #[inline]
    pub(crate) fn push(&mut self, msg: ModelMessage) {
        self.messages.push(msg);
    }
}
