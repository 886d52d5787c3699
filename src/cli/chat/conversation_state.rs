/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

/// A single transcript entry. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Message {
    id: u64,
    content: String,
    sender: Sender,
}

impl Message {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }
}

/// Append-only conversation log. Insertion order is display order.
pub struct ConversationState {
    messages: Vec<Message>,
    next_id: u64,
    rendered: usize,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            next_id: 1,
            rendered: 0,
        }
    }

    pub fn append(&mut self, content: impl Into<String>, sender: Sender) -> &Message {
        let id = self.next_id;
        self.next_id += 1;

        self.messages.push(Message {
            id,
            content: content.into(),
            sender,
        });
        tracing::debug!("Appended {:?} message #{}", sender, id);

        &self.messages[self.messages.len() - 1]
    }

    pub fn add_user_message(&mut self, message: &str) -> &Message {
        self.append(message, Sender::User)
    }

    pub fn add_bot_message(&mut self, message: &str) -> &Message {
        self.append(message, Sender::Bot)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages appended since the last call to [`mark_rendered`](Self::mark_rendered).
    pub fn unrendered(&self) -> &[Message] {
        &self.messages[self.rendered..]
    }

    pub fn mark_rendered(&mut self) {
        self.rendered = self.messages.len();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let mut state = ConversationState::new();
        let a = state.add_user_message("one").id();
        let b = state.add_bot_message("two").id();
        let c = state.add_user_message("three").id();

        assert!(a < b && b < c);
    }

    #[test]
    fn append_preserves_insertion_order() {
        let mut state = ConversationState::new();
        state.add_bot_message("hello");
        state.add_user_message("question");
        state.add_bot_message("answer");

        let contents: Vec<&str> = state.messages().iter().map(Message::content).collect();
        assert_eq!(contents, vec!["hello", "question", "answer"]);
        assert_eq!(state.last().map(Message::sender), Some(Sender::Bot));
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn unrendered_tracks_new_entries_only() {
        let mut state = ConversationState::new();
        assert!(state.is_empty());
        state.add_bot_message("greeting");
        assert_eq!(state.unrendered().len(), 1);

        state.mark_rendered();
        assert!(state.unrendered().is_empty());

        state.add_user_message("hi");
        state.add_bot_message("hey");
        let pending: Vec<&str> = state.unrendered().iter().map(Message::content).collect();
        assert_eq!(pending, vec!["hi", "hey"]);
    }
}
