use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

/// Structured reply: introductory text plus one external link.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionChip {
    #[serde(rename = "preText", alias = "pre_text", default)]
    pub pre_text: String,
    pub url: String,
    #[serde(default)]
    pub icon: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Plain(String),
    ActionChip(ActionChip),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Sender,
    pub body: Body,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message { sender: Sender::User, body: Body::Plain(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message { sender: Sender::Assistant, body: Body::Plain(text.into()) }
    }

    pub fn chip(chip: ActionChip) -> Self {
        Message { sender: Sender::Assistant, body: Body::ActionChip(chip) }
    }

    #[cfg(test)]
    pub fn plain_text(&self) -> Option<&str> {
        match &self.body {
            Body::Plain(text) => Some(text),
            Body::ActionChip(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Message(Message),
    /// Stand-in for the reply to request `token`.
    Pending { token: u64 },
}

/// The ordered list of everything shown in the chat window.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(Entry::Message(message));
    }

    /// Adds the placeholder for `token`, replacing any placeholder left over.
    pub fn push_pending(&mut self, token: u64) {
        self.remove_pending();
        self.entries.push(Entry::Pending { token });
    }

    /// Removes the placeholder, returning the token it stood for.
    pub fn remove_pending(&mut self) -> Option<u64> {
        let idx = self.entries.iter().position(|e| matches!(e, Entry::Pending { .. }))?;
        match self.entries.remove(idx) {
            Entry::Pending { token } => Some(token),
            Entry::Message(_) => None,
        }
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e, Entry::Pending { .. })).count()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Message(m) => Some(m),
            Entry::Pending { .. } => None,
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_placeholder() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hi"));
        transcript.push_pending(1);
        transcript.push_pending(2);

        assert_eq!(transcript.pending_count(), 1);
        assert_eq!(transcript.last(), Some(&Entry::Pending { token: 2 }));
    }

    #[test]
    fn test_remove_pending() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.remove_pending(), None);

        transcript.push_pending(7);
        assert_eq!(transcript.remove_pending(), Some(7));
        assert_eq!(transcript.pending_count(), 0);
        assert_eq!(transcript.len(), 0);
    }

    #[test]
    fn test_messages_skip_placeholder() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("a"));
        transcript.push_pending(1);

        let texts: Vec<_> = transcript.messages().filter_map(|m| m.plain_text()).collect();
        assert_eq!(texts, vec!["a"]);
    }
}
