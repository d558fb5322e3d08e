//! Append-only conversation history.

use crate::core::types::{Message, Role};

/// Ordered messages of one run. Messages can be appended but never removed
/// or edited, and the whole sequence is replayed on every model call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    /// History seeded with the system priming message.
    pub fn primed(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role() == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primed_history_starts_with_system_message() {
        assert!(History::default().is_empty());
        let history = History::primed("be terse");
        assert!(!history.is_empty());
        assert_eq!(history.len(), 1);
        assert_eq!(history.messages()[0], Message::system("be terse"));
    }

    #[test]
    fn push_preserves_order() {
        let mut history = History::primed("sys");
        history.push(Message::user("hi"));
        history.push(Message::assistant_text("hello"));
        let roles: Vec<Role> = history.messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(history.last().and_then(Message::content), Some("hello"));
        assert_eq!(history.count_role(Role::User), 1);
    }
}
