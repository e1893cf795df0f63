//! Conversation log kept by the interactive front end.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Speaker {
    You,
    Bot,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::You => write!(f, "You"),
            Speaker::Bot => write!(f, "Bot"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Ordered question/answer turns. Display only; never fed back to the model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Speaker::You, text.into());
    }

    pub fn push_bot(&mut self, text: impl Into<String>) {
        self.push(Speaker::Bot, text.into());
    }

    fn push(&mut self, speaker: Speaker, text: String) {
        self.turns.push(ConversationTurn { speaker, text });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// One `Speaker: text` line per turn.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}\n", t.speaker, t.text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_keep_order() {
        let mut t = Transcript::new();
        t.push_user("Which animal sat?");
        t.push_bot("The cat.");
        assert_eq!(t.turns().len(), 2);
        assert_eq!(t.turns()[0].speaker, Speaker::You);
        assert_eq!(t.turns()[1].text, "The cat.");
    }

    #[test]
    fn render_format() {
        let mut t = Transcript::new();
        t.push_user("q");
        t.push_bot("a");
        assert_eq!(t.render(), "You: q\nBot: a\n");
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.render(), "");
    }
}
