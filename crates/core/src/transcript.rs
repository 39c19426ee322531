//! Conversation transcript types.

use std::fmt::{self, Display};

use jungle_quest_model::{ModelMessage, ModelRequest};
use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The game rules given to the model.
    System,
    /// The player.
    User,
    /// The model, or the game itself speaking as the guide.
    Assistant,
}

/// One message in the conversation. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    /// Creates a turn.
    #[inline]
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a player turn.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a guide turn.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Returns the role of this turn.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this turn.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }
}

impl From<&Turn> for ModelMessage {
    fn from(turn: &Turn) -> Self {
        let content = turn.content.clone();
        match turn.role {
            Role::System => ModelMessage::System(content),
            Role::User => ModelMessage::User(content),
            Role::Assistant => ModelMessage::Assistant(content),
        }
    }
}

impl From<ModelMessage> for Turn {
    fn from(msg: ModelMessage) -> Self {
        match msg {
            ModelMessage::System(content) => Turn::new(Role::System, content),
            ModelMessage::User(content) => Turn::new(Role::User, content),
            ModelMessage::Assistant(content) => {
                Turn::new(Role::Assistant, content)
            }
        }
    }
}

/// Why a list of turns is not a valid transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidTranscript {
    /// The first turn is not the system prompt.
    MissingSystemPrompt,
    /// A system turn appears after the first turn.
    MisplacedSystemPrompt,
}

impl Display for InvalidTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidTranscript::MissingSystemPrompt => {
                write!(f, "transcript must start with a system turn")
            }
            InvalidTranscript::MisplacedSystemPrompt => {
                write!(f, "transcript must contain exactly one system turn")
            }
        }
    }
}

impl std::error::Error for InvalidTranscript {}

/// The ordered history of a game, sent in full to the model every turn.
///
/// A transcript always starts with exactly one system turn holding the
/// game rules. Only the session appends to it; callers get snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Turn>", into = "Vec<Turn>")]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Starts a transcript with the game rules and the welcome text the
    /// player sees first.
    pub fn new<S1, S2>(system_prompt: S1, welcome_message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            turns: vec![
                Turn::new(Role::System, system_prompt),
                Turn::assistant(welcome_message),
            ],
        }
    }

    /// Returns all turns in order.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the number of turns, including the system turn.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always `false`, the system turn is never removed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the game rules.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        self.turns.first().map(Turn::content).unwrap_or_default()
    }

    /// Returns the most recent turn.
    #[inline]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Builds the request replaying the whole transcript.
    pub fn to_request(&self) -> ModelRequest {
        ModelRequest {
            messages: self.turns.iter().map(ModelMessage::from).collect(),
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, turn: Turn) {
        debug_assert_ne!(turn.role, Role::System);
        self.turns.push(turn);
    }

    /// Removes the last turn if the player wrote it.
    pub(crate) fn pop_user_turn(&mut self) -> Option<Turn> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::User => self.turns.pop(),
            _ => None,
        }
    }
}

impl TryFrom<Vec<Turn>> for Transcript {
    type Error = InvalidTranscript;

    fn try_from(turns: Vec<Turn>) -> Result<Self, Self::Error> {
        match turns.first() {
            Some(turn) if turn.role == Role::System => {}
            _ => return Err(InvalidTranscript::MissingSystemPrompt),
        }
        if turns[1..].iter().any(|turn| turn.role == Role::System) {
            return Err(InvalidTranscript::MisplacedSystemPrompt);
        }
        Ok(Self { turns })
    }
}

impl From<Transcript> for Vec<Turn> {
    #[inline]
    fn from(transcript: Transcript) -> Self {
        transcript.turns
    }
}

impl TryFrom<ModelRequest> for Transcript {
    type Error = InvalidTranscript;

    fn try_from(req: ModelRequest) -> Result<Self, Self::Error> {
        req.messages
            .into_iter()
            .map(Turn::from)
            .collect::<Vec<_>>()
            .try_into()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_transcript() {
        let transcript = Transcript::new("RULES", "Welcome!");
        assert_eq!(
            transcript.turns(),
            &[
                Turn::new(Role::System, "RULES"),
                Turn::new(Role::Assistant, "Welcome!"),
            ]
        );
        assert_eq!(transcript.system_prompt(), "RULES");
    }

    #[test]
    fn test_pop_user_turn() {
        let mut transcript = Transcript::new("RULES", "Welcome!");
        assert_eq!(transcript.pop_user_turn(), None);
        transcript.push(Turn::user("hello"));
        assert_eq!(transcript.pop_user_turn(), Some(Turn::user("hello")));
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_request_round_trip() {
        let mut transcript = Transcript::new("RULES", "Welcome!");
        transcript.push(Turn::user("I draw my sword"));
        transcript.push(Turn::assistant("A jaguar appears."));
        transcript.push(Turn::user(""));

        let request = transcript.to_request();
        assert_eq!(
            request.messages,
            vec![
                ModelMessage::System("RULES".to_owned()),
                ModelMessage::Assistant("Welcome!".to_owned()),
                ModelMessage::User("I draw my sword".to_owned()),
                ModelMessage::Assistant("A jaguar appears.".to_owned()),
                ModelMessage::User(String::new()),
            ]
        );
        assert_eq!(Transcript::try_from(request).unwrap(), transcript);
    }

    #[test]
    fn test_serde() {
        let mut transcript = Transcript::new("RULES", "Welcome!");
        transcript.push(Turn::user("hello"));
        let value = serde_json::to_value(&transcript).unwrap();
        assert_eq!(
            value,
            json!([
                { "role": "system", "content": "RULES" },
                { "role": "assistant", "content": "Welcome!" },
                { "role": "user", "content": "hello" },
            ])
        );
        let back: Transcript = serde_json::from_value(value).unwrap();
        assert_eq!(back, transcript);
    }

    #[test]
    fn test_reject_invalid_turns() {
        assert_eq!(
            Transcript::try_from(vec![]),
            Err(InvalidTranscript::MissingSystemPrompt)
        );
        assert_eq!(
            Transcript::try_from(vec![Turn::user("hi")]),
            Err(InvalidTranscript::MissingSystemPrompt)
        );
        assert_eq!(
            Transcript::try_from(vec![
                Turn::new(Role::System, "a"),
                Turn::new(Role::System, "b"),
            ]),
            Err(InvalidTranscript::MisplacedSystemPrompt)
        );
        assert!(
            serde_json::from_value::<Transcript>(json!([
                { "role": "user", "content": "hi" }
            ]))
            .is_err()
        );
    }
}
