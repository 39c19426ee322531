use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    /// Breaks the stream with an error, as if the connection dropped.
    #[serde(rename = "interrupt")]
    Interrupt,
}

/// The preset response for an assistant turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failure` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that streams `text` word by word.
    pub fn with_text(text: &str) -> Self {
        let events: Vec<_> = text
            .split_inclusive(' ')
            .map(|word| PresetEvent::MessageDelta(word.to_owned()))
            .collect();
        Self::with_events(events)
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Returns the full text this response streams.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                PresetEvent::MessageDelta(delta) => Some(delta.as_str()),
                PresetEvent::Interrupt => None,
            })
            .collect()
    }
}
