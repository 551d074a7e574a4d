use serde::Deserialize;
use tracing::trace;

/// Marker that prefixes every event line of the chat stream.
pub const DATA_PREFIX: &str = "data: ";

/// One decoded `data: ` line of the chat stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    /// Label of the agent that produced the reply; sent with the last frame.
    #[serde(default)]
    pub agent: Option<String>,
}

impl StreamFrame {
    /// Parses a single line. Lines without the event marker and payloads that
    /// are not a JSON object of the expected shape yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let payload = line.strip_prefix(DATA_PREFIX)?;
        match serde_json::from_str::<StreamFrame>(payload) {
            Ok(frame) => Some(frame),
            Err(e) => {
                trace!("Discarding malformed stream frame ({e}): {payload}");
                None
            }
        }
    }

    /// Non-empty content fragment carried by this frame.
    pub fn fragment(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}
