//! Consumption of the orchestrator's server-sent-events chat replies.
//!
//! Wire format, one event per line:
//!
//! ```text
//! data: {"content": "Bon", "done": false}
//! data: {"content": "jour", "done": false}
//! data: {"content": "", "done": true, "agent": "ollama.qwen2.5"}
//! ```
//!
//! Anything that is not a `data: ` line carrying a JSON object is ignored.

pub mod consumer;
pub mod decoder;
pub mod frame;

pub use consumer::{Flow, MessageSink, StreamConsumer, StreamState, STREAM_FAILURE_NOTICE};
pub use decoder::LineDecoder;
pub use frame::StreamFrame;
