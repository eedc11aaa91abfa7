//! Server-Sent Events transport adapter
//!
//! Each SSE response owns the receiving half of a bounded channel; the hub's
//! delivery task writes into the sending half through `ChannelSink`.

mod channel_sink;

pub use channel_sink::ChannelSink;
