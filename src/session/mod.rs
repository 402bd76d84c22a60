//! Listener sessions
//!
//! A [`ClientSession`] is what a shared stream's broadcaster writes to. The
//! HTTP layer pairs each session with a [`ChannelSink`] whose receiver backs
//! the response body.

pub mod client;
pub mod sink;

pub use client::{client_id, ClientSession};
pub use sink::{ChannelSink, ClientSink, SinkError};
