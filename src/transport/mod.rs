//! Transport layer for broker communication
//!
//! The agent does not speak the MQTT wire protocol itself; it drives an
//! abstract client capability through the [`Transport`] trait. The shipped
//! implementation wraps rumqttc ([`rumqtt::RumqttTransport`]); tests use the
//! recording mock in [`crate::testing`].

use crate::message::Message;
use std::time::Duration;

pub mod rumqtt;

pub use rumqtt::RumqttTransport;

/// Abstract MQTT client capability consumed by the connection manager.
///
/// `connect`, `poll_once` and `reconnect` are single attempts; retry policy
/// lives in [`crate::connection::ConnectionManager`]. `publish` is a
/// non-blocking enqueue so that idle callbacks never stall the cycle; the
/// queued messages are flushed by the next poll.
#[async_trait::async_trait]
pub trait Transport: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a connection to the broker and wait for its confirmation.
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Drive one bounded iteration of network I/O: incoming dispatch,
    /// outgoing flush, keepalive. Processes at most `max_events` events and
    /// waits at most `timeout` for each.
    async fn poll_once(&mut self, timeout: Duration, max_events: usize) -> Result<(), Self::Error>;

    /// Re-establish a dropped connection on the existing session.
    async fn reconnect(&mut self) -> Result<(), Self::Error>;

    /// Enqueue a publish without blocking. The message is borrowed; the
    /// caller keeps ownership regardless of the outcome.
    fn publish(&mut self, message: &Message) -> Result<(), Self::Error>;

    /// Disconnect and release transport resources. Call once.
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Whether `error` is a connection-refused-class failure that a connect
    /// loop should retry after a backoff.
    fn is_retryable(error: &Self::Error) -> bool;
}
