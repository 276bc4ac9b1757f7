//! Broker connection management
//!
//! [`ConnectionManager`] owns a [`Transport`] and layers policy on top of it:
//! bounded (or unbounded) retry with a fixed backoff while connecting, and a
//! single immediate reconnect attempt when a steady-state poll fails. The
//! manager never terminates the idle loop on its own — poll failures are
//! surfaced to the caller and the next cycle simply tries again.

use crate::message::Message;
use crate::transport::Transport;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Connection lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection established.
    Disconnected,
    /// Initial connect in progress.
    Connecting,
    /// Connected and ready for publishes.
    Connected,
    /// A poll failed; reconnecting (attempt count).
    Reconnecting(u32),
}

/// Tunables for connect retries and the per-cycle poll budget.
#[derive(Debug, Clone)]
pub struct ConnectionPolicy {
    /// Fixed wait between connect attempts after a refused connection.
    pub connect_backoff: Duration,
    /// Wait budget for a single event during a poll step.
    pub poll_timeout: Duration,
    /// Maximum number of events processed per poll step.
    pub poll_budget: usize,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            connect_backoff: Duration::from_secs(10),
            poll_timeout: Duration::from_millis(100),
            poll_budget: 1,
        }
    }
}

/// Connection-level errors. The boxed sources are transport errors crossing
/// the generic boundary.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connect to broker failed")]
    ConnectFailed(#[source] TransportError),
    #[error("network poll failed")]
    PollFailed(#[source] TransportError),
    #[error("disconnect failed")]
    DisconnectFailed(#[source] TransportError),
}

/// Publish failures. Non-fatal: the caller reports them and the idle cycle
/// continues.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport rejected the publish")]
    Transport(#[source] TransportError),
}

/// Owns the transport and applies the retry and reconnect policy.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    policy: ConnectionPolicy,
    state: ConnectionState,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self::with_policy(transport, ConnectionPolicy::default())
    }

    pub fn with_policy(transport: T, policy: ConnectionPolicy) -> Self {
        Self {
            transport,
            policy,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Establish the broker connection.
    ///
    /// Refused connections are retried after a fixed backoff, at most
    /// `max_retries` attempts in total; `max_retries == 0` retries
    /// indefinitely. Any other failure aborts immediately.
    pub async fn connect(
        &mut self,
        host: &str,
        port: u16,
        max_retries: u32,
    ) -> Result<(), ConnectionError> {
        self.state = ConnectionState::Connecting;
        let mut remaining = max_retries;

        loop {
            match self.transport.connect(host, port).await {
                Ok(()) => {
                    self.state = ConnectionState::Connected;
                    info!(host, port, "connected to broker");
                    return Ok(());
                }
                Err(e) if T::is_retryable(&e) => {
                    if max_retries != 0 {
                        remaining -= 1;
                        if remaining == 0 {
                            self.state = ConnectionState::Disconnected;
                            error!(host, port, error = %e, "connect retries exhausted");
                            return Err(ConnectionError::ConnectFailed(Box::new(e)));
                        }
                    }
                    warn!(
                        host,
                        port,
                        error = %e,
                        backoff_secs = self.policy.connect_backoff.as_secs(),
                        "broker refused connection, retrying"
                    );
                    tokio::time::sleep(self.policy.connect_backoff).await;
                }
                Err(e) => {
                    self.state = ConnectionState::Disconnected;
                    error!(host, port, error = %e, "connect failed");
                    return Err(ConnectionError::ConnectFailed(Box::new(e)));
                }
            }
        }
    }

    /// One bounded network-poll step.
    ///
    /// On failure exactly one reconnect is attempted before the poll error is
    /// returned; a reconnect failure is logged and left for the next cycle.
    pub async fn poll_once(&mut self) -> Result<(), ConnectionError> {
        let poll = self
            .transport
            .poll_once(self.policy.poll_timeout, self.policy.poll_budget)
            .await;

        match poll {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                let attempt = match self.state {
                    ConnectionState::Reconnecting(n) => n + 1,
                    _ => 1,
                };
                self.state = ConnectionState::Reconnecting(attempt);
                warn!(error = %e, attempt, "network poll failed, attempting reconnect");

                match self.transport.reconnect().await {
                    Ok(()) => {
                        self.state = ConnectionState::Connected;
                        info!("reconnected to broker");
                    }
                    Err(re) => {
                        warn!(error = %re, attempt, "reconnect failed");
                    }
                }
                Err(ConnectionError::PollFailed(Box::new(e)))
            }
        }
    }

    /// Relay a publish to the transport. The message stays with the caller.
    pub fn publish(&mut self, message: &Message) -> Result<(), PublishError> {
        self.transport
            .publish(message)
            .map_err(|e| PublishError::Transport(Box::new(e)))
    }

    /// Disconnect and release the transport. Call once, at teardown.
    pub async fn close(&mut self) -> Result<(), ConnectionError> {
        let result = self
            .transport
            .disconnect()
            .await
            .map_err(|e| ConnectionError::DisconnectFailed(Box::new(e)));
        self.state = ConnectionState::Disconnected;
        result
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, TransportOp};

    fn fast_policy() -> ConnectionPolicy {
        ConnectionPolicy {
            connect_backoff: Duration::ZERO,
            ..ConnectionPolicy::default()
        }
    }

    #[tokio::test]
    async fn connect_retries_refused_connections() {
        let transport = MockTransport::new();
        transport.refuse_connects(2);
        let probe = transport.clone();

        let mut manager = ConnectionManager::with_policy(transport, fast_policy());
        manager.connect("localhost", 1883, 0).await.unwrap();

        assert_eq!(probe.connect_attempts(), 3);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn connect_gives_up_after_max_retries() {
        let transport = MockTransport::new();
        transport.refuse_connects(10);
        let probe = transport.clone();

        let mut manager = ConnectionManager::with_policy(transport, fast_policy());
        let result = manager.connect("localhost", 1883, 3).await;

        assert!(matches!(result, Err(ConnectionError::ConnectFailed(_))));
        assert_eq!(probe.connect_attempts(), 3);
        assert_eq!(manager.state(), &ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn fatal_connect_errors_abort_immediately() {
        let transport = MockTransport::new();
        transport.fail_connect_fatally();
        let probe = transport.clone();

        let mut manager = ConnectionManager::with_policy(transport, fast_policy());
        let result = manager.connect("localhost", 1883, 0).await;

        assert!(matches!(result, Err(ConnectionError::ConnectFailed(_))));
        assert_eq!(probe.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn poll_failure_triggers_exactly_one_reconnect() {
        let transport = MockTransport::new();
        let probe = transport.clone();
        let mut manager = ConnectionManager::with_policy(transport, fast_policy());
        manager.connect("localhost", 1883, 1).await.unwrap();

        probe.fail_next_polls(1);
        let result = manager.poll_once().await;
        assert!(matches!(result, Err(ConnectionError::PollFailed(_))));

        let ops = probe.ops();
        assert_eq!(
            &ops[ops.len() - 2..],
            &[TransportOp::Poll, TransportOp::Reconnect]
        );
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn failed_reconnect_leaves_reconnecting_state() {
        let transport = MockTransport::new();
        let probe = transport.clone();
        let mut manager = ConnectionManager::with_policy(transport, fast_policy());
        manager.connect("localhost", 1883, 1).await.unwrap();

        probe.fail_next_polls(1);
        probe.fail_next_reconnects(1);
        let result = manager.poll_once().await;

        assert!(result.is_err());
        assert_eq!(manager.state(), &ConnectionState::Reconnecting(1));

        // The next cycle polls again and recovers without a close/init.
        manager.poll_once().await.unwrap();
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn close_disconnects_the_transport() {
        let transport = MockTransport::new();
        let probe = transport.clone();
        let mut manager = ConnectionManager::with_policy(transport, fast_policy());
        manager.connect("localhost", 1883, 1).await.unwrap();
        manager.close().await.unwrap();

        assert_eq!(probe.ops().last(), Some(&TransportOp::Disconnect));
        assert_eq!(manager.state(), &ConnectionState::Disconnected);
    }
}
