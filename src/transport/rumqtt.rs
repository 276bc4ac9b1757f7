//! rumqttc-backed transport
//!
//! Wraps a rumqttc [`AsyncClient`]/[`EventLoop`] pair behind the
//! [`Transport`] trait. The event loop is owned here and only ever polled
//! from `connect`, `poll_once` and `reconnect` — the agent runtime is
//! cooperative and spawns no background task for it.

use crate::message::{Message, QosLevel};
use crate::transport::Transport;
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How long to wait for the broker's ConnAck on connect and reconnect.
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Keepalive interval announced to the broker.
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Errors surfaced by the rumqttc transport.
#[derive(Debug, Error)]
pub enum RumqttError {
    #[error("mqtt connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("timed out waiting for broker confirmation")]
    ConfirmationTimeout,
    #[error("transport is not connected")]
    NotConnected,
}

struct Session {
    client: AsyncClient,
    event_loop: EventLoop,
}

/// MQTT transport built on rumqttc.
pub struct RumqttTransport {
    client_name: String,
    session: Option<Session>,
}

impl RumqttTransport {
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_owned(),
            session: None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session, RumqttError> {
        self.session.as_mut().ok_or(RumqttError::NotConnected)
    }

    /// Poll the event loop until the broker confirms the session.
    async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), RumqttError> {
        let confirmed = tokio::time::timeout(CONFIRMATION_TIMEOUT, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(RumqttError::Connection(e)),
                }
            }
        })
        .await;

        match confirmed {
            Ok(result) => result,
            Err(_) => Err(RumqttError::ConfirmationTimeout),
        }
    }

    fn map_qos(qos: QosLevel) -> QoS {
        match qos {
            QosLevel::AtMostOnce => QoS::AtMostOnce,
            QosLevel::AtLeastOnce => QoS::AtLeastOnce,
            QosLevel::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

#[async_trait]
impl Transport for RumqttTransport {
    type Error = RumqttError;

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), RumqttError> {
        let mut options = MqttOptions::new(&self.client_name, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(false);

        let (client, mut event_loop) = AsyncClient::new(options, 10);
        Self::wait_for_connack(&mut event_loop).await?;

        debug!(client = %self.client_name, host, port, "broker confirmed connection");
        self.session = Some(Session { client, event_loop });
        Ok(())
    }

    async fn poll_once(&mut self, timeout: Duration, max_events: usize) -> Result<(), RumqttError> {
        let session = self.session_mut()?;

        for _ in 0..max_events {
            match tokio::time::timeout(timeout, session.event_loop.poll()).await {
                Ok(Ok(_event)) => {}
                Ok(Err(e)) => return Err(RumqttError::Connection(e)),
                // Nothing to process within the budget.
                Err(_) => break,
            }
        }
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), RumqttError> {
        let session = self.session_mut()?;

        // Polling after a failure makes rumqttc dial the broker again; wait
        // for the fresh ConnAck so the caller knows the session is back.
        Self::wait_for_connack(&mut session.event_loop).await
    }

    fn publish(&mut self, message: &Message) -> Result<(), RumqttError> {
        let session = self.session_mut()?;

        session.client.try_publish(
            message.topic(),
            Self::map_qos(message.qos()),
            message.retain(),
            message.payload().as_bytes().to_vec(),
        )?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), RumqttError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => return Ok(()),
        };

        session.client.disconnect().await?;

        // Give the event loop a chance to flush the DISCONNECT packet.
        let mut event_loop = session.event_loop;
        let _ = tokio::time::timeout(Duration::from_millis(250), event_loop.poll()).await;
        Ok(())
    }

    fn is_retryable(error: &RumqttError) -> bool {
        match error {
            RumqttError::Connection(e) => matches!(
                e,
                ConnectionError::Io(_)
                    | ConnectionError::NetworkTimeout
                    | ConnectionError::FlushTimeout
            ),
            RumqttError::ConfirmationTimeout => true,
            RumqttError::Client(_) | RumqttError::NotConnected => false,
        }
    }
}
