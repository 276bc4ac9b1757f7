//! Mock transport for testing
//!
//! Records every transport operation in call order and supports scripted
//! failures, so connection policy and idle dispatch can be tested without a
//! broker. Clones share state: keep one clone as a probe and hand the other
//! to the agent.

use crate::message::Message;
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// One recorded transport operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOp {
    Connect { host: String, port: u16 },
    Poll,
    Reconnect,
    Publish(Message),
    Disconnect,
}

/// Scriptable mock failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MockError {
    message: String,
    retryable: bool,
}

impl MockError {
    fn refused() -> Self {
        Self {
            message: "connection refused".to_string(),
            retryable: true,
        }
    }

    fn fatal(message: &str) -> Self {
        Self {
            message: message.to_string(),
            retryable: false,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    ops: Vec<TransportOp>,
    refuse_connects: u32,
    fatal_connect: bool,
    fail_polls: u32,
    fail_reconnects: u32,
}

/// Recording transport double.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connect attempts with a retryable error.
    pub fn refuse_connects(&self, n: u32) {
        self.state.lock().unwrap().refuse_connects = n;
    }

    /// Fail the next connect attempt with a non-retryable error.
    pub fn fail_connect_fatally(&self) {
        self.state.lock().unwrap().fatal_connect = true;
    }

    /// Fail the next `n` poll steps.
    pub fn fail_next_polls(&self, n: u32) {
        self.state.lock().unwrap().fail_polls = n;
    }

    /// Fail the next `n` reconnect attempts.
    pub fn fail_next_reconnects(&self, n: u32) {
        self.state.lock().unwrap().fail_reconnects = n;
    }

    /// Every operation seen so far, in call order.
    pub fn ops(&self) -> Vec<TransportOp> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Messages handed to `publish`, in call order.
    pub fn published(&self) -> Vec<Message> {
        self.state
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter_map(|op| match op {
                TransportOp::Publish(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter(|op| matches!(op, TransportOp::Connect { .. }))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockError;

    async fn connect(&mut self, host: &str, port: u16) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(TransportOp::Connect {
            host: host.to_string(),
            port,
        });

        if state.fatal_connect {
            state.fatal_connect = false;
            return Err(MockError::fatal("broker rejected the session"));
        }
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(MockError::refused());
        }
        Ok(())
    }

    async fn poll_once(&mut self, _timeout: Duration, _max_events: usize) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(TransportOp::Poll);

        if state.fail_polls > 0 {
            state.fail_polls -= 1;
            return Err(MockError::fatal("poll failed"));
        }
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(TransportOp::Reconnect);

        if state.fail_reconnects > 0 {
            state.fail_reconnects -= 1;
            return Err(MockError::fatal("reconnect failed"));
        }
        Ok(())
    }

    fn publish(&mut self, message: &Message) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(TransportOp::Publish(message.clone()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MockError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(TransportOp::Disconnect);
        Ok(())
    }

    fn is_retryable(error: &MockError) -> bool {
        error.retryable
    }
}
