//! Idle-call registry and dispatch
//!
//! Callbacks are appended in registration order and invoked in exactly that
//! order once per idle cycle. Dispatch never short-circuits: a failing
//! callback does not stop the ones behind it. Every failure is collected into
//! the cycle's [`IdleReport`] together with the outcome of the poll step.

use crate::agent::runtime::AgentCore;
use crate::connection::{ConnectionError, PublishError};
use crate::transport::Transport;
use thiserror::Error;

/// Error reported by an idle callback.
#[derive(Debug, Error)]
pub enum IdleError {
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("idle call failed: {message}")]
    Failed { message: String },
}

impl IdleError {
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// A callback failure tagged with the callback's registration position.
#[derive(Debug)]
pub struct IdleCallError {
    pub index: usize,
    pub error: IdleError,
}

/// Aggregate outcome of one idle cycle: every callback failure plus the
/// result of the network-poll step.
#[derive(Debug, Default)]
pub struct IdleReport {
    pub(crate) call_errors: Vec<IdleCallError>,
    pub(crate) poll_error: Option<ConnectionError>,
}

impl IdleReport {
    /// True when every callback succeeded and the poll step went through.
    pub fn is_clean(&self) -> bool {
        self.call_errors.is_empty() && self.poll_error.is_none()
    }

    pub fn call_errors(&self) -> &[IdleCallError] {
        &self.call_errors
    }

    pub fn poll_error(&self) -> Option<&ConnectionError> {
        self.poll_error.as_ref()
    }
}

type IdleCall<S, T> = Box<dyn FnMut(&mut S, &mut AgentCore<T>) -> Result<(), IdleError> + Send>;

/// Ordered, growable sequence of idle callbacks.
pub struct IdleRegistry<S, T: Transport> {
    entries: Vec<IdleCall<S, T>>,
}

impl<S, T: Transport> IdleRegistry<S, T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a callback. Registration order is dispatch order.
    pub fn add(
        &mut self,
        call: impl FnMut(&mut S, &mut AgentCore<T>) -> Result<(), IdleError> + Send + 'static,
    ) {
        self.entries.push(Box::new(call));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registration. Used at agent teardown.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Invoke every callback in registration order, collecting failures
    /// instead of aborting on the first one.
    pub(crate) fn dispatch_all(
        &mut self,
        state: &mut S,
        core: &mut AgentCore<T>,
    ) -> Vec<IdleCallError> {
        let mut errors = Vec::new();
        for (index, call) in self.entries.iter_mut().enumerate() {
            if let Err(error) = call(state, core) {
                errors.push(IdleCallError { index, error });
            }
        }
        errors
    }
}

impl<S, T: Transport> Default for IdleRegistry<S, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn core() -> AgentCore<MockTransport> {
        AgentCore::new(MockTransport::new())
    }

    #[test]
    fn registry_starts_empty_and_grows() {
        let mut registry: IdleRegistry<u32, MockTransport> = IdleRegistry::new();
        assert!(registry.is_empty());

        registry.add(|_, _| Ok(()));
        registry.add(|_, _| Ok(()));
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn dispatch_runs_in_registration_order() {
        let mut registry: IdleRegistry<Vec<&'static str>, MockTransport> = IdleRegistry::new();
        registry.add(|log, _| {
            log.push("A");
            Ok(())
        });
        registry.add(|log, _| {
            log.push("B");
            Ok(())
        });
        registry.add(|log, _| {
            log.push("C");
            Ok(())
        });

        let mut log = Vec::new();
        let errors = registry.dispatch_all(&mut log, &mut core());

        assert!(errors.is_empty());
        assert_eq!(log, vec!["A", "B", "C"]);
    }

    #[test]
    fn dispatch_does_not_short_circuit_on_failure() {
        let mut registry: IdleRegistry<Vec<&'static str>, MockTransport> = IdleRegistry::new();
        registry.add(|log, _| {
            log.push("first");
            Err(IdleError::failed("boom"))
        });
        registry.add(|log, _| {
            log.push("second");
            Ok(())
        });
        registry.add(|log, _| {
            log.push("third");
            Err(IdleError::failed("bang"))
        });

        let mut log = Vec::new();
        let errors = registry.dispatch_all(&mut log, &mut core());

        assert_eq!(log, vec!["first", "second", "third"]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].index, 0);
        assert_eq!(errors[1].index, 2);
    }

    #[test]
    fn clean_report_has_no_errors() {
        let report = IdleReport::default();
        assert!(report.is_clean());
        assert!(report.call_errors().is_empty());
        assert!(report.poll_error().is_none());
    }
}
