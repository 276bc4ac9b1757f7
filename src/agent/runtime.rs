//! Agent composition and the per-tick entry point
//!
//! An [`Agent`] bundles the configuration resource, the connection manager,
//! the idle-call registry and a caller-supplied context value. The host
//! drives it by awaiting [`Agent::idle`] in a loop; the agent itself never
//! sleeps and never spawns a task — pacing and cancellation belong to the
//! host.

use crate::agent::idle::{IdleError, IdleRegistry, IdleReport};
use crate::config::{AgentConfig, ConfigError};
use crate::connection::{ConnectionManager, ConnectionPolicy, ConnectionState, PublishError};
use crate::error::AgentError;
use crate::message::Message;
use crate::resource::ManagedResource;
use crate::transport::Transport;
use std::path::Path;
use tracing::warn;

/// The callback-facing part of the agent: configuration plus connection.
///
/// Idle callbacks receive this alongside their context value. It deliberately
/// exposes no way to replace the configuration or close the connection —
/// those are host operations, not per-cycle ones.
pub struct AgentCore<T: Transport> {
    pub(crate) config: ManagedResource<AgentConfig>,
    pub(crate) connection: ConnectionManager<T>,
}

impl<T: Transport> AgentCore<T> {
    pub(crate) fn new(transport: T) -> Self {
        Self::with_policy(transport, ConnectionPolicy::default())
    }

    pub(crate) fn with_policy(transport: T, policy: ConnectionPolicy) -> Self {
        Self {
            config: ManagedResource::empty(),
            connection: ConnectionManager::with_policy(transport, policy),
        }
    }

    /// The currently attached configuration, if any.
    pub fn configuration(&self) -> Option<&AgentConfig> {
        self.config.get()
    }

    pub fn connection_state(&self) -> &ConnectionState {
        self.connection.state()
    }

    /// Relay a message to the broker. The message is borrowed and remains
    /// with the caller whatever the outcome.
    pub fn publish(&mut self, message: &Message) -> Result<(), PublishError> {
        self.connection.publish(message)
    }
}

/// The agent runtime.
///
/// `S` is the caller's private context, handed in at construction and handed
/// back by [`close`](Agent::close) — the agent never destroys it. `T` is the
/// broker transport.
pub struct Agent<S, T: Transport> {
    core: AgentCore<T>,
    idle_calls: IdleRegistry<S, T>,
    state: S,
}

impl<S, T: Transport> Agent<S, T> {
    /// Create an agent with an empty idle registry and no configuration.
    pub fn new(transport: T, state: S) -> Self {
        Self {
            core: AgentCore::new(transport),
            idle_calls: IdleRegistry::new(),
            state,
        }
    }

    /// Like [`new`](Self::new) with an explicit connection policy.
    pub fn with_policy(transport: T, policy: ConnectionPolicy, state: S) -> Self {
        Self {
            core: AgentCore::with_policy(transport, policy),
            idle_calls: IdleRegistry::new(),
            state,
        }
    }

    /// Load a configuration file and attach it as the agent's owned
    /// configuration.
    ///
    /// The file is fully resolved before the previous configuration is
    /// touched: on any error the agent keeps whatever configuration it had.
    pub fn load_configuration(&mut self, path: &Path) -> Result<(), ConfigError> {
        let config = AgentConfig::load_from_file(path)?;
        self.core.config.move_into(config);
        Ok(())
    }

    /// Attach an already resolved configuration, replacing (and releasing)
    /// any previous one.
    pub fn set_configuration(&mut self, config: AgentConfig) {
        self.core.config.move_into(config);
    }

    /// Attach a configuration without giving the agent ownership of it:
    /// replacing or closing later detaches it without running any release
    /// hook.
    pub fn set_borrowed_configuration(&mut self, config: AgentConfig) {
        self.core.config.set_borrowed(config);
    }

    pub fn configuration(&self) -> Option<&AgentConfig> {
        self.core.configuration()
    }

    pub fn connection_state(&self) -> &ConnectionState {
        self.core.connection_state()
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Connect to the broker named by the attached configuration.
    ///
    /// `max_retries` bounds the connect attempts; `0` retries indefinitely.
    /// Requires a configuration; meant to run once, before the idle loop.
    pub async fn connect(&mut self, max_retries: u32) -> Result<(), AgentError> {
        let config = self
            .core
            .config
            .get()
            .ok_or(AgentError::NotConfigured)?;
        let (host, port) = (config.host.clone(), config.port);

        self.core.connection.connect(&host, port, max_retries).await?;
        Ok(())
    }

    /// Register an idle callback. Callbacks run in registration order, once
    /// per idle cycle.
    pub fn add_idle_call(
        &mut self,
        call: impl FnMut(&mut S, &mut AgentCore<T>) -> Result<(), IdleError> + Send + 'static,
    ) {
        self.idle_calls.add(call);
    }

    pub fn idle_call_count(&self) -> usize {
        self.idle_calls.len()
    }

    /// One unit of per-tick work: run every idle callback in order, then
    /// drive one bounded network-poll step.
    ///
    /// Nothing in here sleeps; the host paces the loop. Failures never abort
    /// the cycle — they are aggregated into the returned report.
    pub async fn idle(&mut self) -> IdleReport {
        let call_errors = self.idle_calls.dispatch_all(&mut self.state, &mut self.core);
        let poll_error = self.core.connection.poll_once().await.err();

        IdleReport {
            call_errors,
            poll_error,
        }
    }

    /// Tear the agent down: clear the idle registry, close the connection,
    /// release the owned configuration and hand the caller's context back.
    pub async fn close(mut self) -> S {
        self.idle_calls.clear();
        if let Err(e) = self.core.connection.close().await {
            warn!(error = %e, "disconnect failed during shutdown");
        }
        self.core.config.release();
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn connect_without_configuration_is_rejected() {
        let mut agent = Agent::new(MockTransport::new(), ());
        let result = agent.connect(1).await;
        assert!(matches!(result, Err(AgentError::NotConfigured)));
    }

    #[tokio::test]
    async fn close_returns_the_caller_context() {
        let transport = MockTransport::new();
        let probe = transport.clone();
        let mut agent = Agent::new(transport, vec![1u8, 2, 3]);
        agent.add_idle_call(|_, _| Ok(()));

        let state = agent.close().await;
        assert_eq!(state, vec![1, 2, 3]);
        assert_eq!(
            probe.ops().last(),
            Some(&crate::testing::TransportOp::Disconnect)
        );
    }

    #[test]
    fn set_configuration_replaces_the_previous_one() {
        let mut agent = Agent::new(MockTransport::new(), ());
        agent.set_configuration(AgentConfig {
            client_name: "one".into(),
            host: "localhost".into(),
            port: 1883,
        });
        agent.set_configuration(AgentConfig {
            client_name: "two".into(),
            host: "localhost".into(),
            port: 1883,
        });

        assert_eq!(agent.configuration().unwrap().client_name, "two");
    }

    #[test]
    fn borrowed_configuration_is_readable_like_an_owned_one() {
        let mut agent = Agent::new(MockTransport::new(), ());
        agent.set_borrowed_configuration(AgentConfig {
            client_name: "shared".into(),
            host: "localhost".into(),
            port: 1883,
        });

        assert_eq!(agent.configuration().unwrap().client_name, "shared");
    }
}
