//! Connect-retry and reconnect-on-failure tests
//!
//! Exercises the connection manager's policy through the full agent: bounded
//! and unbounded connect retries, immediate abort on non-retryable errors,
//! and the single-reconnect-per-failed-poll rule.

use mqttagent::testing::{MockTransport, TransportOp};
use mqttagent::{Agent, AgentConfig, ConnectionPolicy, ConnectionState, IdleError, Message};
use std::time::Duration;

fn fast_policy() -> ConnectionPolicy {
    ConnectionPolicy {
        connect_backoff: Duration::ZERO,
        ..ConnectionPolicy::default()
    }
}

fn configured_agent(transport: MockTransport) -> Agent<(), MockTransport> {
    let mut agent = Agent::with_policy(transport, fast_policy(), ());
    agent.set_configuration(AgentConfig {
        client_name: "retry-test".to_string(),
        host: "localhost".to_string(),
        port: 1883,
    });
    agent
}

#[tokio::test]
async fn refused_connects_are_retried_until_success() {
    let transport = MockTransport::new();
    transport.refuse_connects(3);
    let probe = transport.clone();

    let mut agent = configured_agent(transport);
    // 0 = retry indefinitely
    agent.connect(0).await.unwrap();

    assert_eq!(probe.connect_attempts(), 4);
    assert_eq!(agent.connection_state(), &ConnectionState::Connected);
}

#[tokio::test]
async fn bounded_retries_are_exhausted() {
    let transport = MockTransport::new();
    transport.refuse_connects(10);
    let probe = transport.clone();

    let mut agent = configured_agent(transport);
    let result = agent.connect(3).await;

    assert!(result.is_err());
    assert_eq!(probe.connect_attempts(), 3);
    assert_eq!(agent.connection_state(), &ConnectionState::Disconnected);
}

#[tokio::test]
async fn non_retryable_connect_errors_abort_immediately() {
    let transport = MockTransport::new();
    transport.fail_connect_fatally();
    let probe = transport.clone();

    let mut agent = configured_agent(transport);
    let result = agent.connect(0).await;

    assert!(result.is_err());
    assert_eq!(probe.connect_attempts(), 1);
}

#[tokio::test]
async fn failed_poll_is_followed_by_exactly_one_reconnect() {
    let transport = MockTransport::new();
    let probe = transport.clone();

    let mut agent = configured_agent(transport);
    agent.connect(1).await.unwrap();

    probe.fail_next_polls(1);
    let report = agent.idle().await;
    assert!(report.poll_error().is_some());

    let ops = probe.ops();
    assert_eq!(
        &ops[ops.len() - 2..],
        &[TransportOp::Poll, TransportOp::Reconnect]
    );
}

#[tokio::test]
async fn publish_works_again_after_reconnect() {
    let transport = MockTransport::new();
    let probe = transport.clone();

    let mut agent = configured_agent(transport);
    agent.add_idle_call(|_, core| {
        let msg =
            Message::new("t/value", "1", 1, false).map_err(|e| IdleError::failed(e.to_string()))?;
        core.publish(&msg)?;
        Ok(())
    });
    agent.connect(1).await.unwrap();

    // First cycle: publish goes through, poll fails, one reconnect runs.
    probe.fail_next_polls(1);
    let report = agent.idle().await;
    assert!(report.poll_error().is_some());

    // Second cycle: no close/init happened in between, publish and poll are
    // back to normal.
    let report = agent.idle().await;
    assert!(report.is_clean());
    assert_eq!(probe.published().len(), 2);
    assert_eq!(agent.connection_state(), &ConnectionState::Connected);

    let ops = probe.ops();
    assert_eq!(
        &ops[ops.len() - 2..],
        &[
            TransportOp::Publish(probe.published()[1].clone()),
            TransportOp::Poll
        ]
    );
}

#[tokio::test]
async fn reconnect_failure_is_surfaced_and_retried_next_cycle() {
    let transport = MockTransport::new();
    let probe = transport.clone();

    let mut agent = configured_agent(transport);
    agent.connect(1).await.unwrap();

    probe.fail_next_polls(2);
    probe.fail_next_reconnects(2);

    // Two bad cycles in a row: each polls once and reconnects once.
    agent.idle().await;
    assert_eq!(agent.connection_state(), &ConnectionState::Reconnecting(1));
    agent.idle().await;
    assert_eq!(agent.connection_state(), &ConnectionState::Reconnecting(2));

    // Third cycle recovers.
    let report = agent.idle().await;
    assert!(report.is_clean());
    assert_eq!(agent.connection_state(), &ConnectionState::Connected);
}
