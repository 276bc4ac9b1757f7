//! mqttagent — a cooperative runtime for periodic MQTT publishers
//!
//! The runtime owns a broker connection and a registry of idle callbacks and
//! exposes a single per-tick entry point, [`Agent::idle`]: each call runs
//! every registered callback in registration order and then drives one
//! bounded network-poll step, reconnecting once if the poll fails. The host
//! paces the loop and owns cancellation; the agent never sleeps and never
//! spawns a background task.
//!
//! # Quick start
//!
//! ```no_run
//! use mqttagent::{Agent, Message, RumqttTransport};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! struct Counter {
//!     ticks: u64,
//! }
//!
//! let transport = RumqttTransport::new("counter");
//! let mut agent = Agent::new(transport, Counter { ticks: 0 });
//! agent.load_configuration("agent.toml".as_ref())?;
//!
//! agent.add_idle_call(|counter, core| {
//!     counter.ticks += 1;
//!     let msg = Message::new("demo/ticks", &counter.ticks.to_string(), 0, false)
//!         .map_err(|e| mqttagent::IdleError::failed(e.to_string()))?;
//!     core.publish(&msg)?;
//!     Ok(())
//! });
//!
//! agent.connect(5).await?;
//! loop {
//!     let report = agent.idle().await;
//!     if !report.is_clean() {
//!         // inspect report.call_errors() / report.poll_error()
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(200)).await;
//! }
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod observability;
pub mod resource;
pub mod testing;
pub mod transport;

pub use agent::{Agent, AgentCore, IdleCallError, IdleError, IdleRegistry, IdleReport};
pub use config::{AgentConfig, ConfigError};
pub use connection::{
    ConnectionError, ConnectionManager, ConnectionPolicy, ConnectionState, PublishError,
};
pub use error::{AgentError, AgentResult};
pub use message::{Message, MessageError, QosLevel};
pub use resource::ManagedResource;
pub use transport::{RumqttTransport, Transport};
