//! Test support: a recording mock transport.

pub mod mocks;

pub use mocks::{MockError, MockTransport, TransportOp};
