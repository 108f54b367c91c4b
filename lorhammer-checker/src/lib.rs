//! # Lorhammer Checker
//!
//! Verifies what the network server published while a load test ran.
//! Every shard of the configured topic is consumed concurrently, each
//! message is normalized with the check's remove patterns and compared with
//! its expected text, and the outcomes are merged when the run finalizes.

use async_trait::async_trait;

mod error;
pub mod matcher;
pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;
pub mod outcome;
pub mod registry;
pub mod source;
pub mod stream;

pub use error::{CheckerError, SourceError};
pub use memory::MemoryBroker;
#[cfg(feature = "nats")]
pub use nats::NatsConnector;
pub use outcome::{CheckFailure, CheckOutcome, CheckReport, CheckSuccess, FailureReason};
pub use registry::CheckerRegistry;
pub use stream::StreamChecker;

/// A result checker: started before traffic is generated, checked once after.
#[async_trait]
pub trait Checker: Send {
    async fn start(&mut self) -> Result<(), CheckerError>;

    /// Stops consumption and returns everything observed. Callable once.
    async fn check(&mut self) -> Result<CheckReport, CheckerError>;
}
