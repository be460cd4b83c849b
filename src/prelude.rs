//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so a single glob
//! import is enough to open a pool and issue commands.

pub use crate::config::{ConnectionOptions, ConnectionOptionsBuilder};
pub use crate::error::{ErrorKind, ValkeyMiddlewareError};
pub use crate::execution::ExecutionMode;
pub use crate::handle::ResultHandle;
pub use crate::pool::{AnyConnWrapper, ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection};
pub use crate::pubsub::{Message, MessageListener, SubscriptionKind, message_channel};
pub use crate::results::{Reply, Value};
pub use crate::script::Script;
pub use crate::tx_outcome::ExecOutcome;
pub use crate::types::{CommandOutcome, DriverType, ScanOptions, ScoreBound, SetOptions, StreamId};

#[cfg(feature = "embedded")]
pub use crate::embedded::EmbeddedStore;
