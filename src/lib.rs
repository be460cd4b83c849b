//! Pooled data access for Valkey and Redis over interchangeable drivers.
//!
//! A [`ConfigAndPool`] owns a bb8 pool of physical connections created by
//! one of three drivers:
//!
//! - `Multiplexed`: redis-rs multiplexed async connection
//! - `Blocking`: synchronous redis-rs connection on a worker thread
//! - `Embedded`: in-process store, no server needed
//!
//! Every borrowed [`MiddlewarePoolConnection`] exposes the same typed command
//! surface. Commands run immediately, or are queued inside a pipeline or
//! `MULTI` and correlated with their replies by position when the batch is
//! sent.
//!
//! ```rust,no_run
//! use valkey_middleware::prelude::*;
//!
//! # async fn demo() -> Result<(), ValkeyMiddlewareError> {
//! let pool = ConfigAndPool::new(ConnectionOptions::embedded()).await?;
//! let mut conn = pool.get_connection().await?;
//!
//! conn.open_pipeline()?;
//! conn.incr("hits").await?;
//! conn.get("hits").await?;
//! let replies = conn.close_pipeline().await?;
//! assert_eq!(replies.len(), 2);
//!
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(feature = "multiplexed", feature = "blocking", feature = "embedded")))]
compile_error!("enable at least one driver feature: multiplexed, blocking or embedded");

pub mod prelude;

#[cfg(feature = "blocking")]
mod blocking;
pub mod command;
pub mod config;
mod driver;
#[cfg(feature = "embedded")]
pub mod embedded;
pub mod error;
pub mod execution;
pub mod handle;
#[cfg(feature = "multiplexed")]
mod multiplexed;
pub mod pool;
pub mod pubsub;
pub mod results;
pub mod scan;
pub mod script;
pub mod tx_outcome;
pub mod types;

pub use command::Command;
pub use config::{ConnectionOptions, ConnectionOptionsBuilder, PoolOptions};
#[cfg(feature = "embedded")]
pub use embedded::EmbeddedStore;
pub use error::{ConversionErrors, ConversionFailure, ErrorKind, ServerError, ValkeyMiddlewareError};
pub use execution::ExecutionMode;
pub use handle::{HandleState, ResultHandle};
pub use pool::{
    AnyConnWrapper, ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection, PoolStatus,
};
pub use pubsub::{
    ChannelListener, Message, MessageListener, MessageReceiver, SlotId, SubscriptionInfo,
    SubscriptionKind, message_channel,
};
pub use results::{Converter, Reply, Value};
pub use scan::ScanCursor;
pub use script::Script;
pub use tx_outcome::ExecOutcome;
pub use types::{
    CommandOutcome, DriverType, Expiration, ScanOptions, ScoreBound, SetCondition, SetOptions,
    StreamEntry, StreamId,
};
