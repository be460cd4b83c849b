use futures_util::future::BoxFuture;

use super::connection::MiddlewarePoolConnection;
use crate::driver::DriverConnection;
use crate::error::ValkeyMiddlewareError;
use crate::pool::AnyConnWrapper;

impl MiddlewarePoolConnection {
    /// Interact with the native connection asynchronously.
    ///
    /// Available for the multiplexed and embedded drivers. The closure gets
    /// the connection for as long as its future runs:
    ///
    /// ```rust,no_run
    /// # use valkey_middleware::prelude::*;
    /// # async fn demo(conn: &mut MiddlewarePoolConnection) -> Result<(), ValkeyMiddlewareError> {
    /// let size = conn
    ///     .interact_async(|wrapper| {
    ///         Box::pin(async move {
    ///             match wrapper {
    ///                 AnyConnWrapper::Embedded(store) => Ok(store.len()),
    ///                 _ => Ok(0),
    ///             }
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = size;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// `Unimplemented` for the blocking driver (use
    /// [`interact_sync`](Self::interact_sync)); `InvalidState` or
    /// `Subscribed` unless the connection is idle in immediate mode; the
    /// closure's own error.
    #[allow(unused_variables)]
    pub async fn interact_async<F, R>(&mut self, func: F) -> Result<R, ValkeyMiddlewareError>
    where
        F: for<'c> FnOnce(AnyConnWrapper<'c>) -> BoxFuture<'c, Result<R, ValkeyMiddlewareError>>
            + Send,
        R: Send,
    {
        self.ensure_idle("interact_async")?;
        match &mut self.conn.driver {
            #[cfg(feature = "multiplexed")]
            DriverConnection::Multiplexed(driver) => {
                func(AnyConnWrapper::Multiplexed(driver.connection_mut())).await
            }
            #[cfg(feature = "embedded")]
            DriverConnection::Embedded(conn) => func(AnyConnWrapper::Embedded(conn.store())).await,
            #[cfg(feature = "blocking")]
            DriverConnection::Blocking(_) => Err(ValkeyMiddlewareError::Unimplemented(
                "interact_async is not supported for the blocking driver; use interact_sync instead"
                    .to_string(),
            )),
        }
    }

    /// Interact with the native connection synchronously.
    ///
    /// For the blocking driver the closure runs on the worker thread that
    /// owns the connection; for the embedded driver it runs inline.
    ///
    /// # Errors
    /// `Unimplemented` for the multiplexed driver (use
    /// [`interact_async`](Self::interact_async)); `InvalidState` or
    /// `Subscribed` unless the connection is idle in immediate mode; the
    /// closure's own error.
    #[allow(unused_variables)]
    pub async fn interact_sync<F, R>(&mut self, func: F) -> Result<R, ValkeyMiddlewareError>
    where
        F: FnOnce(AnyConnWrapper<'_>) -> Result<R, ValkeyMiddlewareError> + Send + 'static,
        R: Send + 'static,
    {
        self.ensure_idle("interact_sync")?;
        match &mut self.conn.driver {
            #[cfg(feature = "blocking")]
            DriverConnection::Blocking(driver) => {
                driver
                    .with_connection(move |conn| func(AnyConnWrapper::Blocking(conn)))
                    .await
            }
            #[cfg(feature = "embedded")]
            DriverConnection::Embedded(conn) => func(AnyConnWrapper::Embedded(conn.store())),
            #[cfg(feature = "multiplexed")]
            DriverConnection::Multiplexed(_) => Err(ValkeyMiddlewareError::Unimplemented(
                "interact_sync is not supported for the multiplexed driver; use interact_async instead"
                    .to_string(),
            )),
        }
    }
}
