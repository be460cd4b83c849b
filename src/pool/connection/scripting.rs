use tracing::debug;

use super::{MiddlewarePoolConnection, required};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::{Value, convert};
use crate::script::Script;
use crate::types::CommandOutcome;

fn script_command<K: AsRef<[u8]>, A: AsRef<[u8]>>(
    verb: &str,
    body: &str,
    keys: &[K],
    args: &[A],
) -> Command {
    Command::new(verb)
        .arg(body)
        .arg(keys.len().to_string())
        .args(keys)
        .args(args)
}

impl MiddlewarePoolConnection {
    /// Run a Lua script from source.
    pub async fn eval<K: AsRef<[u8]>, A: AsRef<[u8]>>(
        &mut self,
        script: &str,
        keys: &[K],
        args: &[A],
    ) -> Result<CommandOutcome<Value>, ValkeyMiddlewareError> {
        self.dispatch(script_command("EVAL", script, keys, args), convert::RAW)
            .await
    }

    /// Run a cached script by digest. A missing script comes back as a
    /// `Backend` error whose [`ServerError::is_no_script`](crate::error::ServerError::is_no_script)
    /// is true.
    pub async fn evalsha<K: AsRef<[u8]>, A: AsRef<[u8]>>(
        &mut self,
        sha1: &str,
        keys: &[K],
        args: &[A],
    ) -> Result<CommandOutcome<Value>, ValkeyMiddlewareError> {
        self.dispatch(script_command("EVALSHA", sha1, keys, args), convert::RAW)
            .await
    }

    /// Run `script` by digest, falling back to the full source when the
    /// server does not have it cached.
    ///
    /// While queueing there is no reply to inspect, so the full source is
    /// queued right away.
    pub async fn eval_script<K: AsRef<[u8]>, A: AsRef<[u8]>>(
        &mut self,
        script: &Script,
        keys: &[K],
        args: &[A],
    ) -> Result<CommandOutcome<Value>, ValkeyMiddlewareError> {
        if self.is_queueing() {
            return self.eval(script.source(), keys, args).await;
        }
        match self.evalsha(script.sha1(), keys, args).await {
            Err(ValkeyMiddlewareError::Backend(err)) if err.is_no_script() => {
                debug!(sha1 = script.sha1(), "script not cached, sending source");
                self.eval(script.source(), keys, args).await
            }
            other => other,
        }
    }

    /// Cache a script on the server, returning its digest.
    pub async fn script_load(
        &mut self,
        script: &str,
    ) -> Result<CommandOutcome<String>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("SCRIPT").arg("LOAD").arg(script),
            convert::STATUS,
        )
        .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty digest list.
    pub async fn script_exists<S: AsRef<[u8]>>(
        &mut self,
        sha1s: &[S],
    ) -> Result<CommandOutcome<Vec<bool>>, ValkeyMiddlewareError> {
        let sha1s = required(sha1s, "SCRIPT EXISTS", "digest")?;
        self.dispatch(
            Command::new("SCRIPT").arg("EXISTS").args(sha1s),
            convert::BOOL_LIST,
        )
        .await
    }

    pub async fn script_flush(&mut self) -> Result<CommandOutcome<()>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("SCRIPT").arg("FLUSH"), convert::UNIT)
            .await
    }
}
