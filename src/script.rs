use sha1::{Digest, Sha1};

/// A Lua script together with its SHA1 digest.
///
/// Run it with [`MiddlewarePoolConnection::eval_script`](crate::pool::MiddlewarePoolConnection::eval_script),
/// which tries `EVALSHA` first and only sends the full source when the
/// server answers `NOSCRIPT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    source: String,
    sha1: String,
}

impl Script {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let sha1 = sha1_hex(source.as_bytes());
        Self { source, sha1 }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Lower-case hex digest, as `SCRIPT LOAD` reports it.
    #[must_use]
    pub fn sha1(&self) -> &str {
        &self.sha1
    }
}

pub(crate) fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_known_value() {
        let script = Script::new("return 1");
        assert_eq!(script.sha1(), "e0e1f9fabfc9d4800c877a703b823ac0578ff8db");
        assert_eq!(script.source(), "return 1");
    }
}
