//! Command implementations of the embedded engine.
//!
//! Every handler receives the arguments after the verb and answers either a
//! reply `Value` or a `ServerError`, which the caller turns into an in-band
//! error reply.

mod hashes;
mod keys;
mod lists;
mod sets;
mod strings;
mod streams;
mod zsets;

use crate::error::ServerError;
use crate::results::Value;

use super::keyspace::Keyspace;

pub(crate) type CommandResult = Result<Value, ServerError>;

type Handler = fn(&mut Keyspace, &[Vec<u8>]) -> CommandResult;

fn lookup(name: &str) -> Option<Handler> {
    let handler: Handler = match name {
        "DEL" | "UNLINK" => keys::del,
        "EXISTS" => keys::exists,
        "TYPE" => keys::key_type,
        "KEYS" => keys::keys,
        "SCAN" => keys::scan,
        "RENAME" => keys::rename,
        "EXPIRE" => keys::expire,
        "PEXPIRE" => keys::pexpire,
        "TTL" => keys::ttl,
        "PTTL" => keys::pttl,
        "PERSIST" => keys::persist,
        "DBSIZE" => keys::dbsize,
        "FLUSHDB" | "FLUSHALL" => keys::flush,

        "GET" => strings::get,
        "SET" => strings::set,
        "SETNX" => strings::setnx,
        "GETSET" => strings::getset,
        "GETDEL" => strings::getdel,
        "GETRANGE" => strings::getrange,
        "MGET" => strings::mget,
        "MSET" => strings::mset,
        "INCR" => strings::incr,
        "DECR" => strings::decr,
        "INCRBY" => strings::incrby,
        "DECRBY" => strings::decrby,
        "INCRBYFLOAT" => strings::incrbyfloat,
        "APPEND" => strings::append,
        "STRLEN" => strings::strlen,

        "HSET" | "HMSET" => hashes::hset,
        "HSETNX" => hashes::hsetnx,
        "HGET" => hashes::hget,
        "HMGET" => hashes::hmget,
        "HGETALL" => hashes::hgetall,
        "HDEL" => hashes::hdel,
        "HEXISTS" => hashes::hexists,
        "HLEN" => hashes::hlen,
        "HKEYS" => hashes::hkeys,
        "HVALS" => hashes::hvals,
        "HINCRBY" => hashes::hincrby,
        "HSCAN" => hashes::hscan,

        "LPUSH" => lists::lpush,
        "RPUSH" => lists::rpush,
        "LPOP" => lists::lpop,
        "RPOP" => lists::rpop,
        "LRANGE" => lists::lrange,
        "LLEN" => lists::llen,
        "LINDEX" => lists::lindex,
        "LSET" => lists::lset,
        "LREM" => lists::lrem,
        "LTRIM" => lists::ltrim,

        "SADD" => sets::sadd,
        "SREM" => sets::srem,
        "SMEMBERS" => sets::smembers,
        "SISMEMBER" => sets::sismember,
        "SMISMEMBER" => sets::smismember,
        "SCARD" => sets::scard,
        "SDIFF" => sets::sdiff,
        "SINTER" => sets::sinter,
        "SUNION" => sets::sunion,
        "SDIFFSTORE" => sets::sdiffstore,
        "SINTERSTORE" => sets::sinterstore,
        "SUNIONSTORE" => sets::sunionstore,
        "SRANDMEMBER" => sets::srandmember,
        "SPOP" => sets::spop,
        "SMOVE" => sets::smove,
        "SSCAN" => sets::sscan,

        "ZADD" => zsets::zadd,
        "ZINCRBY" => zsets::zincrby,
        "ZREM" => zsets::zrem,
        "ZSCORE" => zsets::zscore,
        "ZCARD" => zsets::zcard,
        "ZCOUNT" => zsets::zcount,
        "ZRANK" => zsets::zrank,
        "ZREVRANK" => zsets::zrevrank,
        "ZRANGE" => zsets::zrange,
        "ZREVRANGE" => zsets::zrevrange,
        "ZRANGEBYSCORE" => zsets::zrangebyscore,
        "ZSCAN" => zsets::zscan,

        "XADD" => streams::xadd,
        "XLEN" => streams::xlen,
        "XRANGE" => streams::xrange,
        "XREVRANGE" => streams::xrevrange,
        "XDEL" => streams::xdel,
        "XTRIM" => streams::xtrim,
        _ => return None,
    };
    Some(handler)
}

/// Arity in the server's convention: the count includes the verb and a
/// negative value is a minimum.
fn arity(name: &str) -> Option<i32> {
    let arity = match name {
        "TIME" | "DBSIZE" | "UNWATCH" => 1,
        "PING" | "FLUSHDB" | "FLUSHALL" => -1,
        "ECHO" | "SELECT" | "TYPE" | "KEYS" | "TTL" | "PTTL" | "PERSIST" | "GET" | "GETDEL"
        | "INCR" | "DECR" | "STRLEN" | "HGETALL" | "HLEN" | "HKEYS" | "HVALS" | "LLEN"
        | "SMEMBERS" | "SCARD" | "ZCARD" | "XLEN" => 2,
        "DEL" | "UNLINK" | "EXISTS" | "SCAN" | "MGET" | "LPOP" | "RPOP" | "SDIFF" | "SINTER"
        | "SUNION" | "SRANDMEMBER" | "SPOP" | "SCRIPT" | "WATCH" => -2,
        "PUBLISH" | "RENAME" | "SETNX" | "GETSET" | "INCRBY" | "DECRBY" | "INCRBYFLOAT"
        | "APPEND" | "HGET" | "HEXISTS" | "LINDEX" | "SISMEMBER" | "ZSCORE" => 3,
        "EXPIRE" | "PEXPIRE" | "SET" | "MSET" | "HMGET" | "HDEL" | "HSCAN" | "LPUSH" | "RPUSH"
        | "SADD" | "SREM" | "SMISMEMBER" | "SDIFFSTORE" | "SINTERSTORE" | "SUNIONSTORE"
        | "SSCAN" | "ZREM" | "ZRANK" | "ZREVRANK" | "ZSCAN" | "XDEL" | "EVAL" | "EVALSHA" => -3,
        "GETRANGE" | "HSETNX" | "HINCRBY" | "LRANGE" | "LSET" | "LREM" | "LTRIM" | "SMOVE"
        | "ZINCRBY" | "ZCOUNT" => 4,
        "HSET" | "HMSET" | "ZADD" | "ZRANGE" | "ZREVRANGE" | "ZRANGEBYSCORE" | "XRANGE"
        | "XREVRANGE" | "XTRIM" => -4,
        "XADD" => -5,
        _ => return None,
    };
    Some(arity)
}

fn unknown_command(name: &str) -> ServerError {
    ServerError::err(format!("unknown command '{}'", name.to_ascii_lowercase()))
}

/// The checks the server makes before queueing a command inside `MULTI`:
/// the verb must exist and the argument count must fit its arity.
pub(crate) fn check_queued(name: &str, args: &[Vec<u8>]) -> Result<(), ServerError> {
    let arity = arity(name).ok_or_else(|| unknown_command(name))?;
    let given = args.len() + 1;
    let wanted = arity.unsigned_abs() as usize;
    let fits = if arity < 0 { given >= wanted } else { given == wanted };
    if fits { Ok(()) } else { Err(wrong_arity(name)) }
}

/// Run a keyspace command. Unknown verbs answer `ERR unknown command`.
pub(crate) fn execute(keyspace: &mut Keyspace, name: &str, args: &[Vec<u8>]) -> Value {
    let Some(handler) = lookup(name) else {
        return Value::Error(unknown_command(name));
    };
    handler(keyspace, args).unwrap_or_else(Value::Error)
}

pub(crate) fn wrong_arity(name: &str) -> ServerError {
    ServerError::err(format!(
        "wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

pub(crate) fn syntax_error() -> ServerError {
    ServerError::err("syntax error")
}

pub(crate) fn exact(args: &[Vec<u8>], n: usize, name: &str) -> Result<(), ServerError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(wrong_arity(name))
    }
}

pub(crate) fn at_least(args: &[Vec<u8>], n: usize, name: &str) -> Result<(), ServerError> {
    if args.len() >= n {
        Ok(())
    } else {
        Err(wrong_arity(name))
    }
}

pub(crate) fn parse_int(raw: &[u8]) -> Result<i64, ServerError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ServerError::err("value is not an integer or out of range"))
}

pub(crate) fn parse_float(raw: &[u8]) -> Result<f64, ServerError> {
    crate::results::convert::parse_float(raw)
        .filter(|f| !f.is_nan())
        .ok_or_else(|| ServerError::err("value is not a valid float"))
}

pub(crate) fn eq_ignore_case(raw: &[u8], word: &str) -> bool {
    raw.eq_ignore_ascii_case(word.as_bytes())
}

/// Resolve a possibly negative `[start, stop]` pair against `len`.
pub(crate) fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

/// Parsed `[MATCH pattern] [COUNT n]` options of the scan family.
pub(crate) struct ScanArgs {
    pub(crate) cursor: usize,
    pub(crate) pattern: Option<wildmatch::WildMatch>,
    pub(crate) count: usize,
}

impl ScanArgs {
    pub(crate) fn parse(cursor: &[u8], rest: &[Vec<u8>]) -> Result<Self, ServerError> {
        let cursor = std::str::from_utf8(cursor)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ServerError::err("invalid cursor"))?;
        let mut pattern = None;
        let mut count = 10;
        let mut iter = rest.iter();
        while let Some(option) = iter.next() {
            let value = iter.next().ok_or_else(syntax_error)?;
            if eq_ignore_case(option, "MATCH") {
                pattern = Some(wildmatch::WildMatch::new(&String::from_utf8_lossy(value)));
            } else if eq_ignore_case(option, "COUNT") {
                count = usize::try_from(parse_int(value)?)
                    .ok()
                    .filter(|c| *c > 0)
                    .ok_or_else(syntax_error)?;
            } else {
                return Err(syntax_error());
            }
        }
        Ok(Self {
            cursor,
            pattern,
            count,
        })
    }

    pub(crate) fn matches(&self, candidate: &[u8]) -> bool {
        self.pattern
            .as_ref()
            .is_none_or(|p| p.matches(&String::from_utf8_lossy(candidate)))
    }

    /// Take one page out of `items` (already in a stable order). Returns the
    /// next cursor (0 when done) and the positions of the page that pass the
    /// pattern filter.
    pub(crate) fn page<T>(&self, items: &[T], key_of: impl Fn(&T) -> &[u8]) -> (usize, Vec<usize>) {
        let end = self.cursor.saturating_add(self.count).min(items.len());
        let start = self.cursor.min(end);
        let picked = (start..end)
            .filter(|i| self.matches(key_of(&items[*i])))
            .collect();
        let next = if end >= items.len() { 0 } else { end };
        (next, picked)
    }
}

/// `[cursor, [items...]]` reply.
pub(crate) fn scan_reply(next: usize, items: Vec<Value>) -> Value {
    Value::Array(vec![
        Value::Bulk(next.to_string().into_bytes()),
        Value::Array(items),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_follow_server_rules() {
        assert_eq!(normalize_range(0, -1, 3), Some((0, 2)));
        assert_eq!(normalize_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(normalize_range(5, 10, 3), None);
        assert_eq!(normalize_range(0, 100, 3), Some((0, 2)));
        assert_eq!(normalize_range(0, 0, 0), None);
    }

    #[test]
    fn unknown_commands_error_in_band() {
        let mut ks = Keyspace::default();
        let reply = execute(&mut ks, "NOPE", &[]);
        assert_eq!(reply.as_error().map(|e| e.code.as_str()), Some("ERR"));
    }

    #[test]
    fn queued_commands_are_checked_against_arity() {
        let k = b"k".to_vec();
        assert!(check_queued("GET", &[k.clone()]).is_ok());
        assert!(check_queued("SET", &[k.clone(), b"v".to_vec(), b"EX".to_vec(), b"1".to_vec()]).is_ok());
        assert!(check_queued("PING", &[]).is_ok());

        let err = check_queued("GET", &[]).unwrap_err();
        assert!(err.message.contains("wrong number of arguments"));
        assert!(check_queued("MSET", &[k.clone()]).is_err());
        assert!(check_queued("TIME", &[k]).is_err());
        assert!(check_queued("NOPE", &[]).unwrap_err().message.contains("unknown command"));
    }

    #[test]
    fn scan_pages_until_cursor_returns_to_zero() {
        let args = ScanArgs::parse(b"0", &[b"COUNT".to_vec(), b"2".to_vec()]).expect("args");
        let items = vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()];
        let (next, picked) = args.page(&items, |v| v.as_slice());
        assert_eq!((next, picked), (2, vec![0, 1]));

        let args = ScanArgs::parse(b"2", &[b"COUNT".to_vec(), b"2".to_vec()]).expect("args");
        let (next, picked) = args.page(&items, |v| v.as_slice());
        assert_eq!((next, picked), (0, vec![2]));
    }
}
