use std::time::Duration;

use super::{CommandResult, at_least, eq_ignore_case, exact, parse_float, parse_int, syntax_error};
use crate::command::format_float;
use crate::embedded::keyspace::{Data, Keyspace};
use crate::error::ServerError;
use crate::results::Value;

pub(super) fn get(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "get")?;
    Ok(Value::from(ks.read_string(&args[0])?.cloned()))
}

pub(super) fn set(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "set")?;
    let mut ttl = None;
    let mut only_absent = false;
    let mut only_present = false;
    let mut keep_ttl = false;
    let mut options = args[2..].iter();
    while let Some(option) = options.next() {
        if eq_ignore_case(option, "NX") {
            only_absent = true;
        } else if eq_ignore_case(option, "XX") {
            only_present = true;
        } else if eq_ignore_case(option, "KEEPTTL") {
            keep_ttl = true;
        } else if eq_ignore_case(option, "EX") || eq_ignore_case(option, "PX") {
            let amount = parse_int(options.next().ok_or_else(syntax_error)?)?;
            if amount <= 0 {
                return Err(ServerError::err("invalid expire time in 'set' command"));
            }
            let amount = amount.unsigned_abs();
            ttl = Some(if eq_ignore_case(option, "EX") {
                Duration::from_secs(amount)
            } else {
                Duration::from_millis(amount)
            });
        } else {
            return Err(syntax_error());
        }
    }
    if (only_absent && only_present) || (keep_ttl && ttl.is_some()) {
        return Err(syntax_error());
    }

    let key = &args[0];
    let exists = ks.contains(key);
    if (only_absent && exists) || (only_present && !exists) {
        return Ok(Value::Nil);
    }
    let previous_ttl = if keep_ttl { ks.ttl(key).flatten() } else { None };
    ks.insert(key, Data::Str(args[1].clone()));
    if let Some(ttl) = ttl.or(previous_ttl) {
        ks.set_expiry(key, Some(ttl));
    }
    Ok(Value::ok())
}

pub(super) fn setnx(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "setnx")?;
    if ks.contains(&args[0]) {
        return Ok(Value::Int(0));
    }
    ks.insert(&args[0], Data::Str(args[1].clone()));
    Ok(Value::Int(1))
}

pub(super) fn getset(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "getset")?;
    let previous = ks.read_string(&args[0])?.cloned();
    ks.insert(&args[0], Data::Str(args[1].clone()));
    Ok(Value::from(previous))
}

pub(super) fn getdel(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "getdel")?;
    let previous = ks.read_string(&args[0])?.cloned();
    if previous.is_some() {
        ks.remove(&args[0]);
    }
    Ok(Value::from(previous))
}

pub(super) fn getrange(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "getrange")?;
    let start = parse_int(&args[1])?;
    let stop = parse_int(&args[2])?;
    let Some(bytes) = ks.read_string(&args[0])? else {
        return Ok(Value::Bulk(Vec::new()));
    };
    Ok(match super::normalize_range(start, stop, bytes.len()) {
        Some((from, to)) => Value::Bulk(bytes[from..=to].to_vec()),
        None => Value::Bulk(Vec::new()),
    })
}

pub(super) fn mget(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 1, "mget")?;
    let values = args
        .iter()
        // MGET answers nil for keys holding other types
        .map(|key| Value::from(ks.read_string(key).ok().flatten().cloned()))
        .collect();
    Ok(Value::Array(values))
}

pub(super) fn mset(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(super::wrong_arity("mset"));
    }
    for pair in args.chunks_exact(2) {
        ks.insert(&pair[0], Data::Str(pair[1].clone()));
    }
    Ok(Value::ok())
}

fn add_to_int(ks: &mut Keyspace, key: &[u8], delta: i64) -> CommandResult {
    let current = match ks.read_string(key)? {
        Some(bytes) => parse_int(bytes)?,
        None => 0,
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| ServerError::err("increment or decrement would overflow"))?;
    ks.update_string(key, next.to_string().into_bytes())?;
    Ok(Value::Int(next))
}

pub(super) fn incr(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "incr")?;
    add_to_int(ks, &args[0], 1)
}

pub(super) fn decr(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "decr")?;
    add_to_int(ks, &args[0], -1)
}

pub(super) fn incrby(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "incrby")?;
    let delta = parse_int(&args[1])?;
    add_to_int(ks, &args[0], delta)
}

pub(super) fn decrby(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "decrby")?;
    let delta = parse_int(&args[1])?
        .checked_neg()
        .ok_or_else(|| ServerError::err("decrement would overflow"))?;
    add_to_int(ks, &args[0], delta)
}

pub(super) fn incrbyfloat(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "incrbyfloat")?;
    let delta = parse_float(&args[1])?;
    let current = match ks.read_string(&args[0])? {
        Some(bytes) => parse_float(bytes)?,
        None => 0.0,
    };
    let next = current + delta;
    if !next.is_finite() {
        return Err(ServerError::err("increment would produce NaN or Infinity"));
    }
    let text = format_float(next).into_bytes();
    ks.update_string(&args[0], text.clone())?;
    Ok(Value::Bulk(text))
}

pub(super) fn append(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "append")?;
    let mut value = ks.read_string(&args[0])?.cloned().unwrap_or_default();
    value.extend_from_slice(&args[1]);
    let len = value.len();
    ks.update_string(&args[0], value)?;
    Ok(Value::Int(len as i64))
}

pub(super) fn strlen(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "strlen")?;
    let len = ks.read_string(&args[0])?.map_or(0, Vec::len);
    Ok(Value::Int(len as i64))
}
