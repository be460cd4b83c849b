use std::time::Duration;

use wildmatch::WildMatch;

use super::{CommandResult, ScanArgs, at_least, exact, parse_int, scan_reply};
use crate::embedded::keyspace::Keyspace;
use crate::error::ServerError;
use crate::results::Value;

pub(super) fn del(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 1, "del")?;
    let removed = args.iter().filter(|key| ks.remove(key).is_some()).count();
    Ok(Value::Int(removed as i64))
}

pub(super) fn exists(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 1, "exists")?;
    let found = args.iter().filter(|key| ks.contains(key)).count();
    Ok(Value::Int(found as i64))
}

pub(super) fn key_type(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "type")?;
    let name = ks.get(&args[0]).map_or("none", |e| e.data.type_name());
    Ok(Value::Status(name.to_string()))
}

pub(super) fn keys(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "keys")?;
    let pattern = WildMatch::new(&String::from_utf8_lossy(&args[0]));
    let matched = ks
        .keys()
        .into_iter()
        .filter(|k| pattern.matches(&String::from_utf8_lossy(k)))
        .map(Value::Bulk)
        .collect();
    Ok(Value::Array(matched))
}

pub(super) fn scan(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 1, "scan")?;
    let scan = ScanArgs::parse(&args[0], &args[1..])?;
    let all = ks.keys();
    let (next, picked) = scan.page(&all, |k| k.as_slice());
    let items = picked.into_iter().map(|i| Value::Bulk(all[i].clone())).collect();
    Ok(scan_reply(next, items))
}

pub(super) fn rename(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "rename")?;
    let entry = ks
        .remove(&args[0])
        .ok_or_else(|| ServerError::err("no such key"))?;
    ks.insert_entry(&args[1], entry);
    Ok(Value::ok())
}

fn expire_with(ks: &mut Keyspace, key: &[u8], ttl_ms: i64) -> Value {
    if ttl_ms <= 0 {
        return Value::from(ks.remove(key).is_some());
    }
    let ttl = Duration::from_millis(ttl_ms.unsigned_abs());
    Value::from(ks.set_expiry(key, Some(ttl)))
}

pub(super) fn expire(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "expire")?;
    let seconds = parse_int(&args[1])?;
    Ok(expire_with(ks, &args[0], seconds.saturating_mul(1000)))
}

pub(super) fn pexpire(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "pexpire")?;
    let millis = parse_int(&args[1])?;
    Ok(expire_with(ks, &args[0], millis))
}

fn remaining(ks: &mut Keyspace, key: &[u8], unit_ms: u128) -> i64 {
    match ks.ttl(key) {
        None => -2,
        Some(None) => -1,
        Some(Some(left)) => {
            let rounded = (left.as_millis() + unit_ms / 2) / unit_ms;
            i64::try_from(rounded).unwrap_or(i64::MAX)
        }
    }
}

pub(super) fn ttl(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "ttl")?;
    Ok(Value::Int(remaining(ks, &args[0], 1000)))
}

pub(super) fn pttl(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "pttl")?;
    Ok(Value::Int(remaining(ks, &args[0], 1)))
}

pub(super) fn persist(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "persist")?;
    let had_ttl = matches!(ks.ttl(&args[0]), Some(Some(_)));
    if had_ttl {
        ks.set_expiry(&args[0], None);
    }
    Ok(Value::from(had_ttl))
}

pub(super) fn dbsize(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 0, "dbsize")?;
    Ok(Value::Int(ks.len() as i64))
}

pub(super) fn flush(ks: &mut Keyspace, _args: &[Vec<u8>]) -> CommandResult {
    ks.flush();
    Ok(Value::ok())
}
