use super::{CommandResult, at_least, exact, normalize_range, parse_int};
use crate::embedded::keyspace::Keyspace;
use crate::error::ServerError;
use crate::results::Value;

pub(super) fn lpush(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "lpush")?;
    let list = ks.write_list(&args[0])?;
    for value in &args[1..] {
        list.push_front(value.clone());
    }
    Ok(Value::Int(list.len() as i64))
}

pub(super) fn rpush(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "rpush")?;
    let list = ks.write_list(&args[0])?;
    list.extend(args[1..].iter().cloned());
    Ok(Value::Int(list.len() as i64))
}

fn pop(ks: &mut Keyspace, key: &[u8], front: bool) -> CommandResult {
    if ks.read_list(key)?.is_none() {
        return Ok(Value::Nil);
    }
    let list = ks.write_list(key)?;
    let value = if front {
        list.pop_front()
    } else {
        list.pop_back()
    };
    ks.remove_if_empty(key);
    Ok(Value::from(value))
}

pub(super) fn lpop(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "lpop")?;
    pop(ks, &args[0], true)
}

pub(super) fn rpop(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "rpop")?;
    pop(ks, &args[0], false)
}

pub(super) fn lrange(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "lrange")?;
    let start = parse_int(&args[1])?;
    let stop = parse_int(&args[2])?;
    let Some(list) = ks.read_list(&args[0])? else {
        return Ok(Value::Array(Vec::new()));
    };
    let items = match normalize_range(start, stop, list.len()) {
        Some((from, to)) => list
            .range(from..=to)
            .map(|v| Value::Bulk(v.clone()))
            .collect(),
        None => Vec::new(),
    };
    Ok(Value::Array(items))
}

pub(super) fn llen(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "llen")?;
    let len = ks.read_list(&args[0])?.map_or(0, |l| l.len());
    Ok(Value::Int(len as i64))
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

pub(super) fn lindex(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "lindex")?;
    let index = parse_int(&args[1])?;
    let value = ks
        .read_list(&args[0])?
        .and_then(|l| resolve_index(index, l.len()).and_then(|i| l.get(i).cloned()));
    Ok(Value::from(value))
}

pub(super) fn lset(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "lset")?;
    let index = parse_int(&args[1])?;
    if ks.read_list(&args[0])?.is_none() {
        return Err(ServerError::err("no such key"));
    }
    let list = ks.write_list(&args[0])?;
    let slot = resolve_index(index, list.len())
        .and_then(|i| list.get_mut(i))
        .ok_or_else(|| ServerError::err("index out of range"))?;
    *slot = args[2].clone();
    Ok(Value::ok())
}

pub(super) fn lrem(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "lrem")?;
    let count = parse_int(&args[1])?;
    if ks.read_list(&args[0])?.is_none() {
        return Ok(Value::Int(0));
    }
    let target = &args[2];
    let list = ks.write_list(&args[0])?;
    let limit = if count == 0 {
        usize::MAX
    } else {
        usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX)
    };
    let mut removed = 0;
    if count >= 0 {
        let mut i = 0;
        while i < list.len() && removed < limit {
            if &list[i] == target {
                list.remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
    } else {
        let mut i = list.len();
        while i > 0 && removed < limit {
            i -= 1;
            if &list[i] == target {
                list.remove(i);
                removed += 1;
            }
        }
    }
    ks.remove_if_empty(&args[0]);
    Ok(Value::Int(removed as i64))
}

pub(super) fn ltrim(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "ltrim")?;
    let start = parse_int(&args[1])?;
    let stop = parse_int(&args[2])?;
    if ks.read_list(&args[0])?.is_none() {
        return Ok(Value::ok());
    }
    let list = ks.write_list(&args[0])?;
    match normalize_range(start, stop, list.len()) {
        Some((from, to)) => {
            list.truncate(to + 1);
            list.drain(..from);
        }
        None => list.clear(),
    }
    ks.remove_if_empty(&args[0]);
    Ok(Value::ok())
}
