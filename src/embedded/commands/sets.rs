use std::collections::HashSet;

use rand::seq::SliceRandom;

use super::{CommandResult, ScanArgs, at_least, exact, parse_int, scan_reply, wrong_arity};
use crate::embedded::keyspace::{Data, Keyspace};
use crate::error::ServerError;
use crate::results::Value;

fn members(ks: &mut Keyspace, key: &[u8]) -> Result<HashSet<Vec<u8>>, ServerError> {
    Ok(ks.read_set(key)?.cloned().unwrap_or_default())
}

fn sorted(set: HashSet<Vec<u8>>) -> Vec<Vec<u8>> {
    let mut items: Vec<Vec<u8>> = set.into_iter().collect();
    items.sort();
    items
}

fn bulk_array(items: Vec<Vec<u8>>) -> Value {
    Value::Array(items.into_iter().map(Value::Bulk).collect())
}

pub(super) fn sadd(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "sadd")?;
    let set = ks.write_set(&args[0])?;
    let added = args[1..].iter().filter(|m| set.insert((*m).clone())).count();
    Ok(Value::Int(added as i64))
}

pub(super) fn srem(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "srem")?;
    if ks.read_set(&args[0])?.is_none() {
        return Ok(Value::Int(0));
    }
    let set = ks.write_set(&args[0])?;
    let removed = args[1..].iter().filter(|m| set.remove(*m)).count();
    ks.remove_if_empty(&args[0]);
    Ok(Value::Int(removed as i64))
}

pub(super) fn smembers(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "smembers")?;
    Ok(bulk_array(sorted(members(ks, &args[0])?)))
}

pub(super) fn sismember(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "sismember")?;
    let found = ks.read_set(&args[0])?.is_some_and(|s| s.contains(&args[1]));
    Ok(Value::from(found))
}

pub(super) fn smismember(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "smismember")?;
    let set = ks.read_set(&args[0])?;
    let flags = args[1..]
        .iter()
        .map(|m| Value::from(set.is_some_and(|s| s.contains(m))))
        .collect();
    Ok(Value::Array(flags))
}

pub(super) fn scard(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "scard")?;
    let len = ks.read_set(&args[0])?.map_or(0, |s| s.len());
    Ok(Value::Int(len as i64))
}

#[derive(Clone, Copy)]
enum SetOp {
    Diff,
    Inter,
    Union,
}

fn combine(
    ks: &mut Keyspace,
    keys: &[Vec<u8>],
    op: SetOp,
) -> Result<HashSet<Vec<u8>>, ServerError> {
    let mut result = members(ks, &keys[0])?;
    for key in &keys[1..] {
        let other = members(ks, key)?;
        match op {
            SetOp::Diff => result.retain(|m| !other.contains(m)),
            SetOp::Inter => result.retain(|m| other.contains(m)),
            SetOp::Union => result.extend(other),
        }
    }
    Ok(result)
}

fn combine_reply(ks: &mut Keyspace, args: &[Vec<u8>], op: SetOp, name: &str) -> CommandResult {
    at_least(args, 1, name)?;
    Ok(bulk_array(sorted(combine(ks, args, op)?)))
}

fn combine_store(ks: &mut Keyspace, args: &[Vec<u8>], op: SetOp, name: &str) -> CommandResult {
    at_least(args, 2, name)?;
    let result = combine(ks, &args[1..], op)?;
    let len = result.len();
    if result.is_empty() {
        ks.remove(&args[0]);
    } else {
        ks.insert(&args[0], Data::Set(result));
    }
    Ok(Value::Int(len as i64))
}

pub(super) fn sdiff(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    combine_reply(ks, args, SetOp::Diff, "sdiff")
}

pub(super) fn sinter(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    combine_reply(ks, args, SetOp::Inter, "sinter")
}

pub(super) fn sunion(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    combine_reply(ks, args, SetOp::Union, "sunion")
}

pub(super) fn sdiffstore(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    combine_store(ks, args, SetOp::Diff, "sdiffstore")
}

pub(super) fn sinterstore(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    combine_store(ks, args, SetOp::Inter, "sinterstore")
}

pub(super) fn sunionstore(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    combine_store(ks, args, SetOp::Union, "sunionstore")
}

/// Without a count: one random member or nil. A positive count answers up
/// to that many distinct members; a negative count answers exactly `|count|`
/// members and may repeat them.
pub(super) fn srandmember(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    if args.is_empty() || args.len() > 2 {
        return Err(wrong_arity("srandmember"));
    }
    let pool = sorted(members(ks, &args[0])?);
    let mut rng = rand::thread_rng();
    let Some(raw_count) = args.get(1) else {
        return Ok(Value::from(pool.choose(&mut rng).cloned()));
    };
    let count = parse_int(raw_count)?;
    if !(-(i64::MAX / 2)..=i64::MAX / 2).contains(&count) {
        return Err(ServerError::err("value is out of range"));
    }
    let wanted = usize::try_from(count.unsigned_abs()).unwrap_or(usize::MAX);
    if pool.is_empty() || wanted == 0 {
        return Ok(Value::Array(Vec::new()));
    }
    let picked: Vec<Vec<u8>> = if count > 0 {
        pool.choose_multiple(&mut rng, wanted).cloned().collect()
    } else {
        (0..wanted)
            .filter_map(|_| pool.choose(&mut rng).cloned())
            .collect()
    };
    Ok(bulk_array(picked))
}

pub(super) fn spop(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    if args.is_empty() || args.len() > 2 {
        return Err(wrong_arity("spop"));
    }
    let count = match args.get(1) {
        Some(raw) => Some(
            usize::try_from(parse_int(raw)?)
                .map_err(|_| ServerError::err("value is out of range, must be positive"))?,
        ),
        None => None,
    };
    let pool = sorted(members(ks, &args[0])?);
    let mut rng = rand::thread_rng();
    let taken: Vec<Vec<u8>> = pool
        .choose_multiple(&mut rng, count.unwrap_or(1))
        .cloned()
        .collect();
    if !taken.is_empty() {
        let set = ks.write_set(&args[0])?;
        for member in &taken {
            set.remove(member);
        }
        ks.remove_if_empty(&args[0]);
    }
    Ok(match count {
        Some(_) => bulk_array(taken),
        None => Value::from(taken.into_iter().next()),
    })
}

pub(super) fn smove(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "smove")?;
    let (source, destination, member) = (&args[0], &args[1], &args[2]);
    if !ks.read_set(source)?.is_some_and(|s| s.contains(member)) {
        return Ok(Value::Int(0));
    }
    // type-check the destination before mutating the source
    ks.read_set(destination)?;
    ks.write_set(source)?.remove(member);
    ks.remove_if_empty(source);
    ks.write_set(destination)?.insert(member.clone());
    Ok(Value::Int(1))
}

pub(super) fn sscan(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "sscan")?;
    let scan = ScanArgs::parse(&args[1], &args[2..])?;
    let all = sorted(members(ks, &args[0])?);
    let (next, picked) = scan.page(&all, |m| m.as_slice());
    let items = picked.into_iter().map(|i| Value::Bulk(all[i].clone())).collect();
    Ok(scan_reply(next, items))
}
