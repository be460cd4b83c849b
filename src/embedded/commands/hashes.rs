use super::{CommandResult, ScanArgs, at_least, exact, parse_int, scan_reply, wrong_arity};
use crate::embedded::keyspace::Keyspace;
use crate::error::ServerError;
use crate::results::Value;

fn sorted_fields(ks: &mut Keyspace, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ServerError> {
    let mut fields: Vec<(Vec<u8>, Vec<u8>)> = ks
        .read_hash(key)?
        .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
        .unwrap_or_default();
    fields.sort();
    Ok(fields)
}

pub(super) fn hset(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(wrong_arity("hset"));
    }
    let hash = ks.write_hash(&args[0])?;
    let added = args[1..]
        .chunks_exact(2)
        .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
        .count();
    Ok(Value::Int(added as i64))
}

pub(super) fn hsetnx(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "hsetnx")?;
    if ks.read_hash(&args[0])?.is_some_and(|h| h.contains_key(&args[1])) {
        return Ok(Value::Int(0));
    }
    ks.write_hash(&args[0])?.insert(args[1].clone(), args[2].clone());
    Ok(Value::Int(1))
}

pub(super) fn hget(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "hget")?;
    let value = ks.read_hash(&args[0])?.and_then(|h| h.get(&args[1]).cloned());
    Ok(Value::from(value))
}

pub(super) fn hmget(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "hmget")?;
    let hash = ks.read_hash(&args[0])?;
    let values = args[1..]
        .iter()
        .map(|field| Value::from(hash.and_then(|h| h.get(field).cloned())))
        .collect();
    Ok(Value::Array(values))
}

pub(super) fn hgetall(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "hgetall")?;
    let flat = sorted_fields(ks, &args[0])?
        .into_iter()
        .flat_map(|(f, v)| [Value::Bulk(f), Value::Bulk(v)])
        .collect();
    Ok(Value::Array(flat))
}

pub(super) fn hdel(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "hdel")?;
    if ks.read_hash(&args[0])?.is_none() {
        return Ok(Value::Int(0));
    }
    let hash = ks.write_hash(&args[0])?;
    let removed = args[1..]
        .iter()
        .filter(|field| hash.remove(*field).is_some())
        .count();
    ks.remove_if_empty(&args[0]);
    Ok(Value::Int(removed as i64))
}

pub(super) fn hexists(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "hexists")?;
    let found = ks.read_hash(&args[0])?.is_some_and(|h| h.contains_key(&args[1]));
    Ok(Value::from(found))
}

pub(super) fn hlen(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "hlen")?;
    let len = ks.read_hash(&args[0])?.map_or(0, |h| h.len());
    Ok(Value::Int(len as i64))
}

pub(super) fn hkeys(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "hkeys")?;
    let fields = sorted_fields(ks, &args[0])?
        .into_iter()
        .map(|(f, _)| Value::Bulk(f))
        .collect();
    Ok(Value::Array(fields))
}

pub(super) fn hvals(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "hvals")?;
    let values = sorted_fields(ks, &args[0])?
        .into_iter()
        .map(|(_, v)| Value::Bulk(v))
        .collect();
    Ok(Value::Array(values))
}

pub(super) fn hincrby(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "hincrby")?;
    let delta = parse_int(&args[2])?;
    let current = match ks.read_hash(&args[0])?.and_then(|h| h.get(&args[1])) {
        Some(raw) => {
            parse_int(raw).map_err(|_| ServerError::err("hash value is not an integer"))?
        }
        None => 0,
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| ServerError::err("increment or decrement would overflow"))?;
    ks.write_hash(&args[0])?
        .insert(args[1].clone(), next.to_string().into_bytes());
    Ok(Value::Int(next))
}

pub(super) fn hscan(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "hscan")?;
    let scan = ScanArgs::parse(&args[1], &args[2..])?;
    let fields = sorted_fields(ks, &args[0])?;
    let (next, picked) = scan.page(&fields, |(f, _)| f.as_slice());
    let items = picked
        .into_iter()
        .flat_map(|i| {
            let (f, v) = fields[i].clone();
            [Value::Bulk(f), Value::Bulk(v)]
        })
        .collect();
    Ok(scan_reply(next, items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn hset_counts_only_new_fields() {
        let mut ks = Keyspace::default();
        assert_eq!(
            hset(&mut ks, &[arg("h"), arg("a"), arg("1"), arg("b"), arg("2")]).ok(),
            Some(Value::Int(2))
        );
        assert_eq!(hset(&mut ks, &[arg("h"), arg("a"), arg("3")]).ok(), Some(Value::Int(0)));
        assert_eq!(hget(&mut ks, &[arg("h"), arg("a")]).ok(), Some(Value::bulk("3")));
    }

    #[test]
    fn deleting_last_field_removes_key() {
        let mut ks = Keyspace::default();
        hset(&mut ks, &[arg("h"), arg("a"), arg("1")]).expect("hset");
        assert_eq!(hdel(&mut ks, &[arg("h"), arg("a"), arg("zz")]).ok(), Some(Value::Int(1)));
        assert!(!ks.contains(b"h"));
    }

    #[test]
    fn hincrby_rejects_non_numeric_field() {
        let mut ks = Keyspace::default();
        hset(&mut ks, &[arg("h"), arg("a"), arg("x")]).expect("hset");
        assert!(hincrby(&mut ks, &[arg("h"), arg("a"), arg("1")]).is_err());
        assert_eq!(hincrby(&mut ks, &[arg("h"), arg("n"), arg("5")]).ok(), Some(Value::Int(5)));
    }
}
