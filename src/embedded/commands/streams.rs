use super::{CommandResult, at_least, eq_ignore_case, exact, parse_int, syntax_error, wrong_arity};
use crate::embedded::keyspace::Keyspace;
use crate::embedded::stream::Fields;
use crate::error::ServerError;
use crate::results::Value;

fn entries_reply(entries: Vec<(String, Fields)>) -> Value {
    Value::Array(
        entries
            .into_iter()
            .map(|(id, fields)| {
                let flat = fields
                    .into_iter()
                    .flat_map(|(f, v)| [Value::Bulk(f), Value::Bulk(v)])
                    .collect();
                Value::Array(vec![Value::Bulk(id.into_bytes()), Value::Array(flat)])
            })
            .collect(),
    )
}

/// Parse `MAXLEN [=|~] n` starting at `args[0]`; answers the length and the
/// number of arguments consumed.
fn parse_maxlen(args: &[Vec<u8>]) -> Result<Option<(usize, usize)>, ServerError> {
    match args.first() {
        Some(word) if eq_ignore_case(word, "MAXLEN") => {
            let (raw, used) = match args.get(1) {
                Some(op) if op.as_slice() == b"=" || op.as_slice() == b"~" => (args.get(2), 3),
                other => (other, 2),
            };
            let raw = raw.ok_or_else(syntax_error)?;
            let len = usize::try_from(parse_int(raw)?)
                .map_err(|_| ServerError::err("The MAXLEN argument must be >= 0."))?;
            Ok(Some((len, used)))
        }
        _ => Ok(None),
    }
}

pub(super) fn xadd(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 4, "xadd")?;
    let mut rest = &args[1..];
    let max_len = match parse_maxlen(rest)? {
        Some((len, used)) => {
            rest = rest.get(used..).ok_or_else(syntax_error)?;
            Some(len)
        }
        None => None,
    };
    let Some((id, pairs)) = rest.split_first() else {
        return Err(wrong_arity("xadd"));
    };
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(wrong_arity("xadd"));
    }
    let fields: Fields = pairs
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    let stream = ks.write_stream(&args[0])?;
    let assigned = stream.add(id, fields);
    if let (Ok(_), Some(len)) = (&assigned, max_len) {
        stream.trim(len);
    }
    if stream.len() == 0 {
        // a rejected id must not leave an empty stream behind
        ks.remove(&args[0]);
    }
    Ok(Value::Bulk(assigned?.into_bytes()))
}

pub(super) fn xlen(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "xlen")?;
    let len = ks.read_stream(&args[0])?.map_or(0, |s| s.len());
    Ok(Value::Int(len as i64))
}

fn range(ks: &mut Keyspace, args: &[Vec<u8>], reverse: bool, name: &str) -> CommandResult {
    let count = match args.len() {
        3 => None,
        5 if eq_ignore_case(&args[3], "COUNT") => {
            Some(usize::try_from(parse_int(&args[4])?).unwrap_or(0))
        }
        5 => return Err(syntax_error()),
        _ => return Err(wrong_arity(name)),
    };
    let Some(stream) = ks.read_stream(&args[0])? else {
        return Ok(Value::Array(Vec::new()));
    };
    Ok(entries_reply(stream.range(&args[1], &args[2], count, reverse)?))
}

pub(super) fn xrange(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    range(ks, args, false, "xrange")
}

pub(super) fn xrevrange(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    range(ks, args, true, "xrevrange")
}

pub(super) fn xdel(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "xdel")?;
    if ks.read_stream(&args[0])?.is_none() {
        return Ok(Value::Int(0));
    }
    let removed = ks.write_stream(&args[0])?.delete(&args[1..])?;
    Ok(Value::Int(removed))
}

pub(super) fn xtrim(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 3, "xtrim")?;
    let Some((len, used)) = parse_maxlen(&args[1..])? else {
        return Err(syntax_error());
    };
    if used + 1 != args.len() {
        return Err(syntax_error());
    }
    if ks.read_stream(&args[0])?.is_none() {
        return Ok(Value::Int(0));
    }
    Ok(Value::Int(ks.write_stream(&args[0])?.trim(len)))
}
