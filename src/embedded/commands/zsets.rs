use std::collections::HashMap;

use super::{
    CommandResult, ScanArgs, at_least, eq_ignore_case, exact, normalize_range, parse_float,
    parse_int, scan_reply, syntax_error, wrong_arity,
};
use crate::command::format_float;
use crate::embedded::keyspace::Keyspace;
use crate::error::ServerError;
use crate::results::Value;

/// Members in rank order: ascending score, ties broken by member bytes.
fn ranked(zset: &HashMap<Vec<u8>, f64>) -> Vec<(Vec<u8>, f64)> {
    let mut items: Vec<(Vec<u8>, f64)> = zset.iter().map(|(m, s)| (m.clone(), *s)).collect();
    items.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    items
}

fn ranked_at(ks: &mut Keyspace, key: &[u8]) -> Result<Vec<(Vec<u8>, f64)>, ServerError> {
    Ok(ks.read_zset(key)?.map(ranked).unwrap_or_default())
}

fn score_value(score: f64) -> Value {
    Value::Bulk(format_float(score).into_bytes())
}

fn members_reply(items: impl IntoIterator<Item = (Vec<u8>, f64)>, with_scores: bool) -> Value {
    let mut out = Vec::new();
    for (member, score) in items {
        out.push(Value::Bulk(member));
        if with_scores {
            out.push(score_value(score));
        }
    }
    Value::Array(out)
}

pub(super) fn zadd(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 3, "zadd")?;
    let mut only_absent = false;
    let mut only_present = false;
    let mut report_changed = false;
    let mut rest = &args[1..];
    while let Some(flag) = rest.first() {
        if eq_ignore_case(flag, "NX") {
            only_absent = true;
        } else if eq_ignore_case(flag, "XX") {
            only_present = true;
        } else if eq_ignore_case(flag, "CH") {
            report_changed = true;
        } else {
            break;
        }
        rest = &rest[1..];
    }
    if only_absent && only_present {
        return Err(ServerError::err(
            "XX and NX options at the same time are not compatible",
        ));
    }
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(syntax_error());
    }
    let pairs = rest
        .chunks_exact(2)
        .map(|pair| Ok((parse_float(&pair[0])?, pair[1].clone())))
        .collect::<Result<Vec<_>, ServerError>>()?;

    let zset = ks.write_zset(&args[0])?;
    let mut added = 0;
    let mut changed = 0;
    for (score, member) in pairs {
        match zset.get_mut(&member) {
            Some(current) if !only_absent => {
                if current.total_cmp(&score).is_ne() {
                    *current = score;
                    changed += 1;
                }
            }
            None if !only_present => {
                zset.insert(member, score);
                added += 1;
            }
            _ => {}
        }
    }
    ks.remove_if_empty(&args[0]);
    Ok(Value::Int(if report_changed {
        added + changed
    } else {
        added
    }))
}

pub(super) fn zincrby(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "zincrby")?;
    let delta = parse_float(&args[1])?;
    let zset = ks.write_zset(&args[0])?;
    let score = zset.entry(args[2].clone()).or_insert(0.0);
    let next = *score + delta;
    if next.is_nan() {
        return Err(ServerError::err("resulting score is not a number (NaN)"));
    }
    *score = next;
    Ok(score_value(next))
}

pub(super) fn zrem(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "zrem")?;
    if ks.read_zset(&args[0])?.is_none() {
        return Ok(Value::Int(0));
    }
    let zset = ks.write_zset(&args[0])?;
    let removed = args[1..]
        .iter()
        .filter(|m| zset.remove(*m).is_some())
        .count();
    ks.remove_if_empty(&args[0]);
    Ok(Value::Int(removed as i64))
}

pub(super) fn zscore(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 2, "zscore")?;
    let score = ks.read_zset(&args[0])?.and_then(|z| z.get(&args[1]).copied());
    Ok(score.map_or(Value::Nil, score_value))
}

pub(super) fn zcard(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 1, "zcard")?;
    let len = ks.read_zset(&args[0])?.map_or(0, |z| z.len());
    Ok(Value::Int(len as i64))
}

/// Score bound as written in `ZCOUNT` / `ZRANGEBYSCORE`: `(` marks exclusive.
#[derive(Debug, Clone, Copy)]
struct Bound {
    value: f64,
    exclusive: bool,
}

impl Bound {
    fn parse(raw: &[u8]) -> Result<Self, ServerError> {
        let (exclusive, digits) = match raw.strip_prefix(b"(") {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let value = parse_float(digits)
            .map_err(|_| ServerError::err("min or max is not a float"))?;
        Ok(Self { value, exclusive })
    }

    fn admits_above(self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    fn admits_below(self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

pub(super) fn zcount(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    exact(args, 3, "zcount")?;
    let min = Bound::parse(&args[1])?;
    let max = Bound::parse(&args[2])?;
    let count = ks.read_zset(&args[0])?.map_or(0, |z| {
        z.values()
            .filter(|s| min.admits_above(**s) && max.admits_below(**s))
            .count()
    });
    Ok(Value::Int(count as i64))
}

fn rank(ks: &mut Keyspace, args: &[Vec<u8>], reverse: bool, name: &str) -> CommandResult {
    exact(args, 2, name)?;
    let items = ranked_at(ks, &args[0])?;
    let position = items.iter().position(|(m, _)| m == &args[1]);
    Ok(match position {
        Some(i) if reverse => Value::Int((items.len() - 1 - i) as i64),
        Some(i) => Value::Int(i as i64),
        None => Value::Nil,
    })
}

pub(super) fn zrank(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    rank(ks, args, false, "zrank")
}

pub(super) fn zrevrank(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    rank(ks, args, true, "zrevrank")
}

fn range_by_rank(ks: &mut Keyspace, args: &[Vec<u8>], reverse: bool, name: &str) -> CommandResult {
    let with_scores = match args.len() {
        3 => false,
        4 if eq_ignore_case(&args[3], "WITHSCORES") => true,
        4 => return Err(syntax_error()),
        _ => return Err(wrong_arity(name)),
    };
    let start = parse_int(&args[1])?;
    let stop = parse_int(&args[2])?;
    let mut items = ranked_at(ks, &args[0])?;
    if reverse {
        items.reverse();
    }
    let window = match normalize_range(start, stop, items.len()) {
        Some((from, to)) => items[from..=to].to_vec(),
        None => Vec::new(),
    };
    Ok(members_reply(window, with_scores))
}

pub(super) fn zrange(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    range_by_rank(ks, args, false, "zrange")
}

pub(super) fn zrevrange(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    range_by_rank(ks, args, true, "zrevrange")
}

pub(super) fn zrangebyscore(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 3, "zrangebyscore")?;
    let min = Bound::parse(&args[1])?;
    let max = Bound::parse(&args[2])?;
    let mut with_scores = false;
    let mut limit: Option<(usize, Option<usize>)> = None;
    let mut options = args[3..].iter();
    while let Some(option) = options.next() {
        if eq_ignore_case(option, "WITHSCORES") {
            with_scores = true;
        } else if eq_ignore_case(option, "LIMIT") {
            let offset = parse_int(options.next().ok_or_else(syntax_error)?)?;
            let count = parse_int(options.next().ok_or_else(syntax_error)?)?;
            let offset = usize::try_from(offset).map_err(|_| syntax_error())?;
            limit = Some((offset, usize::try_from(count).ok()));
        } else {
            return Err(syntax_error());
        }
    }
    let (offset, count) = limit.unwrap_or((0, None));
    let window = ranked_at(ks, &args[0])?
        .into_iter()
        .filter(|(_, s)| min.admits_above(*s) && max.admits_below(*s))
        .skip(offset)
        .take(count.unwrap_or(usize::MAX));
    Ok(members_reply(window, with_scores))
}

pub(super) fn zscan(ks: &mut Keyspace, args: &[Vec<u8>]) -> CommandResult {
    at_least(args, 2, "zscan")?;
    let scan = ScanArgs::parse(&args[1], &args[2..])?;
    let items = ranked_at(ks, &args[0])?;
    let (next, picked) = scan.page(&items, |(m, _)| m.as_slice());
    let flat = picked
        .into_iter()
        .flat_map(|i| {
            let (member, score) = items[i].clone();
            [Value::Bulk(member), score_value(score)]
        })
        .collect();
    Ok(scan_reply(next, flat))
}
