//! Host command surface.
//!
//! Translates argument vectors such as `BBF.ADD key item` into typed
//! [`Command`]s, runs them against a [`KeyRegistry`] and produces a
//! [`Reply`]. The `BBF.` prefix is optional and names are case-insensitive.

use crate::error::{FilterError, Result};
use crate::registry::{KeyRegistry, lock_filter};
use crate::traits::{BucketFilterOps, BucketFilterStats};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

const COMMAND_PREFIX: &str = "BBF.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { key: Vec<u8>, item: Vec<u8> },
    Exists { key: Vec<u8>, item: Vec<u8> },
    IncTime { key: Vec<u8>, delta: u64 },
    SetTime { key: Vec<u8>, time: i64 },
    ClearTime { key: Vec<u8>, bucket: i64 },
    Info { key: Vec<u8> },
}

impl Command {
    pub fn parse(args: &[Vec<u8>]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Err(FilterError::Protocol("empty command".to_string()));
        };
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();
        let bare = name.strip_prefix(COMMAND_PREFIX).unwrap_or(&name);

        let arity = |expected: &[usize]| -> Result<()> {
            if expected.contains(&rest.len()) {
                Ok(())
            } else {
                Err(FilterError::WrongArity {
                    command: name.to_lowercase(),
                })
            }
        };

        match bare {
            "ADD" => {
                arity(&[2])?;
                Ok(Command::Add {
                    key: rest[0].clone(),
                    item: rest[1].clone(),
                })
            }
            "EXISTS" => {
                arity(&[2])?;
                Ok(Command::Exists {
                    key: rest[0].clone(),
                    item: rest[1].clone(),
                })
            }
            "INCTIME" => {
                arity(&[1, 2])?;
                let delta = match rest.get(1) {
                    Some(raw) => parse_int(raw, "time delta")?,
                    None => 1,
                };
                if delta < 1 {
                    return Err(FilterError::InvalidTime(format!(
                        "time delta must be at least 1, got {delta}"
                    )));
                }
                Ok(Command::IncTime {
                    key: rest[0].clone(),
                    delta: delta as u64,
                })
            }
            "SETTIME" => {
                arity(&[2])?;
                Ok(Command::SetTime {
                    key: rest[0].clone(),
                    time: parse_non_negative(&rest[1], "time")?,
                })
            }
            "CLRTIME" => {
                arity(&[2])?;
                Ok(Command::ClearTime {
                    key: rest[0].clone(),
                    bucket: parse_non_negative(&rest[1], "bucket index")?,
                })
            }
            "INFO" => {
                arity(&[1])?;
                Ok(Command::Info {
                    key: rest[0].clone(),
                })
            }
            _ => Err(FilterError::UnknownCommand(name.clone())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Add { .. } => "BBF.ADD",
            Command::Exists { .. } => "BBF.EXISTS",
            Command::IncTime { .. } => "BBF.INCTIME",
            Command::SetTime { .. } => "BBF.SETTIME",
            Command::ClearTime { .. } => "BBF.CLRTIME",
            Command::Info { .. } => "BBF.INFO",
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Command::Add { key, .. }
            | Command::Exists { key, .. }
            | Command::IncTime { key, .. }
            | Command::SetTime { key, .. }
            | Command::ClearTime { key, .. }
            | Command::Info { key } => key,
        }
    }

    /// Rejects negative times and bucket indices and zero deltas, for
    /// commands built without going through [`Command::parse`].
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::IncTime { delta: 0, .. } => Err(FilterError::InvalidTime(
                "time delta must be at least 1, got 0".to_string(),
            )),
            Command::SetTime { time, .. } if *time < 0 => Err(
                FilterError::InvalidTime(format!("time must be non-negative, got {time}")),
            ),
            Command::ClearTime { bucket, .. } if *bucket < 0 => {
                Err(FilterError::InvalidTime(format!(
                    "bucket index must be non-negative, got {bucket}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether the command can change filter state.
    pub fn is_write(&self) -> bool {
        !matches!(self, Command::Exists { .. } | Command::Info { .. })
    }
}

fn parse_int(raw: &[u8], what: &str) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            FilterError::InvalidTime(format!(
                "{what} is not an integer: '{}'",
                String::from_utf8_lossy(raw)
            ))
        })
}

fn parse_non_negative(raw: &[u8], what: &str) -> Result<i64> {
    let value = parse_int(raw, what)?;
    if value < 0 {
        return Err(FilterError::InvalidTime(format!(
            "{what} must be non-negative, got {value}"
        )));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Integer(i64),
    Bulk(Vec<u8>),
    Array(Vec<Reply>),
    Error(String),
}

impl Reply {
    pub fn error(err: &FilterError) -> Self {
        Reply::Error(format!("ERR {err}"))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    fn field(name: &str) -> Self {
        Reply::Bulk(name.as_bytes().to_vec())
    }

    // Saturates at i64::MAX
    fn count<T: TryInto<i64>>(value: T) -> Self {
        Reply::Integer(value.try_into().unwrap_or(i64::MAX))
    }
}

/// Formats replies the way `redis-cli` prints them.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Integer(n) => write!(f, "(integer) {n}"),
            Reply::Bulk(bytes) => {
                write!(f, "\"{}\"", String::from_utf8_lossy(bytes))
            }
            Reply::Error(msg) => write!(f, "(error) {msg}"),
            Reply::Array(items) if items.is_empty() => {
                write!(f, "(empty array)")
            }
            Reply::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {item}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Runs host commands against a shared registry.
#[derive(Clone)]
pub struct CommandAdapter {
    registry: Arc<KeyRegistry>,
}

impl CommandAdapter {
    pub fn new(registry: Arc<KeyRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<KeyRegistry> {
        &self.registry
    }

    /// Parses and applies raw arguments, turning failures into error replies.
    pub fn execute(&self, args: &[Vec<u8>]) -> Reply {
        match Command::parse(args).and_then(|command| self.apply(&command)) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "command rejected");
                Reply::error(&e)
            }
        }
    }

    pub fn apply(&self, command: &Command) -> Result<Reply> {
        command.validate()?;

        // Only ADD creates a filter; every other command on an unknown key
        // answers 0 without allocating one
        let filter = match command {
            Command::Add { key, .. } => self.registry.get_or_create(key)?,
            _ => match self.registry.get(command.key())? {
                Some(filter) => filter,
                None => return Ok(Reply::Integer(0)),
            },
        };
        let mut filter = lock_filter(&filter)?;

        let reply = match command {
            Command::Add { item, .. } => {
                filter.insert(item)?;
                Reply::Integer(1)
            }
            Command::Exists { item, .. } => {
                Reply::Integer(filter.exists(item)? as i64)
            }
            Command::IncTime { delta, .. } => {
                filter.advance_time(*delta)?;
                Reply::Integer(1)
            }
            Command::SetTime { time, .. } => {
                filter.set_time(*time)?;
                Reply::Integer(1)
            }
            Command::ClearTime { bucket, .. } => {
                filter.clear_time(*bucket)?;
                Reply::Integer(1)
            }
            Command::Info { .. } => {
                let info = filter.info();
                Reply::Array(vec![
                    Reply::field("Current time"),
                    Reply::count(info.current_time),
                    Reply::field("Window start"),
                    Reply::count(info.window_start),
                    Reply::field("Number of buckets"),
                    Reply::count(info.num_buckets),
                    Reply::field("Bits per bucket"),
                    Reply::count(info.bits_per_block),
                    Reply::field("Number of hash functions"),
                    Reply::count(info.num_hashes),
                    Reply::field("Live buckets"),
                    Reply::count(filter.live_buckets()),
                    Reply::field("Number of items inserted"),
                    Reply::count(info.total_insert_count),
                    Reply::field("Estimated false positive rate"),
                    Reply::Bulk(
                        format!("{:.6}", info.estimated_fpr).into_bytes(),
                    ),
                ])
            }
        };
        Ok(reply)
    }
}
