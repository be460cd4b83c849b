use crate::command::Command;
use crate::error::{ConversionErrors, ConversionFailure, ValkeyMiddlewareError};
use crate::results::{Converter, Reply, Value};

type BoxedConvert = Box<dyn FnOnce(Value) -> Result<Reply, Value> + Send>;

/// A command waiting for its reply, together with the converter it declared.
pub(crate) struct QueueEntry {
    pub(crate) command: Command,
    pub(crate) expected: &'static str,
    convert: BoxedConvert,
}

impl QueueEntry {
    pub(crate) fn new<T>(command: Command, converter: Converter<T>) -> Self
    where
        T: Into<Reply> + 'static,
    {
        Self {
            command,
            expected: converter.expected,
            convert: Box::new(move |value| converter.apply(value).map(Into::into)),
        }
    }
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("command", &self.command.display_name())
            .field("expected", &self.expected)
            .finish()
    }
}

/// Ordered commands queued while a pipeline or transaction is open.
#[derive(Debug, Default)]
pub(crate) struct DeferredQueue {
    entries: Vec<QueueEntry>,
}

impl DeferredQueue {
    /// Append an entry, returning its position.
    pub(crate) fn push(&mut self, entry: QueueEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Commands in submission order, for sending to the driver.
    pub(crate) fn commands(&self) -> Vec<Command> {
        self.entries.iter().map(|e| e.command.clone()).collect()
    }

    /// Pair each reply with the entry at the same index and convert it.
    ///
    /// Server errors stay in place as [`Reply::Error`]. Shape mismatches are
    /// collected over the whole walk and reported together.
    ///
    /// # Errors
    /// `ProtocolDesync` when the reply count differs from the entry count,
    /// `Conversion` listing every position whose reply had the wrong shape.
    pub(crate) fn drain(self, replies: Vec<Value>) -> Result<Vec<Reply>, ValkeyMiddlewareError> {
        if replies.len() != self.entries.len() {
            return Err(ValkeyMiddlewareError::ProtocolDesync {
                expected: self.entries.len(),
                received: replies.len(),
            });
        }

        let mut results = Vec::with_capacity(replies.len());
        let mut failures = Vec::new();
        for (position, (entry, reply)) in self.entries.into_iter().zip(replies).enumerate() {
            if let Value::Error(err) = reply {
                results.push(Reply::Error(err));
                continue;
            }
            match (entry.convert)(reply) {
                Ok(converted) => results.push(converted),
                Err(actual) => {
                    failures.push(ConversionFailure {
                        position,
                        command: entry.command.display_name(),
                        expected: entry.expected,
                        actual: actual.describe(),
                    });
                    results.push(Reply::Raw(actual));
                }
            }
        }

        if failures.is_empty() {
            Ok(results)
        } else {
            Err(ValkeyMiddlewareError::Conversion(ConversionErrors {
                failures,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::error::ServerError;
    use crate::results::convert;

    fn queue() -> DeferredQueue {
        let mut queue = DeferredQueue::default();
        queue.push(QueueEntry::new(
            Command::new("SADD").arg("k").arg("v1"),
            convert::INT,
        ));
        queue.push(QueueEntry::new(Command::new("SCARD").arg("k"), convert::INT));
        queue.push(QueueEntry::new(
            Command::new("SMEMBERS").arg("k"),
            convert::BYTES_SET,
        ));
        queue
    }

    #[test]
    fn drains_in_submission_order() {
        let replies = vec![
            Value::Int(1),
            Value::Int(1),
            Value::Array(vec![Value::bulk("v1")]),
        ];
        let drained = queue().drain(replies).expect("drain");
        let members: HashSet<Vec<u8>> = [b"v1".to_vec()].into_iter().collect();
        assert_eq!(
            drained,
            vec![Reply::Int(1), Reply::Int(1), Reply::BytesSet(members)]
        );
    }

    #[test]
    fn reply_count_mismatch_is_desync() {
        let err = queue().drain(vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(
            err,
            ValkeyMiddlewareError::ProtocolDesync {
                expected: 3,
                received: 1
            }
        ));
    }

    #[test]
    fn server_errors_stay_positional() {
        let replies = vec![
            Value::Error(ServerError::wrong_type()),
            Value::Int(0),
            Value::Array(vec![]),
        ];
        let drained = queue().drain(replies).expect("drain");
        assert!(drained[0].is_error());
        assert_eq!(drained[1], Reply::Int(0));
    }

    #[test]
    fn all_shape_mismatches_are_reported() {
        let replies = vec![
            Value::bulk("not a number"),
            Value::Int(1),
            Value::Int(7),
        ];
        let err = queue().drain(replies).unwrap_err();
        match err {
            ValkeyMiddlewareError::Conversion(errors) => {
                assert_eq!(errors.positions(), vec![0, 2]);
                assert_eq!(errors.failures[0].command, "SADD");
                assert_eq!(errors.failures[1].expected, "set of bulk strings");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
