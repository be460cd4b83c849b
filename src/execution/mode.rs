use crate::error::ValkeyMiddlewareError;

use super::deferred::{DeferredQueue, QueueEntry};

/// How a connection currently handles commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    /// Each command is sent and its reply returned at once.
    #[default]
    Immediate,
    /// Commands are queued until `close_pipeline`.
    Pipelined,
    /// Commands are queued between `multi` and `exec` / `discard`.
    Transactional,
}

/// Mode plus the queue that only exists outside `Immediate`.
#[derive(Debug, Default)]
pub(crate) struct ModeState {
    mode: ExecutionMode,
    queue: DeferredQueue,
}

impl ModeState {
    pub(crate) fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub(crate) fn is_immediate(&self) -> bool {
        self.mode == ExecutionMode::Immediate
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn open_pipeline(&mut self) -> Result<(), ValkeyMiddlewareError> {
        match self.mode {
            ExecutionMode::Immediate => {
                self.mode = ExecutionMode::Pipelined;
                Ok(())
            }
            ExecutionMode::Pipelined => Err(ValkeyMiddlewareError::invalid_state(
                "pipeline is already open",
            )),
            ExecutionMode::Transactional => Err(ValkeyMiddlewareError::invalid_state(
                "cannot open a pipeline while MULTI is active",
            )),
        }
    }

    pub(crate) fn begin_transaction(&mut self) -> Result<(), ValkeyMiddlewareError> {
        match self.mode {
            ExecutionMode::Immediate => {
                self.mode = ExecutionMode::Transactional;
                Ok(())
            }
            ExecutionMode::Pipelined => Err(ValkeyMiddlewareError::invalid_state(
                "cannot issue MULTI while a pipeline is open",
            )),
            ExecutionMode::Transactional => Err(ValkeyMiddlewareError::invalid_state(
                "MULTI calls can not be nested",
            )),
        }
    }

    /// Leave `Pipelined`, handing back the queued commands.
    pub(crate) fn take_pipeline(&mut self) -> Result<DeferredQueue, ValkeyMiddlewareError> {
        if self.mode != ExecutionMode::Pipelined {
            return Err(ValkeyMiddlewareError::invalid_state(
                "close_pipeline called without an open pipeline",
            ));
        }
        self.mode = ExecutionMode::Immediate;
        Ok(std::mem::take(&mut self.queue))
    }

    /// Leave `Transactional`, handing back the queued commands.
    pub(crate) fn take_transaction(
        &mut self,
        verb: &str,
    ) -> Result<DeferredQueue, ValkeyMiddlewareError> {
        if self.mode != ExecutionMode::Transactional {
            return Err(ValkeyMiddlewareError::invalid_state(format!(
                "{verb} without MULTI"
            )));
        }
        self.mode = ExecutionMode::Immediate;
        Ok(std::mem::take(&mut self.queue))
    }

    pub(crate) fn enqueue(&mut self, entry: QueueEntry) -> Result<usize, ValkeyMiddlewareError> {
        if self.is_immediate() {
            return Err(ValkeyMiddlewareError::invalid_state(
                "nothing to queue into in immediate mode",
            ));
        }
        Ok(self.queue.push(entry))
    }

    /// Drop any queued work and go back to `Immediate`. Returns the number of
    /// discarded commands.
    pub(crate) fn reset(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue = DeferredQueue::default();
        self.mode = ExecutionMode::Immediate;
        dropped
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.is_immediate() && self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::error::ErrorKind;
    use crate::results::convert;

    #[test]
    fn multi_inside_pipeline_is_rejected() {
        let mut state = ModeState::default();
        state.open_pipeline().unwrap();
        let err = state.begin_transaction().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(state.mode(), ExecutionMode::Pipelined);
    }

    #[test]
    fn pipeline_inside_multi_is_rejected() {
        let mut state = ModeState::default();
        state.begin_transaction().unwrap();
        assert!(state.open_pipeline().is_err());
        assert_eq!(state.mode(), ExecutionMode::Transactional);
    }

    #[test]
    fn closing_the_wrong_mode_fails_without_side_effects() {
        let mut state = ModeState::default();
        assert!(state.take_pipeline().is_err());
        assert!(state.take_transaction("EXEC").is_err());

        state.begin_transaction().unwrap();
        state
            .enqueue(QueueEntry::new(Command::new("PING"), convert::STATUS))
            .unwrap();
        assert!(state.take_pipeline().is_err());
        assert_eq!(state.queued(), 1);

        let queue = state.take_transaction("EXEC").unwrap();
        assert_eq!(queue.len(), 1);
        assert!(state.is_clean());
    }

    #[test]
    fn enqueue_returns_positions_in_order() {
        let mut state = ModeState::default();
        assert!(
            state
                .enqueue(QueueEntry::new(Command::new("PING"), convert::STATUS))
                .is_err()
        );
        state.open_pipeline().unwrap();
        for expected in 0..4 {
            let position = state
                .enqueue(QueueEntry::new(Command::new("PING"), convert::STATUS))
                .unwrap();
            assert_eq!(position, expected);
        }
        assert_eq!(state.reset(), 4);
        assert!(state.is_clean());
    }
}
