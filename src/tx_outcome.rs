use crate::results::Reply;

/// Outcome of `EXEC`.
///
/// An aborted transaction (a watched key changed) is a distinct outcome, so
/// it can never be confused with a committed transaction that queued no
/// commands and therefore returned an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Committed(Vec<Reply>),
    Aborted,
}

impl ExecOutcome {
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Borrow the per-command replies of a committed transaction.
    #[must_use]
    pub fn replies(&self) -> Option<&[Reply]> {
        match self {
            Self::Committed(replies) => Some(replies),
            Self::Aborted => None,
        }
    }

    /// Consume the outcome and take the replies, if committed.
    pub fn into_replies(self) -> Option<Vec<Reply>> {
        match self {
            Self::Committed(replies) => Some(replies),
            Self::Aborted => None,
        }
    }
}
