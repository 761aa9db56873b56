//! Structured logging for the vote reconciler.
//!
//! Every step of a toggle (refusal, optimistic patch, confirmation, rollback)
//! is emitted as a [`VoteLog`]. The default logger forwards to `tracing`;
//! front ends can plug in their own to drive UI feedback.

use std::fmt;

use opine_types::models::VoteDirection;

use crate::cache::EntityRef;

/// Structured log entry for one step of a vote toggle.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteLog {
    pub target: EntityRef,
    pub direction: VoteDirection,
    pub event: VoteEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoteEvent {
    /// Nobody is logged in; nothing was touched.
    Refused,
    /// The entity is not cached; nothing was touched.
    Missing,
    /// Local vote sets replaced with the optimistic guess.
    Optimistic { upvotes: usize, downvotes: usize },
    /// Server accepted the mutation.
    Confirmed,
    /// Server rejected the mutation.
    Rejected { error: String },
    /// Rolled back to a fresh copy from the server.
    Resynced,
    /// Refetch failed; rolled back to the pre-toggle sets.
    Restored,
    /// Refetch failed and a newer write had already replaced the guess.
    Stale,
}

impl fmt::Display for VoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteEvent::Refused => write!(f, "refused (anonymous)"),
            VoteEvent::Missing => write!(f, "skipped (not cached)"),
            VoteEvent::Optimistic { upvotes, downvotes } => {
                write!(f, "optimistic up={} down={}", upvotes, downvotes)
            }
            VoteEvent::Confirmed => write!(f, "confirmed"),
            VoteEvent::Rejected { error } => write!(f, "rejected: {}", error),
            VoteEvent::Resynced => write!(f, "resynced from server"),
            VoteEvent::Restored => write!(f, "restored pre-vote state"),
            VoteEvent::Stale => write!(f, "left newer local state in place"),
        }
    }
}

pub trait VoteLogger: Send + Sync {
    fn log(&self, entry: VoteLog);
}

/// Logger that uses the `tracing` crate.
pub struct TracingLogger;

impl VoteLogger for TracingLogger {
    fn log(&self, entry: VoteLog) {
        let target = entry.target.to_string();
        // Failures and recovery at warn, the happy path at debug
        match &entry.event {
            VoteEvent::Rejected { .. } | VoteEvent::Restored | VoteEvent::Stale => {
                tracing::warn!(
                    target_entity = %target,
                    direction = %entry.direction,
                    "{}",
                    entry.event,
                );
            }
            VoteEvent::Refused | VoteEvent::Resynced => {
                tracing::info!(
                    target_entity = %target,
                    direction = %entry.direction,
                    "{}",
                    entry.event,
                );
            }
            _ => {
                tracing::debug!(
                    target_entity = %target,
                    direction = %entry.direction,
                    "{}",
                    entry.event,
                );
            }
        }
    }
}

/// No-op logger that discards all log entries.
pub struct NullLogger;

impl VoteLogger for NullLogger {
    fn log(&self, _entry: VoteLog) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use opine_types::models::OpinionId;

    #[test]
    fn event_display() {
        let event = VoteEvent::Optimistic {
            upvotes: 2,
            downvotes: 0,
        };
        assert_eq!(event.to_string(), "optimistic up=2 down=0");
        assert_eq!(
            VoteEvent::Rejected {
                error: "permission denied: Voting closed".into()
            }
            .to_string(),
            "rejected: permission denied: Voting closed"
        );
    }

    #[test]
    fn null_logger_accepts_everything() {
        let logger: &dyn VoteLogger = &NullLogger;
        logger.log(VoteLog {
            target: EntityRef::Opinion(OpinionId::from("o1")),
            direction: VoteDirection::Up,
            event: VoteEvent::Confirmed,
        });
    }
}
