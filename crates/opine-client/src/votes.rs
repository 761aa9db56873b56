use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use opine_types::models::{UserId, VoteDirection, VoteSets};

use crate::cache::{EntityCache, EntityRef};
use crate::error::ClientError;
use crate::fetcher::Fetcher;
use crate::logging::{TracingLogger, VoteEvent, VoteLog, VoteLogger};
use crate::session::SessionStore;

/// Vote sets after `voter` toggles `direction`.
///
/// Holding `direction` already: un-vote, the other set is left alone.
/// Otherwise: join `direction` and leave the opposite set. Either way the
/// voter ends up in at most one set.
pub fn toggled(current: &VoteSets, voter: &UserId, direction: VoteDirection) -> VoteSets {
    let mut next = current.clone();
    if next.set(direction).contains(voter) {
        next.set_mut(direction).remove(voter);
    } else {
        next.set_mut(direction).insert(voter.clone());
        next.set_mut(direction.opposite()).remove(voter);
    }
    next
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Server accepted; the cached sets are these.
    Applied(VoteSets),
    /// The entity is not cached, so nothing was sent.
    Missing,
}

/// How the cache was brought back after a rejected vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Replaced with a fresh copy from the server.
    Resynced,
    /// The refetch failed too; the pre-vote sets were put back.
    Restored,
    /// The refetch failed and a newer local write was left in place.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("log in to vote")]
    Unauthorized,

    #[error("vote rejected: {error}")]
    Rejected { error: ClientError, recovery: Recovery },
}

impl VoteError {
    /// The vote failed for lack of a valid session, either locally or
    /// because the server rejected the credential.
    pub fn is_auth(&self) -> bool {
        match self {
            VoteError::Unauthorized => true,
            VoteError::Rejected { error, .. } => error.is_auth(),
        }
    }
}

/// Applies votes locally first, then settles them with the server.
pub struct VoteReconciler<F> {
    fetcher: Arc<F>,
    session: Arc<SessionStore<F>>,
    cache: Arc<EntityCache>,
    logger: Arc<dyn VoteLogger>,
    in_flight: Mutex<HashMap<EntityRef, usize>>,
}

impl<F: Fetcher> VoteReconciler<F> {
    pub fn new(fetcher: Arc<F>, session: Arc<SessionStore<F>>, cache: Arc<EntityCache>) -> Self {
        Self {
            fetcher,
            session,
            cache,
            logger: Arc::new(TracingLogger),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn VoteLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Toggle the session user's vote on `target` and settle it with the
    /// server. See [`begin`](Self::begin) and [`PendingVote::settle`].
    pub async fn toggle(
        &self,
        target: &EntityRef,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, VoteError> {
        match self.begin(target, direction)? {
            Some(pending) => pending.settle().await,
            None => Ok(VoteOutcome::Missing),
        }
    }

    /// The synchronous half of a toggle: check the session, compute the new
    /// sets and write them to the cache. By the time this returns the UI can
    /// already render the vote; nothing has been sent yet.
    ///
    /// `Ok(None)` means the entity is not cached and the toggle is a no-op.
    pub fn begin(
        &self,
        target: &EntityRef,
        direction: VoteDirection,
    ) -> Result<Option<PendingVote<'_, F>>, VoteError> {
        let Some(voter) = self.session.current_user() else {
            self.log(target, direction, VoteEvent::Refused);
            return Err(VoteError::Unauthorized);
        };

        let Some((before, optimistic)) = self
            .cache
            .update_votes(target, |current| toggled(current, &voter.id, direction))
        else {
            self.log(target, direction, VoteEvent::Missing);
            return Ok(None);
        };

        self.log(
            target,
            direction,
            VoteEvent::Optimistic {
                upvotes: optimistic.upvotes.len(),
                downvotes: optimistic.downvotes.len(),
            },
        );
        self.track(target);

        Ok(Some(PendingVote {
            reconciler: self,
            target: target.clone(),
            direction,
            before,
            optimistic,
        }))
    }

    /// True while a mutation for `target` has been sent and not yet settled.
    /// Front ends can use it to disable the vote buttons.
    pub fn is_in_flight(&self, target: &EntityRef) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(target)
    }

    fn track(&self, target: &EntityRef) {
        *self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(target.clone())
            .or_default() += 1;
    }

    fn untrack(&self, target: &EntityRef) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = in_flight.get_mut(target) {
            *count -= 1;
            if *count == 0 {
                in_flight.remove(target);
            }
        }
    }

    fn log(&self, target: &EntityRef, direction: VoteDirection, event: VoteEvent) {
        self.logger.log(VoteLog {
            target: target.clone(),
            direction,
            event,
        });
    }

    async fn recover(&self, pending: &PendingVote<'_, F>) -> Recovery {
        match self.cache.refetch_and_replace(&pending.target, &*self.fetcher).await {
            Ok(_) => Recovery::Resynced,
            Err(e) => {
                tracing::warn!(
                    target_entity = %pending.target,
                    "Refetch after rejected vote failed: {}",
                    e
                );
                let restore = pending.before.clone();
                if self
                    .cache
                    .compare_and_patch(&pending.target, &pending.optimistic, restore)
                {
                    Recovery::Restored
                } else {
                    Recovery::Stale
                }
            }
        }
    }
}

/// A vote already applied to the cache and waiting to be sent.
///
/// Dropping it without calling [`settle`](Self::settle) leaves the optimistic
/// sets in the cache and sends nothing.
pub struct PendingVote<'a, F: Fetcher> {
    reconciler: &'a VoteReconciler<F>,
    target: EntityRef,
    direction: VoteDirection,
    before: VoteSets,
    optimistic: VoteSets,
}

impl<F: Fetcher> PendingVote<'_, F> {
    pub fn target(&self) -> &EntityRef {
        &self.target
    }

    /// The sets written to the cache by `begin`.
    pub fn optimistic(&self) -> &VoteSets {
        &self.optimistic
    }

    /// Send the mutation. On rejection the cache is resynchronized from the
    /// server (never retried) and the server's error is returned.
    pub async fn settle(self) -> Result<VoteOutcome, VoteError> {
        let r = self.reconciler;
        let sent = match &self.target {
            EntityRef::Opinion(id) => r.fetcher.vote_opinion(id, self.direction).await,
            EntityRef::Comment(id) => r.fetcher.vote_comment(id, self.direction).await,
        };

        match sent {
            Ok(()) => {
                r.log(&self.target, self.direction, VoteEvent::Confirmed);
                Ok(VoteOutcome::Applied(self.optimistic.clone()))
            }
            Err(error) => {
                r.log(
                    &self.target,
                    self.direction,
                    VoteEvent::Rejected {
                        error: error.to_string(),
                    },
                );
                r.session.observe_error(&error);

                let recovery = r.recover(&self).await;
                let event = match recovery {
                    Recovery::Resynced => VoteEvent::Resynced,
                    Recovery::Restored => VoteEvent::Restored,
                    Recovery::Stale => VoteEvent::Stale,
                };
                r.log(&self.target, self.direction, event);
                Err(VoteError::Rejected { error, recovery })
            }
        }
    }
}

impl<F: Fetcher> Drop for PendingVote<'_, F> {
    fn drop(&mut self) {
        self.reconciler.untrack(&self.target);
    }
}
