use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use opine_types::models::{Comment, CommentId, Opinion, OpinionId, VoteSets};

use crate::error::{ClientError, Result};
use crate::fetcher::Fetcher;

/// Addresses one cached opinion or comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Opinion(OpinionId),
    Comment(CommentId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Opinion(id) => write!(f, "opinion {}", id),
            EntityRef::Comment(id) => write!(f, "comment {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Opinion(Opinion),
    Comment(Comment),
}

impl Entity {
    pub fn votes(&self) -> &VoteSets {
        match self {
            Entity::Opinion(o) => &o.votes,
            Entity::Comment(c) => &c.votes,
        }
    }
}

#[derive(Default)]
struct Entries {
    opinions: HashMap<OpinionId, Opinion>,
    /// Feed order from the last list fetch.
    feed: Vec<OpinionId>,
    comments: HashMap<CommentId, Comment>,
    /// Comment order per parent opinion.
    threads: HashMap<OpinionId, Vec<CommentId>>,
}

impl Entries {
    fn votes_mut(&mut self, target: &EntityRef) -> Option<&mut VoteSets> {
        match target {
            EntityRef::Opinion(id) => self.opinions.get_mut(id).map(|o| &mut o.votes),
            EntityRef::Comment(id) => self.comments.get_mut(id).map(|c| &mut c.votes),
        }
    }

    fn remove_comment(&mut self, id: &CommentId) {
        if let Some(comment) = self.comments.remove(id) {
            if let Some(thread) = self.threads.get_mut(&comment.opinion_id) {
                thread.retain(|c| c != id);
            }
        }
    }

    fn remove_opinion(&mut self, id: &OpinionId) {
        self.opinions.remove(id);
        self.feed.retain(|o| o != id);
    }
}

/// The client's local mirror of the opinions and comments on screen.
///
/// All mutation is synchronous and short; no lock is held across an await.
/// The mirror is allowed to be wrong for a while; the vote reconciler and the
/// refetch paths are what bring it back in line with the server.
#[derive(Default)]
pub struct EntityCache {
    entries: RwLock<Entries>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Wholesale loads --

    /// Replace the feed with a fresh list fetch.
    pub fn load_opinions(&self, opinions: Vec<Opinion>) {
        let mut entries = self.write();
        entries.opinions.clear();
        entries.feed = opinions.iter().map(|o| o.id.clone()).collect();
        for opinion in opinions {
            entries.opinions.insert(opinion.id.clone(), opinion);
        }
        debug!(count = entries.feed.len(), "Feed loaded");
    }

    /// Put one opinion in the cache (detail view) without touching the feed
    /// order.
    pub fn upsert_opinion(&self, opinion: Opinion) {
        self.write().opinions.insert(opinion.id.clone(), opinion);
    }

    /// Replace the comment thread of `opinion_id`.
    pub fn load_comments(&self, opinion_id: &OpinionId, comments: Vec<Comment>) {
        let mut entries = self.write();
        if let Some(old) = entries.threads.remove(opinion_id) {
            for id in old {
                entries.comments.remove(&id);
            }
        }

        let mut thread = Vec::with_capacity(comments.len());
        for mut comment in comments {
            comment.opinion_id = opinion_id.clone();
            thread.push(comment.id.clone());
            entries.comments.insert(comment.id.clone(), comment);
        }
        debug!(opinion_id = %opinion_id, count = thread.len(), "Comments loaded");
        entries.threads.insert(opinion_id.clone(), thread);
    }

    pub fn clear(&self) {
        *self.write() = Entries::default();
    }

    // -- Reads --

    pub fn get(&self, target: &EntityRef) -> Option<Entity> {
        let entries = self.read();
        match target {
            EntityRef::Opinion(id) => entries.opinions.get(id).cloned().map(Entity::Opinion),
            EntityRef::Comment(id) => entries.comments.get(id).cloned().map(Entity::Comment),
        }
    }

    pub fn opinion(&self, id: &OpinionId) -> Option<Opinion> {
        self.read().opinions.get(id).cloned()
    }

    pub fn comment(&self, id: &CommentId) -> Option<Comment> {
        self.read().comments.get(id).cloned()
    }

    /// The feed, in server order.
    pub fn opinions(&self) -> Vec<Opinion> {
        let entries = self.read();
        entries
            .feed
            .iter()
            .filter_map(|id| entries.opinions.get(id).cloned())
            .collect()
    }

    pub fn comments_for(&self, opinion_id: &OpinionId) -> Vec<Comment> {
        let entries = self.read();
        entries
            .threads
            .get(opinion_id)
            .map(|thread| {
                thread
                    .iter()
                    .filter_map(|id| entries.comments.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn votes(&self, target: &EntityRef) -> Option<VoteSets> {
        self.get(target).map(|e| e.votes().clone())
    }

    // -- Vote patches --

    /// Overwrite only the vote sets of `target`. Returns false, and does
    /// nothing, when the entity is not cached.
    pub fn apply_vote_patch(&self, target: &EntityRef, votes: VoteSets) -> bool {
        match self.write().votes_mut(target) {
            Some(current) => {
                *current = votes;
                true
            }
            None => false,
        }
    }

    /// Read-modify-write of the vote sets under one lock. Returns the sets
    /// before and after, or `None` when the entity is not cached.
    pub fn update_votes<U>(&self, target: &EntityRef, update: U) -> Option<(VoteSets, VoteSets)>
    where
        U: FnOnce(&VoteSets) -> VoteSets,
    {
        let mut entries = self.write();
        let current = entries.votes_mut(target)?;
        let before = current.clone();
        *current = update(&before);
        Some((before, current.clone()))
    }

    /// Patch only if the cached sets still equal `expected`. Used to undo an
    /// optimistic guess without clobbering anything written after it.
    pub fn compare_and_patch(
        &self,
        target: &EntityRef,
        expected: &VoteSets,
        votes: VoteSets,
    ) -> bool {
        match self.write().votes_mut(target) {
            Some(current) if current == expected => {
                *current = votes;
                true
            }
            _ => false,
        }
    }

    // -- Recovery --

    /// Fetch `target` again and overwrite the local record with the server's.
    ///
    /// Opinions come from `get_opinion`; comments come from their parent's
    /// comment list, since the API has no single-comment read. An entity the
    /// server no longer has is dropped locally. Returns whether the cache
    /// changed; an entity that is not cached is left alone and nothing is
    /// fetched for it.
    pub async fn refetch_and_replace<F: Fetcher>(
        &self,
        target: &EntityRef,
        fetcher: &F,
    ) -> Result<bool> {
        match target {
            EntityRef::Opinion(id) => {
                if !self.read().opinions.contains_key(id) {
                    return Ok(false);
                }
                match fetcher.get_opinion(id).await {
                    Ok(fresh) => {
                        let mut entries = self.write();
                        match entries.opinions.get_mut(id) {
                            Some(current) => {
                                *current = fresh;
                                debug!(opinion_id = %id, "Opinion resynchronized");
                                Ok(true)
                            }
                            None => Ok(false),
                        }
                    }
                    Err(ClientError::NotFound(_)) => {
                        debug!(opinion_id = %id, "Opinion gone on server, dropping");
                        self.write().remove_opinion(id);
                        Ok(true)
                    }
                    Err(e) => Err(e),
                }
            }
            EntityRef::Comment(id) => {
                let Some(parent) = self.read().comments.get(id).map(|c| c.opinion_id.clone()) else {
                    return Ok(false);
                };
                let thread = fetcher.list_comments(&parent).await?;
                let fresh = thread.into_iter().find(|c| &c.id == id);

                let mut entries = self.write();
                if !entries.comments.contains_key(id) {
                    return Ok(false);
                }
                match fresh {
                    Some(mut fresh) => {
                        fresh.opinion_id = parent;
                        entries.comments.insert(id.clone(), fresh);
                        debug!(comment_id = %id, "Comment resynchronized");
                    }
                    None => {
                        debug!(comment_id = %id, "Comment gone on server, dropping");
                        entries.remove_comment(id);
                    }
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opine_types::models::UserId;

    fn opinion(id: &str, up: &[&str], down: &[&str]) -> Opinion {
        Opinion {
            id: OpinionId::from(id),
            author: None,
            content: format!("opinion {}", id),
            votes: VoteSets::new(
                up.iter().map(|u| UserId::from(*u)),
                down.iter().map(|u| UserId::from(*u)),
            ),
            comment_count: 0,
            created_at: None,
        }
    }

    fn comment(id: &str, parent: &str) -> Comment {
        Comment {
            id: CommentId::from(id),
            opinion_id: OpinionId::from(parent),
            author: None,
            content: format!("comment {}", id),
            votes: VoteSets::default(),
            created_at: None,
        }
    }

    #[test]
    fn load_replaces_wholesale_and_keeps_order() {
        let cache = EntityCache::new();
        cache.load_opinions(vec![opinion("o1", &[], &[]), opinion("o2", &[], &[])]);
        cache.load_opinions(vec![opinion("o3", &[], &[]), opinion("o2", &["u1"], &[])]);

        let ids: Vec<_> = cache.opinions().into_iter().map(|o| o.id.0).collect();
        assert_eq!(ids, vec!["o3", "o2"]);
        assert!(cache.opinion(&OpinionId::from("o1")).is_none());
    }

    #[test]
    fn vote_patch_leaves_other_fields_alone() {
        let cache = EntityCache::new();
        cache.load_opinions(vec![opinion("o1", &[], &[])]);
        let target = EntityRef::Opinion(OpinionId::from("o1"));

        let patched = VoteSets::new(vec![UserId::from("u1")], Vec::new());
        assert!(cache.apply_vote_patch(&target, patched.clone()));

        let o1 = cache.opinion(&OpinionId::from("o1")).unwrap();
        assert_eq!(o1.votes, patched);
        assert_eq!(o1.content, "opinion o1");
    }

    #[test]
    fn vote_patch_on_missing_entity_is_noop() {
        let cache = EntityCache::new();
        let target = EntityRef::Comment(CommentId::from("nope"));
        assert!(!cache.apply_vote_patch(&target, VoteSets::default()));
        assert!(cache.update_votes(&target, |v| v.clone()).is_none());
    }

    #[test]
    fn comments_are_replaced_per_thread() {
        let cache = EntityCache::new();
        let o1 = OpinionId::from("o1");
        let o2 = OpinionId::from("o2");

        cache.load_comments(&o1, vec![comment("c1", "o1"), comment("c2", "o1")]);
        cache.load_comments(&o2, vec![comment("c3", "o2")]);
        cache.load_comments(&o1, vec![comment("c4", "")]);

        let ids: Vec<_> = cache.comments_for(&o1).into_iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec!["c4"]);
        assert!(cache.comment(&CommentId::from("c1")).is_none());
        assert_eq!(cache.comments_for(&o2).len(), 1);
        // Parent is filled in from the thread it was loaded under.
        assert_eq!(cache.comment(&CommentId::from("c4")).unwrap().opinion_id, o1);
    }

    #[test]
    fn compare_and_patch_respects_newer_writes() {
        let cache = EntityCache::new();
        cache.load_opinions(vec![opinion("o1", &["u1"], &[])]);
        let target = EntityRef::Opinion(OpinionId::from("o1"));

        let stale = VoteSets::default();
        assert!(!cache.compare_and_patch(&target, &stale, VoteSets::default()));
        assert_eq!(cache.votes(&target).unwrap().upvotes.len(), 1);

        let current = cache.votes(&target).unwrap();
        assert!(cache.compare_and_patch(&target, &current, VoteSets::default()));
        assert_eq!(cache.votes(&target).unwrap(), VoteSets::default());
    }

    #[test]
    fn clear_forgets_everything() {
        let cache = EntityCache::new();
        let o1 = OpinionId::from("o1");
        cache.load_opinions(vec![opinion("o1", &[], &[])]);
        cache.load_comments(&o1, vec![comment("c1", "o1")]);

        cache.clear();

        assert!(cache.opinions().is_empty());
        assert!(cache.comments_for(&o1).is_empty());
        assert!(cache.get(&EntityRef::Comment(CommentId::from("c1"))).is_none());
    }
}
