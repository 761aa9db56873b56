use std::sync::Arc;

use tracing::{debug, info};

use opine_types::models::{Comment, Opinion, OpinionId};

use crate::cache::EntityCache;
use crate::error::{ClientError, Result};
use crate::fetcher::Fetcher;
use crate::session::SessionStore;

/// Feed and detail-view operations: the fetches that fill the cache and the
/// two write paths (new opinion, new comment).
pub struct Board<F> {
    fetcher: Arc<F>,
    session: Arc<SessionStore<F>>,
    cache: Arc<EntityCache>,
}

impl<F: Fetcher> Board<F> {
    pub fn new(fetcher: Arc<F>, session: Arc<SessionStore<F>>, cache: Arc<EntityCache>) -> Self {
        Self {
            fetcher,
            session,
            cache,
        }
    }

    /// Reload the feed from the server, replacing whatever was cached.
    pub async fn refresh_feed(&self) -> Result<Vec<Opinion>> {
        let opinions = self.checked(self.fetcher.list_opinions().await)?;
        self.cache.load_opinions(opinions);
        Ok(self.cache.opinions())
    }

    /// Load one opinion and its comment thread into the cache.
    pub async fn open_opinion(&self, id: &OpinionId) -> Result<(Opinion, Vec<Comment>)> {
        let opinion = self.checked(self.fetcher.get_opinion(id).await)?;
        let comments = self.checked(self.fetcher.list_comments(id).await)?;
        debug!(opinion_id = %id, comments = comments.len(), "Opinion opened");

        self.cache.upsert_opinion(opinion.clone());
        self.cache.load_comments(id, comments);
        Ok((opinion, self.cache.comments_for(id)))
    }

    /// Post a comment, then reload the opinion (for its comment count) and
    /// its thread.
    pub async fn post_comment(&self, opinion_id: &OpinionId, content: &str) -> Result<()> {
        self.require_session()?;
        let content = non_blank(content, "Comment cannot be empty")?;

        self.checked(self.fetcher.post_comment(opinion_id, content).await)?;
        info!(opinion_id = %opinion_id, "Comment posted");

        self.open_opinion(opinion_id).await?;
        Ok(())
    }

    /// Publish a new opinion and reload the feed.
    pub async fn create_opinion(&self, content: &str) -> Result<()> {
        self.require_session()?;
        let content = non_blank(content, "Opinion cannot be empty")?;

        self.checked(self.fetcher.create_opinion(content).await)?;
        info!("Opinion created");

        self.refresh_feed().await?;
        Ok(())
    }

    fn require_session(&self) -> Result<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::Auth("login required".into()))
        }
    }

    /// Pass a result through, expiring the session on `Auth` failures.
    fn checked<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.session.observe_error(e);
        }
        result
    }
}

fn non_blank<'a>(content: &'a str, message: &str) -> Result<&'a str> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        Err(ClientError::Validation(message.to_string()))
    } else {
        Ok(trimmed)
    }
}
