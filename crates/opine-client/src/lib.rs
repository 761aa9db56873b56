//! Client-side state synchronization for Opine.
//!
//! Two pieces carry the real invariants:
//!
//! - [`session::SessionStore`]: credential lifecycle, verification and the
//!   credential attached to every outgoing request.
//! - [`votes::VoteReconciler`]: optimistic vote toggles on the local
//!   [`cache::EntityCache`], settled against the server and rolled back by
//!   refetch when the server says no.
//!
//! Everything remote goes through the [`fetcher::Fetcher`] trait;
//! [`http::HttpFetcher`] is the REST implementation.

pub mod board;
pub mod cache;
pub mod config;
pub mod credential;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod logging;
pub mod session;
pub mod votes;

use std::sync::Arc;

use crate::board::Board;
use crate::cache::EntityCache;
use crate::config::ClientConfig;
use crate::credential::{CredentialStore, FileCredentialStore};
use crate::fetcher::Fetcher;
use crate::http::HttpFetcher;
use crate::logging::VoteLogger;
use crate::session::SessionStore;
use crate::votes::VoteReconciler;

pub use crate::error::{ClientError, Result};

/// One session, one cache and the components built over them.
pub struct Client<F> {
    session: Arc<SessionStore<F>>,
    cache: Arc<EntityCache>,
    votes: VoteReconciler<F>,
    board: Board<F>,
}

impl<F: Fetcher> Client<F> {
    pub fn new(fetcher: F, store: impl CredentialStore + 'static) -> Self {
        let fetcher = Arc::new(fetcher);
        let session = Arc::new(SessionStore::new(fetcher.clone(), store));
        let cache = Arc::new(EntityCache::new());
        let votes = VoteReconciler::new(fetcher.clone(), session.clone(), cache.clone());
        let board = Board::new(fetcher, session.clone(), cache.clone());

        Self {
            session,
            cache,
            votes,
            board,
        }
    }

    pub fn with_vote_logger(mut self, logger: Arc<dyn VoteLogger>) -> Self {
        self.votes = self.votes.with_logger(logger);
        self
    }

    pub fn session(&self) -> &Arc<SessionStore<F>> {
        &self.session
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn votes(&self) -> &VoteReconciler<F> {
        &self.votes
    }

    pub fn board(&self) -> &Board<F> {
        &self.board
    }
}

impl Client<HttpFetcher> {
    /// REST client with the credential persisted at `config.credential_path`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(config)?;
        let store = FileCredentialStore::new(config.credential_path.clone());
        Ok(Self::new(fetcher, store))
    }
}
