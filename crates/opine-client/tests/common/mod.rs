//! Scripted in-memory `Fetcher` shared by the integration tests.
//!
//! It keeps its own "server truth" for opinions and comments, applies votes
//! to it when they succeed, and journals every call so tests can assert on
//! traffic and ordering.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use opine_client::ClientError;
use opine_client::credential::Credential;
use opine_client::fetcher::{Fetcher, LoginGrant};
use opine_client::logging::{VoteLog, VoteLogger};
use opine_client::votes::toggled;
use opine_types::models::{
    AuthorRef, Comment, CommentId, FullName, Opinion, OpinionId, User, UserId, VoteDirection, VoteSets,
};

/// Ordered record of fetcher calls and vote log events.
#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Vote logger writing into the same journal as the fetcher.
pub struct JournalLogger(pub Arc<Journal>);

impl VoteLogger for JournalLogger {
    fn log(&self, entry: VoteLog) {
        self.0.push(format!("log:{}:{}", entry.target, entry.event));
    }
}

#[derive(Default)]
pub struct ServerState {
    /// Tokens the server accepts, and whose they are.
    pub sessions: HashMap<String, User>,
    /// email -> (password, user)
    pub accounts: HashMap<String, (String, User)>,
    pub opinions: Vec<Opinion>,
    pub comments: Vec<Comment>,
    /// Credential currently attached by the session.
    pub attached: Option<Credential>,
    /// Fail every vote mutation with this error.
    pub reject_votes: Option<ClientError>,
    /// Fail reads (get_opinion / list_comments) with this error.
    pub reject_reads: Option<ClientError>,
    pub reject_logout: bool,
    pub next_token: u32,
}

#[derive(Clone, Default)]
pub struct FakeFetcher {
    pub state: Arc<Mutex<ServerState>>,
    pub journal: Arc<Journal>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str, user: User) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_string(), (password.to_string(), user));
        self
    }

    pub fn with_session(self, token: &str, user: User) -> Self {
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(token.to_string(), user);
        self
    }

    pub fn with_opinions(self, opinions: Vec<Opinion>) -> Self {
        self.state.lock().unwrap().opinions = opinions;
        self
    }

    pub fn with_comments(self, comments: Vec<Comment>) -> Self {
        self.state.lock().unwrap().comments = comments;
        self
    }

    pub fn reject_votes(&self, error: ClientError) {
        self.state.lock().unwrap().reject_votes = Some(error);
    }

    pub fn reject_reads(&self, error: ClientError) {
        self.state.lock().unwrap().reject_reads = Some(error);
    }

    pub fn reject_logout(&self) {
        self.state.lock().unwrap().reject_logout = true;
    }

    /// Overwrite the server's copy of an opinion's votes, as if another
    /// client had voted.
    pub fn set_server_votes(&self, id: &str, votes: VoteSets) {
        let mut state = self.state.lock().unwrap();
        if let Some(o) = state.opinions.iter_mut().find(|o| o.id.as_str() == id) {
            o.votes = votes;
        }
    }

    pub fn server_opinion(&self, id: &str) -> Option<Opinion> {
        self.state
            .lock()
            .unwrap()
            .opinions
            .iter()
            .find(|o| o.id.as_str() == id)
            .cloned()
    }

    pub fn attached(&self) -> Option<Credential> {
        self.state.lock().unwrap().attached.clone()
    }

    pub fn calls(&self, prefix: &str) -> usize {
        self.journal.count(prefix)
    }

    /// Journal the call and yield once, so concurrent callers interleave the
    /// way they would against a real server.
    async fn enter(&self, call: String) {
        self.journal.push(call);
        tokio::task::yield_now().await;
    }

    fn caller(&self) -> Result<User, ClientError> {
        let state = self.state.lock().unwrap();
        state
            .attached
            .as_ref()
            .and_then(|c| state.sessions.get(c.token()).cloned())
            .ok_or_else(|| ClientError::Auth("Unauthorized".into()))
    }
}

impl Fetcher for FakeFetcher {
    fn set_credential(&self, credential: Option<Credential>) {
        self.state.lock().unwrap().attached = credential;
    }

    async fn fetch_current_user(&self, credential: &Credential) -> Result<User, ClientError> {
        self.enter("fetch_current_user".into()).await;
        self.state
            .lock()
            .unwrap()
            .sessions
            .get(credential.token())
            .cloned()
            .ok_or_else(|| ClientError::Auth("invalid token".into()))
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, ClientError> {
        self.enter(format!("login:{}", email)).await;
        let mut state = self.state.lock().unwrap();
        let user = match state.accounts.get(email) {
            Some((expected, user)) if expected == password => user.clone(),
            _ => return Err(ClientError::Auth("Invalid email or password".into())),
        };
        state.next_token += 1;
        let token = format!("token-{}", state.next_token);
        state.sessions.insert(token.clone(), user.clone());
        Ok(LoginGrant {
            credential: Credential::new(token),
            user,
        })
    }

    async fn register(&self, fullname: &FullName, email: &str, password: &str) -> Result<(), ClientError> {
        self.enter(format!("register:{}", email)).await;
        let mut state = self.state.lock().unwrap();
        if state.accounts.contains_key(email) {
            return Err(ClientError::Validation("Email already registered".into()));
        }
        let user = User {
            id: UserId::from(format!("user-{}", state.accounts.len() + 1)),
            fullname: fullname.clone(),
            email: email.to_string(),
        };
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), user));
        Ok(())
    }

    async fn logout(&self, credential: &Credential) -> Result<(), ClientError> {
        self.enter("logout".into()).await;
        let mut state = self.state.lock().unwrap();
        if state.reject_logout {
            return Err(ClientError::Network("connection reset".into()));
        }
        state.sessions.remove(credential.token());
        Ok(())
    }

    async fn list_opinions(&self) -> Result<Vec<Opinion>, ClientError> {
        self.enter("list_opinions".into()).await;
        Ok(self.state.lock().unwrap().opinions.clone())
    }

    async fn get_opinion(&self, id: &OpinionId) -> Result<Opinion, ClientError> {
        self.enter(format!("get_opinion:{}", id)).await;
        let state = self.state.lock().unwrap();
        if let Some(e) = &state.reject_reads {
            return Err(e.clone());
        }
        state
            .opinions
            .iter()
            .find(|o| &o.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Opinion not found".into()))
    }

    async fn create_opinion(&self, content: &str) -> Result<(), ClientError> {
        self.enter("create_opinion".into()).await;
        let author = self.caller()?;
        let mut state = self.state.lock().unwrap();
        let id = OpinionId::from(format!("o{}", state.opinions.len() + 1));
        state.opinions.insert(
            0,
            Opinion {
                id,
                author: Some(AuthorRef {
                    display_name: author.fullname.firstname.clone(),
                    id: author.id,
                }),
                content: content.to_string(),
                votes: VoteSets::default(),
                comment_count: 0,
                created_at: None,
            },
        );
        Ok(())
    }

    async fn vote_opinion(&self, id: &OpinionId, direction: VoteDirection) -> Result<(), ClientError> {
        self.enter(format!("vote_opinion:{}:{}", id, direction)).await;
        let voter = self.caller()?;
        let mut state = self.state.lock().unwrap();
        if let Some(e) = &state.reject_votes {
            return Err(e.clone());
        }
        let opinion = state
            .opinions
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| ClientError::NotFound("Opinion not found".into()))?;
        opinion.votes = toggled(&opinion.votes, &voter.id, direction);
        Ok(())
    }

    async fn list_comments(&self, opinion_id: &OpinionId) -> Result<Vec<Comment>, ClientError> {
        self.enter(format!("list_comments:{}", opinion_id)).await;
        let state = self.state.lock().unwrap();
        if let Some(e) = &state.reject_reads {
            return Err(e.clone());
        }
        Ok(state
            .comments
            .iter()
            .filter(|c| &c.opinion_id == opinion_id)
            .cloned()
            .collect())
    }

    async fn post_comment(&self, opinion_id: &OpinionId, content: &str) -> Result<(), ClientError> {
        self.enter(format!("post_comment:{}", opinion_id)).await;
        self.caller()?;
        let mut state = self.state.lock().unwrap();
        let id = CommentId::from(format!("c{}", state.comments.len() + 1));
        state.comments.push(Comment {
            id,
            opinion_id: opinion_id.clone(),
            author: None,
            content: content.to_string(),
            votes: VoteSets::default(),
            created_at: None,
        });
        if let Some(o) = state.opinions.iter_mut().find(|o| &o.id == opinion_id) {
            o.comment_count += 1;
        }
        Ok(())
    }

    async fn vote_comment(&self, id: &CommentId, direction: VoteDirection) -> Result<(), ClientError> {
        self.enter(format!("vote_comment:{}:{}", id, direction)).await;
        let voter = self.caller()?;
        let mut state = self.state.lock().unwrap();
        if let Some(e) = &state.reject_votes {
            return Err(e.clone());
        }
        let comment = state
            .comments
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ClientError::NotFound("Comment not found".into()))?;
        comment.votes = toggled(&comment.votes, &voter.id, direction);
        Ok(())
    }
}

// -- Fixtures --

pub fn user(id: &str, first: &str) -> User {
    User {
        id: UserId::from(id),
        fullname: FullName::new(first, "Tester"),
        email: format!("{}@example.com", id),
    }
}

pub fn uid(id: &str) -> UserId {
    UserId::from(id)
}

pub fn votes(up: &[&str], down: &[&str]) -> VoteSets {
    VoteSets::new(up.iter().map(|u| uid(u)), down.iter().map(|u| uid(u)))
}

pub fn opinion(id: &str, up: &[&str], down: &[&str]) -> Opinion {
    Opinion {
        id: OpinionId::from(id),
        author: None,
        content: format!("hot take {}", id),
        votes: votes(up, down),
        comment_count: 0,
        created_at: None,
    }
}

pub fn comment(id: &str, parent: &str, up: &[&str], down: &[&str]) -> Comment {
    Comment {
        id: CommentId::from(id),
        opinion_id: OpinionId::from(parent),
        author: None,
        content: format!("reply {}", id),
        votes: votes(up, down),
        created_at: None,
    }
}
