use std::future::Future;

use opine_types::models::{Comment, CommentId, FullName, Opinion, OpinionId, User, VoteDirection};

use crate::credential::Credential;
use crate::error::Result;

/// What a successful login hands back.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub credential: Credential,
    pub user: User,
}

/// Remote operations the client core depends on.
///
/// Implementations own the transport (base URL, headers, TLS). The one
/// cross-cutting duty they take on is credential decoration: after
/// `set_credential`, every request they send must carry that credential, or
/// none once it has been cleared.
pub trait Fetcher: Send + Sync {
    fn set_credential(&self, credential: Option<Credential>);

    fn fetch_current_user(&self, credential: &Credential)
    -> impl Future<Output = Result<User>> + Send;

    fn login(&self, email: &str, password: &str) -> impl Future<Output = Result<LoginGrant>> + Send;

    fn register(
        &self,
        fullname: &FullName,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Best-effort; callers ignore the outcome beyond logging it.
    fn logout(&self, credential: &Credential) -> impl Future<Output = Result<()>> + Send;

    fn list_opinions(&self) -> impl Future<Output = Result<Vec<Opinion>>> + Send;

    fn get_opinion(&self, id: &OpinionId) -> impl Future<Output = Result<Opinion>> + Send;

    fn create_opinion(&self, content: &str) -> impl Future<Output = Result<()>> + Send;

    fn vote_opinion(
        &self,
        id: &OpinionId,
        direction: VoteDirection,
    ) -> impl Future<Output = Result<()>> + Send;

    fn list_comments(&self, opinion_id: &OpinionId)
    -> impl Future<Output = Result<Vec<Comment>>> + Send;

    fn post_comment(
        &self,
        opinion_id: &OpinionId,
        content: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn vote_comment(
        &self,
        id: &CommentId,
        direction: VoteDirection,
    ) -> impl Future<Output = Result<()>> + Send;
}
