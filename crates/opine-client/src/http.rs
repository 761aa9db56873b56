use std::sync::{PoisonError, RwLock};

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use opine_types::api::{
    CreateCommentRequest, CreateOpinionRequest, DataEnvelope, ErrorBody, LoginRequest,
    LoginResponse, RegisterRequest, VoteRequest,
};
use opine_types::models::{Comment, CommentId, FullName, Opinion, OpinionId, User, VoteDirection};

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::error::{ClientError, Result};
use crate::fetcher::{Fetcher, LoginGrant};

/// `Fetcher` over the Opine REST API.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    credential: RwLock<Option<Credential>>,
}

impl HttpFetcher {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Network(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            credential: RwLock::new(None),
        })
    }

    fn current_credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn request_with(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match credential {
            Some(c) => req.header(AUTHORIZATION, format!("Bearer {}", c.token())),
            None => req,
        }
    }

    /// Request decorated with whatever credential is currently attached.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let credential = self.current_credential();
        self.request_with(method, path, credential.as_ref())
    }

    /// Send and return the raw body of a 2xx response. Anything else becomes
    /// a `ClientError`, using the server's `message` when it sent one.
    async fn send(&self, req: RequestBuilder, path: &str, fallback: &str) -> Result<Vec<u8>> {
        let resp = req.send().await.map_err(|e| {
            warn!(path, "Request failed: {}", e);
            transport_error(e)
        })?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(transport_error)?;

        if status.is_success() {
            debug!(path, status = status.as_u16(), "Request ok");
            return Ok(body.to_vec());
        }

        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());

        warn!(path, status = status.as_u16(), "Request rejected: {}", message);
        Err(ClientError::from_status(status.as_u16(), message))
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Network("request timed out".into())
    } else {
        ClientError::Network(e.to_string())
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))
}

impl Fetcher for HttpFetcher {
    fn set_credential(&self, credential: Option<Credential>) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credential;
    }

    async fn fetch_current_user(&self, credential: &Credential) -> Result<User> {
        let path = "/api/users/profile";
        let req = self.request_with(Method::GET, path, Some(credential));
        let body = self.send(req, path, "Session is no longer valid").await?;
        decode(&body)
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant> {
        let path = "/api/users/login";
        let req = self.request(Method::POST, path).json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        });
        let body = self.send(req, path, "Login failed").await?;
        let resp: LoginResponse = decode(&body)?;
        Ok(LoginGrant {
            credential: Credential::new(resp.token),
            user: resp.user,
        })
    }

    async fn register(&self, fullname: &FullName, email: &str, password: &str) -> Result<()> {
        let path = "/api/users/register";
        let req = self.request(Method::POST, path).json(&RegisterRequest {
            fullname: fullname.clone(),
            email: email.to_string(),
            password: password.to_string(),
        });
        self.send(req, path, "Registration failed").await?;
        Ok(())
    }

    async fn logout(&self, credential: &Credential) -> Result<()> {
        let path = "/api/users/logout";
        let req = self.request_with(Method::GET, path, Some(credential));
        self.send(req, path, "Logout failed").await?;
        Ok(())
    }

    async fn list_opinions(&self) -> Result<Vec<Opinion>> {
        let path = "/api/opinions";
        let body = self
            .send(self.request(Method::GET, path), path, "Failed to load opinions")
            .await?;
        let env: DataEnvelope<Vec<Opinion>> = decode(&body)?;
        Ok(env.data.unwrap_or_default())
    }

    async fn get_opinion(&self, id: &OpinionId) -> Result<Opinion> {
        let path = format!("/api/opinions/{}", id);
        let body = self
            .send(self.request(Method::GET, &path), &path, "Opinion not found")
            .await?;
        let env: DataEnvelope<Opinion> = decode(&body)?;
        env.data
            .ok_or_else(|| ClientError::Decode(format!("opinion {} response has no data", id)))
    }

    async fn create_opinion(&self, content: &str) -> Result<()> {
        let path = "/api/opinions";
        let req = self.request(Method::POST, path).json(&CreateOpinionRequest {
            content: content.to_string(),
        });
        self.send(req, path, "Failed to create opinion").await?;
        Ok(())
    }

    async fn vote_opinion(&self, id: &OpinionId, direction: VoteDirection) -> Result<()> {
        let path = format!("/api/opinions/{}/vote", id);
        let req = self
            .request(Method::POST, &path)
            .json(&VoteRequest { direction });
        self.send(req, &path, "Vote failed").await?;
        Ok(())
    }

    async fn list_comments(&self, opinion_id: &OpinionId) -> Result<Vec<Comment>> {
        let path = format!("/api/comments/opinion/{}", opinion_id);
        let body = self
            .send(self.request(Method::GET, &path), &path, "Failed to load comments")
            .await?;
        let env: DataEnvelope<Vec<Comment>> = decode(&body)?;
        Ok(env.data.unwrap_or_default())
    }

    async fn post_comment(&self, opinion_id: &OpinionId, content: &str) -> Result<()> {
        let path = "/api/comments";
        let req = self.request(Method::POST, path).json(&CreateCommentRequest {
            opinion_id: opinion_id.clone(),
            content: content.to_string(),
        });
        self.send(req, path, "Failed to add comment").await?;
        Ok(())
    }

    async fn vote_comment(&self, id: &CommentId, direction: VoteDirection) -> Result<()> {
        let path = format!("/api/comments/{}/vote", id);
        let req = self
            .request(Method::POST, &path)
            .json(&VoteRequest { direction });
        self.send(req, &path, "Vote failed").await?;
        Ok(())
    }
}
