use serde::{Deserialize, Serialize};

use crate::models::{FullName, OpinionId, User, VoteDirection};

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub fullname: FullName,
    pub email: String,
    pub password: String,
}

// -- Opinions & comments --

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOpinionRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(rename = "opinionId")]
    pub opinion_id: OpinionId,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub direction: VoteDirection,
}

// -- Envelopes --

/// `{ "data": ... }` wrapper used by the opinion and comment endpoints.
/// The comment list endpoint omits `data` when there is nothing to return.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Option<T>,
}

/// Error body: `{ "message": "..." }`. Not every failure carries one.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
