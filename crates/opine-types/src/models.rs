use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when a record carries no usable author name.
pub const ANONYMOUS: &str = "Anonymous";

// -- Ids --

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

id_type!(
    /// Server-assigned user id. Opaque and stable.
    UserId
);
id_type!(OpinionId);
id_type!(CommentId);

// -- Users --

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullName {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

impl FullName {
    pub fn new(firstname: impl Into<String>, lastname: impl Into<String>) -> Self {
        Self {
            firstname: firstname.into(),
            lastname: lastname.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub fullname: FullName,
    #[serde(default)]
    pub email: String,
}

impl User {
    /// "First Last", or the anonymous placeholder when both parts are empty.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.fullname.firstname, self.fullname.lastname);
        let name = name.trim();
        if name.is_empty() {
            ANONYMOUS.to_string()
        } else {
            name.to_string()
        }
    }
}

// -- Authors --

/// Weak reference to the author of an opinion or comment.
///
/// The display name is denormalized from whatever the server populated; it
/// is never used to look the user up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireAuthor", into = "WireAuthor")]
pub struct AuthorRef {
    pub id: UserId,
    pub display_name: String,
}

/// The server sends either a bare id or a populated user document, and the
/// populated form has shipped both with and without the `fullname` wrapper.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireAuthor {
    Id(UserId),
    Populated {
        #[serde(rename = "_id")]
        id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fullname: Option<FullName>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        firstname: Option<String>,
    },
}

impl From<WireAuthor> for AuthorRef {
    fn from(wire: WireAuthor) -> Self {
        match wire {
            WireAuthor::Id(id) => Self {
                id,
                display_name: ANONYMOUS.to_string(),
            },
            WireAuthor::Populated {
                id,
                fullname,
                firstname,
            } => {
                let display_name = fullname
                    .map(|f| f.firstname)
                    .filter(|n| !n.is_empty())
                    .or(firstname.filter(|n| !n.is_empty()))
                    .unwrap_or_else(|| ANONYMOUS.to_string());
                Self { id, display_name }
            }
        }
    }
}

impl From<AuthorRef> for WireAuthor {
    fn from(author: AuthorRef) -> Self {
        WireAuthor::Populated {
            id: author.id,
            fullname: Some(FullName::new(author.display_name, "")),
            firstname: None,
        }
    }
}

// -- Votes --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteDirection {
    #[serde(rename = "upvote")]
    Up,
    #[serde(rename = "downvote")]
    Down,
}

impl VoteDirection {
    pub fn opposite(self) -> Self {
        match self {
            VoteDirection::Up => VoteDirection::Down,
            VoteDirection::Down => VoteDirection::Up,
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDirection::Up => f.write_str("upvote"),
            VoteDirection::Down => f.write_str("downvote"),
        }
    }
}

/// The two vote sets of an opinion or comment.
///
/// Nothing here stops a voter from sitting in both sets when the server sends
/// them that way; the reconciler is what keeps them exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSets {
    #[serde(default)]
    pub upvotes: BTreeSet<UserId>,
    #[serde(default)]
    pub downvotes: BTreeSet<UserId>,
}

impl VoteSets {
    pub fn new<U, D>(upvotes: U, downvotes: D) -> Self
    where
        U: IntoIterator<Item = UserId>,
        D: IntoIterator<Item = UserId>,
    {
        Self {
            upvotes: upvotes.into_iter().collect(),
            downvotes: downvotes.into_iter().collect(),
        }
    }

    pub fn set(&self, direction: VoteDirection) -> &BTreeSet<UserId> {
        match direction {
            VoteDirection::Up => &self.upvotes,
            VoteDirection::Down => &self.downvotes,
        }
    }

    pub fn set_mut(&mut self, direction: VoteDirection) -> &mut BTreeSet<UserId> {
        match direction {
            VoteDirection::Up => &mut self.upvotes,
            VoteDirection::Down => &mut self.downvotes,
        }
    }

    /// The direction `voter` currently holds, if any. Up wins if the payload
    /// lists the voter twice.
    pub fn held_by(&self, voter: &UserId) -> Option<VoteDirection> {
        if self.upvotes.contains(voter) {
            Some(VoteDirection::Up)
        } else if self.downvotes.contains(voter) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }

    /// Net score shown next to the vote buttons.
    pub fn score(&self) -> i64 {
        self.upvotes.len() as i64 - self.downvotes.len() as i64
    }
}

// -- Opinions & comments --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    #[serde(rename = "_id")]
    pub id: OpinionId,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub votes: VoteSets,
    #[serde(rename = "commentCount", default)]
    pub comment_count: u32,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Opinion {
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map_or(ANONYMOUS, |a| a.display_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    /// Parent opinion. Older payloads omit it; the cache fills it in from the
    /// list request that produced the comment.
    #[serde(rename = "opinion", alias = "opinionId", default = "unknown_parent")]
    pub opinion_id: OpinionId,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub votes: VoteSets,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map_or(ANONYMOUS, |a| a.display_name.as_str())
    }
}

fn unknown_parent() -> OpinionId {
    OpinionId(String::new())
}
