use opine_client::session::SessionState;
use opine_types::models::{Comment, Opinion, UserId, VoteDirection, VoteSets};

/// `^` or `v` when the viewer holds a vote, blank otherwise.
fn marker(votes: &VoteSets, viewer: Option<&UserId>) -> char {
    match viewer.and_then(|v| votes.held_by(v)) {
        Some(VoteDirection::Up) => '^',
        Some(VoteDirection::Down) => 'v',
        None => ' ',
    }
}

fn tally(votes: &VoteSets, viewer: Option<&UserId>) -> String {
    format!(
        "{}{:+} (+{}/-{})",
        marker(votes, viewer),
        votes.score(),
        votes.upvotes.len(),
        votes.downvotes.len()
    )
}

pub fn opinion_line(opinion: &Opinion, viewer: Option<&UserId>) -> String {
    format!(
        "{:<24} {:<16} {}  {}  [{} comments]",
        opinion.id,
        tally(&opinion.votes, viewer),
        opinion.author_name(),
        opinion.content,
        opinion.comment_count
    )
}

pub fn opinion_detail(opinion: &Opinion, viewer: Option<&UserId>) -> String {
    let posted = opinion
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown date".into());
    format!(
        "{}\n  by {} on {}\n  {}\n  votes {}",
        opinion.content,
        opinion.author_name(),
        posted,
        opinion.id,
        tally(&opinion.votes, viewer)
    )
}

pub fn comment_line(comment: &Comment, viewer: Option<&UserId>) -> String {
    format!(
        "  {:<24} {:<16} {}: {}",
        comment.id,
        tally(&comment.votes, viewer),
        comment.author_name(),
        comment.content
    )
}

pub fn session_line(state: &SessionState) -> String {
    match state {
        SessionState::Authenticated(user) => {
            format!("{} <{}> ({})", user.display_name(), user.email, user.id)
        }
        SessionState::Verifying => "session not yet verified".into(),
        SessionState::Unknown | SessionState::Anonymous => "not logged in".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opine_types::models::OpinionId;

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter().map(|u| UserId::from(*u)).collect()
    }

    fn opinion() -> Opinion {
        Opinion {
            id: OpinionId::from("o1"),
            author: None,
            content: "tabs".into(),
            votes: VoteSets::new(ids(&["u1", "u2"]), ids(&["u3"])),
            comment_count: 2,
            created_at: None,
        }
    }

    #[test]
    fn marks_the_viewers_vote() {
        let o = opinion();
        assert!(opinion_line(&o, Some(&"u1".into())).contains("^+1 (+2/-1)"));
        assert!(opinion_line(&o, Some(&"u3".into())).contains("v+1 (+2/-1)"));
        assert!(opinion_line(&o, None).contains(" +1 (+2/-1)"));
    }

    #[test]
    fn detail_without_date() {
        let text = opinion_detail(&opinion(), None);
        assert!(text.starts_with("tabs\n  by Anonymous on unknown date"));
    }

    #[test]
    fn anonymous_session() {
        assert_eq!(session_line(&SessionState::Anonymous), "not logged in");
    }
}
