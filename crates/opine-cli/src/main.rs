mod render;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use opine_client::Client;
use opine_client::cache::EntityRef;
use opine_client::config::ClientConfig;
use opine_client::http::HttpFetcher;
use opine_client::votes::{VoteError, VoteOutcome};
use opine_types::models::{CommentId, FullName, OpinionId, VoteDirection};

#[derive(Parser)]
#[command(name = "opine")]
#[command(about = "Read, post and vote on opinions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and remember the session
    Login {
        email: String,

        #[arg(long, env = "OPINE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account (log in separately afterwards)
    Register {
        firstname: String,
        lastname: String,
        email: String,

        #[arg(long, env = "OPINE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show who the stored session belongs to
    Whoami,

    /// List the opinion feed
    Feed,

    /// Show one opinion with its comments
    Show { opinion: String },

    /// Publish a new opinion
    Post { content: String },

    /// Comment on an opinion
    Comment { opinion: String, content: String },

    /// Toggle your vote on an opinion or comment
    Vote {
        #[command(subcommand)]
        target: VoteTarget,
    },
}

#[derive(Subcommand)]
enum VoteTarget {
    Opinion {
        id: String,
        direction: Direction,
    },
    Comment {
        /// Opinion the comment belongs to
        opinion: String,
        id: String,
        direction: Direction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for VoteDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Up => VoteDirection::Up,
            Direction::Down => VoteDirection::Down,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opine=warn,opine_client=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::from_env()?;
    debug!(
        api_url = %config.api_url,
        credential = %config.credential_path.display(),
        "Config loaded"
    );
    let client = Client::from_config(&config)?;

    client.session().restore_credential();
    let state = client.session().verify().await;
    debug!(?state, "Session ready");

    run(&client, cli.command).await
}

async fn run(client: &Client<HttpFetcher>, command: Command) -> anyhow::Result<()> {
    let session = client.session();
    let board = client.board();
    let viewer = session.current_user().map(|u| u.id);

    match command {
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            println!("Logged in as {}", user.display_name());
        }
        Command::Register {
            firstname,
            lastname,
            email,
            password,
        } => {
            session
                .register(&FullName::new(firstname, lastname), &email, &password)
                .await?;
            println!("Registered {}. Log in with `opine login {}`.", email, email);
        }
        Command::Logout => {
            session.logout().await;
            println!("Logged out");
        }
        Command::Whoami => {
            println!("{}", render::session_line(&session.state()));
        }
        Command::Feed => {
            let feed = board.refresh_feed().await?;
            if feed.is_empty() {
                println!("No opinions yet.");
            }
            for opinion in &feed {
                println!("{}", render::opinion_line(opinion, viewer.as_ref()));
            }
        }
        Command::Show { opinion } => {
            let (opinion, comments) = board.open_opinion(&OpinionId::from(opinion)).await?;
            println!("{}", render::opinion_detail(&opinion, viewer.as_ref()));
            println!();
            if comments.is_empty() {
                println!("  No comments yet.");
            }
            for comment in &comments {
                println!("{}", render::comment_line(comment, viewer.as_ref()));
            }
        }
        Command::Post { content } => {
            board.create_opinion(&content).await?;
            println!("Posted.");
        }
        Command::Comment { opinion, content } => {
            let id = OpinionId::from(opinion);
            board.post_comment(&id, &content).await?;
            let count = client.cache().opinion(&id).map_or(0, |o| o.comment_count);
            println!("Comment added ({} total).", count);
        }
        Command::Vote { target } => vote(client, target).await?,
    }
    Ok(())
}

async fn vote(client: &Client<HttpFetcher>, target: VoteTarget) -> anyhow::Result<()> {
    // Votes only apply to cached entities, so load the thread first.
    let (target, direction) = match target {
        VoteTarget::Opinion { id, direction } => {
            let id = OpinionId::from(id);
            client.board().open_opinion(&id).await?;
            (EntityRef::Opinion(id), direction)
        }
        VoteTarget::Comment {
            opinion,
            id,
            direction,
        } => {
            client
                .board()
                .open_opinion(&OpinionId::from(opinion))
                .await?;
            (EntityRef::Comment(CommentId::from(id)), direction)
        }
    };

    match client.votes().toggle(&target, direction.into()).await {
        Ok(VoteOutcome::Applied(votes)) => {
            println!("Voted on {}: score {:+}", target, votes.score());
            Ok(())
        }
        Ok(VoteOutcome::Missing) => bail!("{} not found", target),
        Err(VoteError::Unauthorized) => bail!("Log in to vote (`opine login <email>`)"),
        Err(e) => Err(e).with_context(|| format!("Vote on {} did not go through", target)),
    }
}
