//! CLI entry and dispatch.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use quill_core::api::ApiClient;
use quill_core::auth::session::Session;
use quill_core::auth::tokens::TokenStore;
use quill_core::config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

#[derive(Parser)]
#[command(name = "quill")]
#[command(version = "0.1")]
#[command(about = "Terminal client for the Quill article service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the article service base URL
    #[arg(long, value_name = "URL", global = true)]
    api_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in with an existing account
    Login {
        /// Account email (prompted for when omitted)
        #[arg(long)]
        email: Option<String>,

        /// Account password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Register {
        /// Account email (prompted for when omitted)
        #[arg(long)]
        email: Option<String>,

        /// Account password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Optional display name
        #[arg(long = "full-name", value_name = "NAME")]
        full_name: Option<String>,
    },

    /// Sign out (clear the stored tokens)
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Browse and publish articles
    Articles {
        #[command(subcommand)]
        command: ArticleCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ArticleCommands {
    /// List the latest articles
    List,
    /// Search articles by title or content
    Search {
        /// Search term
        #[arg(value_name = "QUERY")]
        query: String,
    },
    /// Show one article in full
    Show {
        /// The ID of the article to show
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Publish a new article
    Publish {
        /// Article title
        #[arg(long)]
        title: String,

        /// Article body
        #[arg(long)]
        content: String,
    },
    /// Delete an article
    Delete {
        /// The ID of the article to delete
        #[arg(value_name = "ID")]
        id: i64,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    // Config commands need no client or network.
    if let Commands::Config { command } = &cli.command {
        match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init()?,
        }
        return Ok(());
    }

    let config = Config::load().context("load config")?;
    let base_url = config.effective_api_url(cli.api_url.as_deref())?;

    let tokens = Arc::new(TokenStore::open().context("open token store")?);
    let client = Arc::new(ApiClient::new(&base_url, Arc::clone(&tokens)));
    let mut session = Session::new(Arc::clone(&client));

    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(&mut session, email, password).await
        }
        Commands::Register {
            email,
            password,
            full_name,
        } => commands::auth::register(&mut session, email, password, full_name).await,
        Commands::Logout => commands::auth::logout(&mut session, &tokens),
        Commands::Whoami => commands::auth::whoami(&mut session).await,
        Commands::Articles { command } => match command {
            ArticleCommands::List => commands::articles::list(&client).await,
            ArticleCommands::Search { query } => commands::articles::search(&client, &query).await,
            ArticleCommands::Show { id } => commands::articles::show(&client, id).await,
            ArticleCommands::Publish { title, content } => {
                commands::articles::publish(&client, &title, &content).await
            }
            ArticleCommands::Delete { id, yes } => {
                commands::articles::delete(&client, id, yes).await
            }
        },
        Commands::Config { .. } => unreachable!("handled above"),
    }
}
