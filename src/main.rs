//! # Snippy CLI (`snippy`)
//!
//! ```bash
//! snippy --config ./config/snippy.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `snippy init` | Create the SQLite database and apply the schema |
//! | `snippy save <name> --file f.rs` | Embed and store a snippet |
//! | `snippy get <name>` | Print a snippet |
//! | `snippy list` | List snippet names in a project |
//! | `snippy search "<query>"` | Similarity search within a project |
//! | `snippy wiki` | Generate a project wiki via the agent service |
//! | `snippy style-guide` | Generate a code style guide via the agent service |
//! | `snippy tools` | Print the declared tool schemas |
//! | `snippy serve` | Start the HTTP + MCP server |
//!
//! Logs go to stderr; set `RUST_LOG` to change verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use snippy::authoring::DocumentKind;
use snippy::{cli, config, migrate, server};

#[derive(Parser)]
#[command(
    name = "snippy",
    about = "Snippy — a code-snippet manager for AI tools",
    version,
    long_about = "Snippy stores named code snippets per project with vector embeddings, \
    answers similarity searches, exposes its operations as HTTP and MCP tools, and drives \
    an external agent service to write project wikis and style guides."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/snippy.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Save a snippet, replacing any snippet with the same name in the project.
    Save {
        /// Snippet name.
        name: String,
        /// Project id (defaults to `default-project`).
        #[arg(long)]
        project: Option<String>,
        /// Snippet text given inline.
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// Read the snippet text from a file.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print a snippet by name.
    Get {
        name: String,
        #[arg(long)]
        project: Option<String>,
    },

    /// List snippet names in a project, newest first.
    List {
        #[arg(long)]
        project: Option<String>,
    },

    /// Find the snippets most similar to a query.
    Search {
        query: String,
        #[arg(long)]
        project: Option<String>,
        /// Maximum number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Generate a Markdown wiki for a project.
    Wiki {
        #[arg(long)]
        project: Option<String>,
    },

    /// Generate a code style guide for a project.
    StyleGuide {
        #[arg(long)]
        project: Option<String>,
        /// Topic the guide should emphasise.
        #[arg(long)]
        focus: Option<String>,
    },

    /// Print the declared tools and their argument schemas.
    Tools,

    /// Start the HTTP and MCP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snippy=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Tools = cli.command {
        return cli::run_tools();
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Save {
            name,
            project,
            content,
            file,
        } => {
            cli::run_save(&cfg, &name, project, content, file.as_deref()).await?;
        }
        Commands::Get { name, project } => {
            cli::run_get(&cfg, &name, project).await?;
        }
        Commands::List { project } => {
            cli::run_list(&cfg, project).await?;
        }
        Commands::Search { query, project, k } => {
            cli::run_search(&cfg, &query, project, k).await?;
        }
        Commands::Wiki { project } => {
            cli::run_author(&cfg, DocumentKind::Wiki, project, None).await?;
        }
        Commands::StyleGuide { project, focus } => {
            cli::run_author(&cfg, DocumentKind::StyleGuide, project, focus).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Tools => unreachable!("handled before config loading"),
    }

    Ok(())
}
