use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

mod cli;
mod commit;
mod config;
mod index;
mod indexer;
mod llm;
mod mcp;
mod query;
mod repo;
mod risk;

#[derive(Parser)]
#[command(name = "repolens")]
#[command(version)]
#[command(about = "Function-level repository analyzer: index, context, commits, risk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a repository into the data directory
    Clone {
        /// Repository URL
        url: String,

        /// Branch to check out
        #[arg(short, long)]
        branch: Option<String>,

        /// Destination directory (defaults to <data_dir>/repos)
        #[arg(long)]
        dest: Option<String>,
    },

    /// Index a repository's Python sources
    Index {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: String,

        /// Drop and rebuild the entire index
        #[arg(long)]
        rebuild: bool,

        /// Watch for changes and re-index incrementally
        #[arg(short, long)]
        watch: bool,
    },

    /// Resolve a function's definition, callees, and callers
    Context {
        /// Function name
        function: String,

        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: String,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Explain a function with the configured LLM
    Explain {
        /// Function name
        function: String,

        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: String,
    },

    /// Score the modification risk of a function
    Risk {
        /// Function name
        function: String,

        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: String,

        /// Skip LLM classification and explanation
        #[arg(long)]
        no_llm: bool,

        /// Output format: json, text
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show index statistics
    Stats {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: String,

        /// Also print the repository file tree as JSON
        #[arg(short, long)]
        tree: bool,
    },

    /// Serve context queries over stdio JSON-RPC
    Serve {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        repo: String,
    },
}

fn init_logging(debug: bool, verbose: bool) {
    let level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug, cli.verbose);

    info!("repolens v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Clone { url, branch, dest } => {
            cli::clone::clone_repository(url, branch, dest).await?;
        }

        Commands::Index {
            repo,
            rebuild,
            watch,
        } => {
            cli::index::index_project(repo, rebuild, watch).await?;
        }

        Commands::Context {
            function,
            repo,
            format,
        } => {
            cli::context::show_context(function, repo, format).await?;
        }

        Commands::Explain { function, repo } => {
            cli::explain::explain_function(function, repo).await?;
        }

        Commands::Risk {
            function,
            repo,
            no_llm,
            format,
        } => {
            cli::risk::analyze_risk(function, repo, no_llm, format).await?;
        }

        Commands::Stats { repo, tree } => {
            cli::stats::show_stats(repo, tree).await?;
        }

        Commands::Serve { repo } => {
            cli::serve::serve_stdio(repo).await?;
        }
    }

    Ok(())
}
