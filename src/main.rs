use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use branchset::workspace::Workspace;
use branchset::{commands, Error};

#[derive(Parser)]
#[command(name = "bset")]
#[command(about = "Feature branch sets for multi-project manifest workspaces")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new feature
    Create {
        /// Feature name
        name: String,

        /// Default branch for the feature (defaults to the feature name)
        #[arg(short, long)]
        branch: Option<String>,

        /// Select the feature immediately
        #[arg(short, long)]
        active: bool,
    },
    /// Add a project to a feature
    Add {
        /// Project path (absolute, or relative to the current directory)
        path: PathBuf,

        /// Feature to add to (defaults to the active feature)
        #[arg(short, long)]
        feature: Option<String>,

        /// Branch override for this project
        #[arg(short, long, conflicts_with = "adopt")]
        branch: Option<String>,

        /// Check out this existing branch instead of creating one
        #[arg(long)]
        adopt: Option<String>,
    },
    /// Remove a project from a feature
    Remove {
        /// Project path (absolute, or relative to the current directory)
        path: PathBuf,

        /// Feature to remove from (defaults to the active feature)
        #[arg(short, long)]
        feature: Option<String>,

        /// Also delete the project's feature branch
        #[arg(long)]
        delete_branch: bool,
    },
    /// Delete a feature
    Delete {
        /// Feature name
        name: String,

        /// Also delete each project's feature branch
        #[arg(long)]
        delete_branches: bool,
    },
    /// Make a feature active and check out its branches
    Select {
        /// Feature name
        feature: String,
    },
    /// Clear the active feature
    Clear,
    /// List all features
    List {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a feature's projects and effective branches
    Show {
        /// Feature to show (defaults to the active feature)
        #[arg(short, long)]
        feature: Option<String>,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
    /// Check out a feature's branches without changing the active feature
    Checkout {
        /// Feature to check out (defaults to the active feature)
        #[arg(short, long)]
        feature: Option<String>,
    },
    /// Return the active feature's projects to their default revisions
    Reset,
    /// Show work tree status for the active feature's projects
    Status,
    /// Spawn a shell with the active feature in the environment
    Shell {
        /// Run this command instead of $SHELL
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        command: Option<Vec<String>>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "branchset=warn".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<i32, Error> {
    let cwd = std::env::current_dir()?;
    let workspace = Workspace::discover(&cwd)?;

    match cli.command {
        Commands::Create {
            name,
            branch,
            active,
        } => commands::create(&workspace, &name, branch.as_deref(), active)?,
        Commands::Add {
            path,
            feature,
            branch,
            adopt,
        } => commands::add(
            &workspace,
            &workspace,
            &path,
            feature.as_deref(),
            branch.as_deref(),
            adopt.as_deref(),
        )?,
        Commands::Remove {
            path,
            feature,
            delete_branch,
        } => commands::remove(
            &workspace,
            &workspace,
            &path,
            feature.as_deref(),
            delete_branch,
        )?,
        Commands::Delete {
            name,
            delete_branches,
        } => commands::delete(&workspace, &workspace, &name, delete_branches)?,
        Commands::Select { feature } => commands::select(&workspace, &workspace, &feature)?,
        Commands::Clear => commands::clear(&workspace)?,
        Commands::List { json } => commands::list(&workspace, json)?,
        Commands::Show { feature, json } => commands::show(&workspace, feature.as_deref(), json)?,
        Commands::Checkout { feature } => {
            commands::checkout(&workspace, &workspace, feature.as_deref())?
        }
        Commands::Reset => commands::reset(&workspace, &workspace)?,
        Commands::Status => commands::status(&workspace, &workspace)?,
        Commands::Shell { command } => {
            return Ok(commands::shell(&workspace, command.as_deref())?);
        }
    }
    Ok(0)
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
