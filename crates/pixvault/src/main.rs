//! Pixvault CLI - command-line front end for the Pixvault image library.
//!
//! Every invocation acts as one principal (`--user-id`, `--role`) and runs
//! one unit of work against the library named by the configuration file.
//! Results are printed as JSON on stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Upload a directory of photos with custom tags
//! pixvault upload ./photos --tags holiday,beach
//!
//! # List images carrying both tags
//! pixvault list --tags cat,outdoor --mode all
//!
//! # Crop 10% off every edge
//! pixvault edit crop 42 --top 10 --bottom 10 --left 10 --right 10
//!
//! # Free-text search
//! pixvault search "cats playing in the garden"
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

use cli::{RoleArg, Session};

/// Pixvault - image library with thumbnails, edits and tag search.
#[derive(Parser, Debug)]
#[command(name = "pixvault")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "PIXVAULT_CONFIG")]
    config: Option<String>,

    /// Id of the acting user
    #[arg(long, global = true, env = "PIXVAULT_USER_ID", default_value = "1")]
    user_id: i64,

    /// Role of the acting user
    #[arg(long, global = true, value_enum, default_value = "user")]
    role: RoleArg,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload image files or directories
    Upload(cli::upload::UploadArgs),

    /// Show the full detail of one image
    Show { id: i64 },

    /// List images, optionally filtered by tags
    List(cli::images::ListArgs),

    /// Print an image's thumbnail payload
    Thumbnail { id: i64 },

    /// List or replace tags
    Tags(cli::images::TagsArgs),

    /// Crop or hue-shift an image, or preview either
    Edit(cli::edit::EditArgs),

    /// Soft-delete an image
    Delete { id: i64 },

    /// Restore a soft-deleted image
    Restore { id: i64 },

    /// Mark an image as a favorite
    Favorite {
        id: i64,
        /// Clear the favorite flag instead
        #[arg(long)]
        off: bool,
    },

    /// List favorite images
    Favorites,

    /// Find images matching a free-text description
    Search {
        /// What to look for
        query: String,
    },

    /// Tag an image with the vision model, replacing earlier AI tags
    Analyze { id: i64 },

    /// Show an image's AI tags
    AiTags { id: i64 },

    /// Resolve a public `YYYY/MM/DD/<file>` link to a local path
    Resolve {
        year: u32,
        month: u32,
        day: u32,
        filename: String,
    },

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let session = Session::new(cli.config.as_deref(), cli.user_id, cli.role.into());

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match session.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `pixvault config path`."
            );
            pixvault_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Pixvault v{}", pixvault_core::VERSION);

    match cli.command {
        Commands::Upload(args) => cli::upload::execute(&session, args),
        Commands::Show { id } => cli::images::show(&session, id),
        Commands::List(args) => cli::images::list(&session, args),
        Commands::Thumbnail { id } => cli::images::thumbnail(&session, id),
        Commands::Tags(args) => cli::images::tags(&session, args),
        Commands::Edit(args) => cli::edit::execute(&session, args),
        Commands::Delete { id } => cli::images::delete(&session, id),
        Commands::Restore { id } => cli::images::restore(&session, id),
        Commands::Favorite { id, off } => cli::images::favorite(&session, id, !off),
        Commands::Favorites => cli::images::favorites(&session),
        Commands::Search { query } => cli::search::execute(&session, &query).await,
        Commands::Analyze { id } => cli::search::analyze(&session, id).await,
        Commands::AiTags { id } => cli::search::ai_tags(&session, id),
        Commands::Resolve {
            year,
            month,
            day,
            filename,
        } => cli::images::resolve(&session, year, month, day, &filename),
        Commands::Config(args) => cli::config::execute(&session, args),
    }
}
