//! Read and bookkeeping commands: show, list, thumbnail, tags, delete,
//! restore, favorites and public-link resolution.

use clap::{Args, Subcommand, ValueEnum};
use pixvault_core::types::parse_tag_list;
use pixvault_core::{ListQuery, TagMode};
use serde_json::json;

use super::{print_json, Session};

/// How `--tags` must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Image carries every tag
    All,
    /// Image carries at least one tag
    Any,
}

impl From<ModeArg> for TagMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::All => TagMode::All,
            ModeArg::Any => TagMode::Any,
        }
    }
}

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Comma-separated tag names to filter by
    #[arg(long)]
    pub tags: Option<String>,

    /// Tag match mode
    #[arg(long, value_enum, default_value = "all")]
    pub mode: ModeArg,

    /// 1-based page number
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Page size (capped by the configured page size)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Include soft-deleted images (admins only)
    #[arg(long)]
    pub include_deleted: bool,
}

/// Arguments for the `tags` command.
#[derive(Args, Debug)]
pub struct TagsArgs {
    #[command(subcommand)]
    pub command: TagsCommand,
}

#[derive(Subcommand, Debug)]
pub enum TagsCommand {
    /// List every tag name in the library
    List,

    /// Replace an image's custom tags
    Set {
        id: i64,
        /// Comma-separated tag names (empty clears them)
        tags: String,
    },
}

pub fn show(session: &Session, id: i64) -> anyhow::Result<()> {
    let mut library = session.library()?;
    print_json(&library.image_detail(session.principal(), id)?)
}

pub fn list(session: &Session, args: ListArgs) -> anyhow::Result<()> {
    let mut library = session.library()?;
    let query = ListQuery {
        page: args.page,
        page_size: args.page_size,
        tags: args.tags.as_deref().map(parse_tag_list).unwrap_or_default(),
        tag_mode: args.mode.into(),
        include_deleted: args.include_deleted,
    };
    print_json(&library.list_images(session.principal(), &query)?)
}

pub fn thumbnail(session: &Session, id: i64) -> anyhow::Result<()> {
    let mut library = session.library()?;
    print_json(&library.thumbnail(session.principal(), id)?)
}

pub fn tags(session: &Session, args: TagsArgs) -> anyhow::Result<()> {
    let mut library = session.library()?;
    match args.command {
        TagsCommand::List => print_json(&json!({ "items": library.tag_names()? })),
        TagsCommand::Set { id, tags } => {
            let names = library.replace_custom_tags(session.principal(), id, &parse_tag_list(&tags))?;
            print_json(&json!({ "id": id, "tags": names }))
        }
    }
}

pub fn delete(session: &Session, id: i64) -> anyhow::Result<()> {
    let mut library = session.library()?;
    library.delete(session.principal(), id)?;
    print_json(&json!({ "id": id, "is_deleted": true }))
}

pub fn restore(session: &Session, id: i64) -> anyhow::Result<()> {
    let mut library = session.library()?;
    library.restore(session.principal(), id)?;
    print_json(&json!({ "id": id, "is_deleted": false }))
}

pub fn favorite(session: &Session, id: i64, favorite: bool) -> anyhow::Result<()> {
    let mut library = session.library()?;
    library.set_favorite(session.principal(), id, favorite)?;
    print_json(&json!({ "id": id, "is_favorite": favorite }))
}

pub fn favorites(session: &Session) -> anyhow::Result<()> {
    let mut library = session.library()?;
    print_json(&library.list_favorites(session.principal())?)
}

pub fn resolve(session: &Session, year: u32, month: u32, day: u32, filename: &str) -> anyhow::Result<()> {
    let library = session.library()?;
    let path = library.public_file(year, month, day, filename)?;
    print_json(&json!({ "path": path }))
}
