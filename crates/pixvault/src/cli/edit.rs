//! The `pixvault edit` command: persisted crop/hue edits and previews.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use pixvault_core::{CropRequest, EditRequest, HueRequest};
use serde_json::json;

use super::{print_json, Session};

/// Arguments for the `edit` command.
#[derive(Args, Debug)]
pub struct EditArgs {
    #[command(subcommand)]
    pub command: EditCommand,
}

/// Crop margins as percentages of each edge.
#[derive(Args, Debug, Clone, Copy)]
pub struct CropMargins {
    #[arg(long, default_value = "0")]
    pub top: f64,
    #[arg(long, default_value = "0")]
    pub bottom: f64,
    #[arg(long, default_value = "0")]
    pub left: f64,
    #[arg(long, default_value = "0")]
    pub right: f64,
}

impl From<CropMargins> for CropRequest {
    fn from(m: CropMargins) -> Self {
        CropRequest {
            top: m.top,
            bottom: m.bottom,
            left: m.left,
            right: m.right,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum EditCommand {
    /// Crop the stored image (a backup is kept)
    Crop {
        id: i64,
        #[command(flatten)]
        margins: CropMargins,
    },

    /// Rotate the hue of the stored image (a backup is kept)
    Hue {
        id: i64,
        /// Degrees in [-180, 180]
        #[arg(long, allow_hyphen_values = true)]
        delta: f64,
    },

    /// Write a cropped PNG preview without touching the stored image
    PreviewCrop {
        id: i64,
        #[command(flatten)]
        margins: CropMargins,
        /// Where to write the PNG
        #[arg(long)]
        out: PathBuf,
    },

    /// Write a hue-shifted PNG preview without touching the stored image
    PreviewHue {
        id: i64,
        #[arg(long, allow_hyphen_values = true)]
        delta: f64,
        #[arg(long)]
        out: PathBuf,
    },
}

/// Execute the edit command.
pub fn execute(session: &Session, args: EditArgs) -> anyhow::Result<()> {
    let mut library = session.library()?;
    let principal = session.principal();

    match args.command {
        EditCommand::Crop { id, margins } => {
            print_json(&library.crop(principal, id, &margins.into())?)
        }
        EditCommand::Hue { id, delta } => {
            print_json(&library.adjust_hue(principal, id, &HueRequest { delta })?)
        }
        EditCommand::PreviewCrop { id, margins, out } => {
            let png = library.preview_edit(principal, id, &EditRequest::Crop(margins.into()))?;
            write_preview(id, &png, out)
        }
        EditCommand::PreviewHue { id, delta, out } => {
            let png = library.preview_edit(principal, id, &EditRequest::Hue(HueRequest { delta }))?;
            write_preview(id, &png, out)
        }
    }
}

fn write_preview(id: i64, png: &[u8], out: PathBuf) -> anyhow::Result<()> {
    std::fs::write(&out, png)?;
    tracing::info!("Preview written to {}", out.display());
    print_json(&json!({ "id": id, "preview": out, "size_bytes": png.len() }))
}
