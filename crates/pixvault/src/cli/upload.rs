//! The `pixvault upload` command: files or directories, walked recursively.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use pixvault_core::pipeline::FileDiscovery;
use pixvault_core::types::parse_tag_list;
use pixvault_core::{DiscoveredFile, UploadReceipt, UploadRequest};

use super::{print_json, Session};

/// Arguments for the `upload` command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Image files or directories to upload
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Comma-separated custom tags applied to every upload
    #[arg(long, default_value = "")]
    pub tags: String,
}

/// Execute the upload command.
pub fn execute(session: &Session, args: UploadArgs) -> anyhow::Result<()> {
    let mut library = session.library()?;
    let discovery = FileDiscovery::new(library.config().upload.clone());
    let tags = parse_tag_list(&args.tags);

    let files: Vec<DiscoveredFile> = args
        .paths
        .iter()
        .flat_map(|path| discovery.discover(path))
        .collect();
    if files.is_empty() {
        anyhow::bail!("No uploadable images found");
    }

    let total_bytes = FileDiscovery::total_size(&files);
    tracing::info!(
        "Uploading {} files ({:.1} MB)",
        files.len(),
        total_bytes as f64 / 1_048_576.0
    );

    let progress = create_progress_bar(files.len() as u64);
    let start = Instant::now();
    let mut receipts: Vec<UploadReceipt> = Vec::with_capacity(files.len());
    let mut failed = 0usize;

    for file in &files {
        let filename = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = std::fs::read(&file.path)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| {
                let request = UploadRequest {
                    filename,
                    bytes,
                    mime_type: None,
                    declared_size: Some(file.size),
                    tags: tags.clone(),
                };
                Ok(library.upload(session.principal(), request)?)
            });

        match result {
            Ok(receipt) => receipts.push(receipt),
            Err(e) => {
                failed += 1;
                progress.suspend(|| tracing::error!("Failed to upload {:?}: {}", file.path, e));
            }
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    tracing::info!(
        "Uploaded {} of {} files in {:.1}s",
        receipts.len(),
        files.len(),
        start.elapsed().as_secs_f64()
    );
    print_json(&receipts)?;

    if failed > 0 {
        anyhow::bail!("{failed} of {} uploads failed", files.len());
    }
    Ok(())
}

/// Create a progress bar for batch uploads.
fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}
