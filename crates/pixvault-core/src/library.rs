//! The library service: wires storage, the catalog and the image pipeline
//! into the operations a transport layer exposes.
//!
//! Every operation checks the principal first, then runs as one catalog
//! transaction that commits on success and rolls back when dropped on error.
//! Operations take `&mut self`, so a process never interleaves two units of
//! work and edits against the same file are serialized.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::access::{require_member, require_owner, require_visible};
use crate::config::Config;
use crate::db::ranking::{self, normalize_names};
use crate::db::{
    CaptureTimeRecord, CatalogDb, DbHandle, DimensionsRecord, ExifEntryRecord, ImageRecord,
    LocationRecord, TagFilter, TagRecord, ThumbnailRecord, Visibility,
};
use crate::error::{PixvaultError, Result};
use crate::llm::{ImageInput, ImageTagger, TagResolver};
use crate::pipeline::decode::format_mime_type;
use crate::pipeline::{edit, Hasher, ImageDecoder, MetadataExtractor, ThumbnailSynthesizer, UploadValidator};
use crate::storage::{compose_relpath, ensure_parent, AllocatedPath, StorageLayout};
use crate::types::{
    AiSearchResult, AiTagsView, AnalysisStatus, CropRequest, EditRequest, HueRequest,
    ImageDetail, ImageSummary, ListQuery, Page, Principal, TagSource, ThumbnailPayload,
    ThumbnailRef, UploadReceipt, UploadRequest,
};

/// Everything an operation needs besides the catalog connection.
struct Context {
    config: Config,
    layout: StorageLayout,
    validator: UploadValidator,
    thumbnails: ThumbnailSynthesizer,
}

/// Image library backed by a storage root and a SQLite catalog.
pub struct Library {
    db: CatalogDb,
    ctx: Context,
    resolver: Option<TagResolver>,
    tagger: Option<ImageTagger>,
}

impl Library {
    /// Open the catalog named in `config` and build the pipeline around it.
    pub fn open(config: Config) -> Result<Self> {
        let db = CatalogDb::open(&config.database_path())?;
        Self::with_catalog(config, db)
    }

    /// Use an already-open catalog (an in-memory one in tests).
    pub fn with_catalog(config: Config, db: CatalogDb) -> Result<Self> {
        let ctx = Context {
            layout: StorageLayout::new(config.storage_root(), config.backup_root()),
            validator: UploadValidator::new(config.upload.clone()),
            thumbnails: ThumbnailSynthesizer::new(config.thumbnail.clone())?,
            config,
        };
        Ok(Self {
            db,
            ctx,
            resolver: None,
            tagger: None,
        })
    }

    /// Route free-text search through `resolver` instead of the configured provider.
    pub fn with_tag_resolver(mut self, resolver: TagResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Route image analysis through `tagger` instead of the configured provider.
    pub fn with_image_tagger(mut self, tagger: ImageTagger) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.ctx.layout
    }

    pub fn catalog(&self) -> &CatalogDb {
        &self.db
    }

    /// Link under which a stored file is served publicly.
    pub fn public_url(&self, storage_relpath: &str) -> String {
        self.ctx.public_url(storage_relpath)
    }

    // === Ingestion ===

    /// Validate, store and catalog one uploaded file.
    ///
    /// The file is written before it is verified; if verification or the
    /// catalog insert fails, it is deleted again before the error returns.
    pub fn upload(&mut self, principal: &Principal, request: UploadRequest) -> Result<UploadReceipt> {
        require_member(principal)?;

        let validator = &self.ctx.validator;
        let ext = validator.check_extension(&request.filename)?;
        if let Some(declared) = request.declared_size {
            validator.check_size(declared)?;
        }
        validator.check_magic_bytes(&request.bytes)?;

        let allocated = self.ctx.layout.allocate(&ext)?;
        ensure_parent(&allocated.absolute)?;

        store_upload(&allocated.absolute, &request.bytes, || {
            self.ingest(principal, &request, &ext, &allocated)
        })
    }

    fn ingest(
        &mut self,
        principal: &Principal,
        request: &UploadRequest,
        ext: &str,
        allocated: &AllocatedPath,
    ) -> Result<UploadReceipt> {
        let size_bytes = std::fs::metadata(&allocated.absolute)?.len();
        self.ctx.validator.check_size(size_bytes)?;

        let (bytes, decoded) = ImageDecoder::open(&allocated.absolute).map_err(|e| match e {
            PixvaultError::Image(err) => {
                PixvaultError::UnsupportedMediaType(format!("invalid image: {err}"))
            }
            other => other,
        })?;
        debug!("Verified {}x{} {:?}", decoded.width, decoded.height, decoded.format);

        let metadata = MetadataExtractor::extract(&bytes);
        debug!(
            "Extracted {} EXIF entries, {} vocabulary tags",
            metadata.entries.len(),
            metadata.vocabulary.len()
        );
        let thumbnail = self.ctx.thumbnails.synthesize(&decoded.image)?;

        let now = Utc::now();
        let record = ImageRecord {
            id: 0,
            owner_id: principal.id,
            original_filename: Some(request.filename.clone()),
            ext: ext.to_string(),
            hash: allocated.token.clone(),
            storage_relpath: allocated.relpath.clone(),
            size_bytes,
            mime_type: request
                .mime_type
                .clone()
                .or_else(|| format_mime_type(decoded.format).map(String::from)),
            content_digest: Some(Hasher::content_hash_from_bytes(&bytes)),
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
            is_favorite: false,
        };

        let tx = self.db.transaction()?;
        let id = record.insert(&tx)?;
        DimensionsRecord {
            image_id: id,
            width: decoded.width,
            height: decoded.height,
        }
        .upsert(&tx)?;
        let capture = metadata.capture_time.unwrap_or_default();
        CaptureTimeRecord {
            image_id: id,
            taken_at: capture.taken_at,
            taken_at_raw: capture.taken_at_raw,
        }
        .upsert(&tx)?;
        LocationRecord::from_location(id, &metadata.location).upsert(&tx)?;
        ExifEntryRecord::replace_all(&tx, id, &metadata.entries)?;
        TagRecord::attach_names(&tx, id, &metadata.vocabulary, TagSource::Exif, now)?;
        TagRecord::attach_names(&tx, id, &normalize_names(&request.tags), TagSource::Custom, now)?;
        ThumbnailRecord::from_payload(id, &thumbnail, now).upsert(&tx)?;
        tx.commit()?;

        info!(
            image_id = id,
            owner_id = principal.id,
            size_bytes,
            "Uploaded {} as {}",
            request.filename,
            allocated.relpath
        );
        Ok(UploadReceipt {
            id,
            public_url: self.ctx.public_url(&allocated.relpath),
            storage_relpath: allocated.relpath.clone(),
        })
    }

    // === Reads ===

    /// Full view of one image. Deleted images are visible to their owner only.
    pub fn image_detail(&mut self, principal: &Principal, id: i64) -> Result<ImageDetail> {
        require_member(principal)?;
        let tx = self.db.transaction()?;
        let image = load_image(&tx, id)?;
        require_visible(principal, &image)?;
        let detail = self.ctx.detail(&tx, image)?;
        tx.commit()?;
        Ok(detail)
    }

    /// One page of images matching the query's exact tag filter.
    pub fn list_images(&mut self, principal: &Principal, query: &ListQuery) -> Result<Page<ImageSummary>> {
        require_member(principal)?;

        let max_size = self.ctx.config.pagination.page_size.max(1);
        let page_size = query.page_size.filter(|&n| n > 0).unwrap_or(max_size).min(max_size);
        let page = query.page.max(1);
        let visibility = if query.include_deleted && principal.is_admin() {
            Visibility::All
        } else {
            Visibility::Active
        };
        let filter = TagFilter {
            names: query.tags.clone(),
            mode: query.tag_mode,
            visibility,
            limit: page_size,
            offset: u64::from(page - 1) * u64::from(page_size),
        };

        let tx = self.db.transaction()?;
        let (total, images) = ranking::filter_images(&tx, &filter)?;
        let items = images
            .iter()
            .map(|image| self.ctx.summary(&tx, image))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;

        Ok(Page {
            page,
            page_size,
            total,
            items,
        })
    }

    /// Non-deleted favorites, newest first.
    pub fn list_favorites(&mut self, principal: &Principal) -> Result<Vec<ImageSummary>> {
        require_member(principal)?;
        let tx = self.db.transaction()?;
        let items = ImageRecord::list_favorites(&tx)?
            .iter()
            .map(|image| self.ctx.summary(&tx, image))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(items)
    }

    /// The cached thumbnail, synthesized and stored on first read.
    pub fn thumbnail(&mut self, principal: &Principal, id: i64) -> Result<ThumbnailPayload> {
        require_member(principal)?;
        let tx = self.db.transaction()?;
        let image = load_image(&tx, id)?;
        require_visible(principal, &image)?;
        let payload = self.ctx.thumbnail_for(&tx, &image)?;
        tx.commit()?;
        Ok(payload)
    }

    /// Absolute path of the stored original.
    pub fn file_path(&mut self, principal: &Principal, id: i64) -> Result<PathBuf> {
        require_member(principal)?;
        let image = load_image(&self.db, id)?;
        require_visible(principal, &image)?;
        self.ctx.existing_file(&image)
    }

    /// Resolve a public `YYYY/MM/DD/<file>` link without a principal.
    ///
    /// Deleted images and missing files both surface as `NotFound`.
    pub fn public_file(&self, year: u32, month: u32, day: u32, filename: &str) -> Result<PathBuf> {
        let relpath = compose_relpath(year, month, day, filename)
            .ok_or_else(|| PixvaultError::not_found("file not found"))?;
        match ImageRecord::find_by_relpath(&self.db, &relpath)? {
            Some(image) if !image.is_deleted => self.ctx.existing_file(&image),
            _ => Err(PixvaultError::not_found("file not found")),
        }
    }

    /// Distinct tag names across the whole catalog, alphabetical.
    pub fn tag_names(&self) -> Result<Vec<String>> {
        TagRecord::all_names(&self.db)
    }

    // === Mutations ===

    /// Replace the image's custom tags; camera and AI tags are kept.
    pub fn replace_custom_tags(
        &mut self,
        principal: &Principal,
        id: i64,
        tags: &[String],
    ) -> Result<Vec<String>> {
        require_member(principal)?;
        let tx = self.db.transaction()?;
        let image = load_image(&tx, id)?;
        require_owner(principal, &image)?;

        let names = normalize_names(tags);
        TagRecord::detach_source(&tx, id, TagSource::Custom)?;
        TagRecord::attach_names(&tx, id, &names, TagSource::Custom, Utc::now())?;
        let all = TagRecord::names_for_image(&tx, id)?;
        tx.commit()?;

        info!(image_id = id, "Replaced custom tags with {:?}", names);
        Ok(all)
    }

    /// Crop the stored original by percentage margins.
    pub fn crop(&mut self, principal: &Principal, id: i64, request: &CropRequest) -> Result<ImageDetail> {
        self.persist_edit(principal, id, &EditRequest::Crop(*request))
    }

    /// Rotate the hue of the stored original.
    pub fn adjust_hue(&mut self, principal: &Principal, id: i64, request: &HueRequest) -> Result<ImageDetail> {
        self.persist_edit(principal, id, &EditRequest::Hue(*request))
    }

    fn persist_edit(&mut self, principal: &Principal, id: i64, request: &EditRequest) -> Result<ImageDetail> {
        require_member(principal)?;
        edit::validate(request)?;

        let tx = self.db.transaction()?;
        let image = load_image(&tx, id)?;
        require_owner(principal, &image)?;

        let path = self.ctx.existing_file(&image)?;
        let (_, decoded) = ImageDecoder::open(&path)?;
        let edited = edit::apply(&decoded.image, request)?;

        let now = Utc::now();
        let backups = self.ctx.layout.backup_candidates(&image.hash, &image.ext, now);
        let committed = edit::commit_edit(&path, &backups, &edited, decoded.format)?;
        let digest = Hasher::content_hash(&path)?;

        DimensionsRecord {
            image_id: id,
            width: committed.width,
            height: committed.height,
        }
        .upsert(&tx)?;
        ImageRecord::update_file_stats(&tx, id, committed.size_bytes, Some(&digest), now)?;
        ThumbnailRecord::delete(&tx, id)?;
        let updated = load_image(&tx, id)?;
        let detail = self.ctx.detail(&tx, updated)?;
        tx.commit()?;

        info!(
            image_id = id,
            width = committed.width,
            height = committed.height,
            backup = %committed.backup.display(),
            "Applied {} edit",
            edit_mode(request)
        );
        Ok(detail)
    }

    /// Apply an edit to an in-memory copy and return it as PNG bytes.
    ///
    /// Neither the stored file nor the catalog is touched.
    pub fn preview_edit(&mut self, principal: &Principal, id: i64, request: &EditRequest) -> Result<Vec<u8>> {
        require_member(principal)?;
        edit::validate(request)?;

        let image = load_image(&self.db, id)?;
        require_owner(principal, &image)?;
        let path = self.ctx.existing_file(&image)?;
        let (_, decoded) = ImageDecoder::open(&path)?;
        let edited = edit::apply(&decoded.image, request)?;
        debug!(image_id = id, "Built {} preview", edit_mode(request));
        edit::encode_preview(&edited)
    }

    /// Soft-delete an image.
    pub fn delete(&mut self, principal: &Principal, id: i64) -> Result<()> {
        self.set_deleted(principal, id, true)
    }

    /// Undo a soft delete.
    pub fn restore(&mut self, principal: &Principal, id: i64) -> Result<()> {
        self.set_deleted(principal, id, false)
    }

    fn set_deleted(&mut self, principal: &Principal, id: i64, deleted: bool) -> Result<()> {
        require_member(principal)?;
        let tx = self.db.transaction()?;
        let image = load_image(&tx, id)?;
        require_owner(principal, &image)?;
        ImageRecord::set_deleted(&tx, id, deleted, Utc::now())?;
        tx.commit()?;
        info!(image_id = id, deleted, "Changed deletion state");
        Ok(())
    }

    pub fn set_favorite(&mut self, principal: &Principal, id: i64, favorite: bool) -> Result<()> {
        require_member(principal)?;
        let tx = self.db.transaction()?;
        let image = load_image(&tx, id)?;
        require_owner(principal, &image)?;
        ImageRecord::set_favorite(&tx, id, favorite, Utc::now())?;
        tx.commit()?;
        info!(image_id = id, favorite, "Changed favorite state");
        Ok(())
    }

    // === Free-text search ===

    /// Resolve `query` to catalog tags and rank images by tag overlap.
    pub async fn ai_search(&mut self, principal: &Principal, query: &str) -> Result<AiSearchResult> {
        require_member(principal)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(PixvaultError::validation("query is required"));
        }

        TagResolver::check_available(&self.ctx.config.ai)?;
        let vocabulary = TagRecord::all_names(&self.db)?;
        let configured;
        let resolver = match self.resolver.as_ref() {
            Some(resolver) => resolver,
            None => {
                configured = TagResolver::from_config(&self.ctx.config.ai)?;
                &configured
            }
        };
        let resolved = resolver.resolve(&vocabulary, query).await?;

        let tx = self.db.transaction()?;
        let matches = ranking::rank_by_overlap(&tx, &resolved.tags)?;
        let items = matches
            .iter()
            .map(|m| self.ctx.summary(&tx, &m.image))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;

        Ok(AiSearchResult {
            query: query.to_string(),
            tags: resolved.tags,
            ai_output: resolved.ai_output,
            items,
        })
    }

    // === Image analysis ===

    /// Ask the vision model for tags of one image and store them as AI tags,
    /// replacing any earlier AI tags. Owner only.
    pub async fn analyze(&mut self, principal: &Principal, id: i64) -> Result<AiTagsView> {
        require_member(principal)?;
        let image = load_image(&self.db, id)?;
        require_owner(principal, &image)?;
        TagResolver::check_available(&self.ctx.config.ai)?;

        let path = self.ctx.existing_file(&image)?;
        let input = {
            let (_, decoded) = ImageDecoder::open(&path)?;
            ImageInput::from_image(&decoded.image)?
        };

        let configured;
        let tagger = match self.tagger.as_ref() {
            Some(tagger) => tagger,
            None => {
                configured = ImageTagger::from_config(&self.ctx.config.ai)?;
                &configured
            }
        };
        let generated = tagger.tag(input).await?;

        let tx = self.db.transaction()?;
        // The row may have gone during the provider call.
        load_image(&tx, id)?;
        TagRecord::detach_source(&tx, id, TagSource::Ai)?;
        TagRecord::attach_names(&tx, id, &normalize_names(&generated), TagSource::Ai, Utc::now())?;
        let tags = TagRecord::names_for_source(&tx, id, TagSource::Ai)?;
        tx.commit()?;

        info!(image_id = id, "Stored AI tags {:?}", tags);
        Ok(ai_tags_view(id, tags))
    }

    /// The image's stored AI tags. Owner only.
    pub fn ai_tags(&mut self, principal: &Principal, id: i64) -> Result<AiTagsView> {
        require_member(principal)?;
        let image = load_image(&self.db, id)?;
        require_owner(principal, &image)?;
        let tags = TagRecord::names_for_source(&self.db, id, TagSource::Ai)?;
        Ok(ai_tags_view(id, tags))
    }
}

impl Context {
    fn public_url(&self, storage_relpath: &str) -> String {
        let base = self.config.links.public_base_url.trim_end_matches('/');
        format!("{base}/images/{storage_relpath}")
    }

    fn existing_file(&self, image: &ImageRecord) -> Result<PathBuf> {
        let path = self.layout.resolve(&image.storage_relpath);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PixvaultError::not_found(format!(
                "file for image {} not found",
                image.id
            )))
        }
    }

    fn thumbnail_for<H: DbHandle>(&self, db: &H, image: &ImageRecord) -> Result<ThumbnailPayload> {
        if let Some(cached) = ThumbnailRecord::load(db, image.id)? {
            return Ok(cached.to_payload());
        }
        let path = self.existing_file(image)?;
        let (_, decoded) = ImageDecoder::open(&path)?;
        let payload = self.thumbnails.synthesize(&decoded.image)?;
        ThumbnailRecord::from_payload(image.id, &payload, Utc::now()).upsert(db)?;
        debug!(image_id = image.id, "Cached new thumbnail");
        Ok(payload)
    }

    fn summary<H: DbHandle>(&self, db: &H, image: &ImageRecord) -> Result<ImageSummary> {
        let thumbnail = self.thumbnail_for(db, image)?;
        Ok(ImageSummary {
            id: image.id,
            created_at: image.created_at,
            thumbnail: ThumbnailRef {
                format: thumbnail.format,
                data: thumbnail.data,
            },
            tags: TagRecord::names_for_image(db, image.id)?,
            is_deleted: image.is_deleted,
            is_favorite: image.is_favorite,
            public_url: self.public_url(&image.storage_relpath),
        })
    }

    fn detail<H: DbHandle>(&self, db: &H, image: ImageRecord) -> Result<ImageDetail> {
        let id = image.id;
        Ok(ImageDetail {
            dimensions: DimensionsRecord::load(db, id)?.map(DimensionsRecord::to_view),
            capture_time: CaptureTimeRecord::load(db, id)?.map(CaptureTimeRecord::to_view),
            location: LocationRecord::load(db, id)?.map(LocationRecord::to_view),
            exif: ExifEntryRecord::load_for_image(db, id)?,
            tags: TagRecord::names_for_image(db, id)?,
            public_url: self.public_url(&image.storage_relpath),
            id,
            owner_id: image.owner_id,
            storage_relpath: image.storage_relpath,
            original_filename: image.original_filename,
            size_bytes: image.size_bytes,
            mime_type: image.mime_type,
            content_digest: image.content_digest,
            created_at: image.created_at,
            updated_at: image.updated_at,
            is_deleted: image.is_deleted,
            is_favorite: image.is_favorite,
        })
    }
}

fn load_image<H: DbHandle>(db: &H, id: i64) -> Result<ImageRecord> {
    ImageRecord::find(db, id)?.ok_or_else(|| PixvaultError::not_found(format!("image {id} not found")))
}

fn ai_tags_view(image_id: i64, tags: Vec<String>) -> AiTagsView {
    AiTagsView {
        image_id,
        tags,
        source: TagSource::Ai,
        status: AnalysisStatus::Ready,
    }
}

fn edit_mode(request: &EditRequest) -> &'static str {
    match request {
        EditRequest::Crop(_) => "crop",
        EditRequest::Hue(_) => "hue",
    }
}

/// Write `bytes` to `path` and run `ingest`; the file is removed if either step fails.
fn store_upload<T>(path: &Path, bytes: &[u8], ingest: impl FnOnce() -> Result<T>) -> Result<T> {
    let stored = std::fs::write(path, bytes)
        .map_err(PixvaultError::from)
        .and_then(|()| {
            debug!("Wrote upload to {}", path.display());
            ingest()
        });
    if let Err(e) = &stored {
        discard_upload(path, e);
    }
    stored
}

fn discard_upload(path: &Path, cause: &PixvaultError) {
    match std::fs::remove_file(path) {
        Ok(()) => warn!("Removed rejected upload {}: {}", path.display(), cause),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove rejected upload {} ({}): {}",
            path.display(),
            cause,
            e
        ),
    }
}
