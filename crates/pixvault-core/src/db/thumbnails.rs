use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{parse_datetime, query_optional, to_rfc3339, DbHandle, DbResult};
use crate::types::ThumbnailPayload;

/// Cached thumbnail for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRecord {
    pub image_id: i64,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub data_base64: String,
    pub created_at: DateTime<Utc>,
}

impl ThumbnailRecord {
    pub fn from_payload(image_id: i64, payload: &ThumbnailPayload, now: DateTime<Utc>) -> Self {
        Self {
            image_id,
            format: payload.format.clone(),
            width: payload.width,
            height: payload.height,
            size_bytes: payload.size_bytes,
            data_base64: payload.data.clone(),
            created_at: now,
        }
    }

    /// Store the thumbnail; a concurrent writer's row is overwritten.
    pub fn upsert<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "INSERT OR REPLACE INTO image_thumbnail
                (image_id, format, width, height, size_bytes, data_base64, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.image_id,
                self.format,
                self.width,
                self.height,
                self.size_bytes as i64,
                self.data_base64,
                to_rfc3339(self.created_at)
            ],
        )?;
        Ok(())
    }

    pub fn load<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Option<Self>> {
        query_optional(
            db,
            "SELECT image_id, format, width, height, size_bytes, data_base64, created_at
             FROM image_thumbnail WHERE image_id = ?1",
            params![image_id],
            ThumbnailRecord::from_row,
        )
    }

    /// Invalidate the cached thumbnail.
    pub fn delete<H: DbHandle>(db: &H, image_id: i64) -> DbResult<()> {
        db.execute(
            "DELETE FROM image_thumbnail WHERE image_id = ?1",
            params![image_id],
        )?;
        Ok(())
    }

    pub fn to_payload(&self) -> ThumbnailPayload {
        ThumbnailPayload {
            format: self.format.clone(),
            width: self.width,
            height: self.height,
            data: self.data_base64.clone(),
            size_bytes: self.size_bytes,
        }
    }

    fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        Ok(Self {
            image_id: row.get(0)?,
            format: row.get(1)?,
            width: row.get(2)?,
            height: row.get(3)?,
            size_bytes: row.get::<_, i64>(4)?.max(0) as u64,
            data_base64: row.get(5)?,
            created_at: parse_datetime(row.get(6)?, "created_at")?,
        })
    }
}
