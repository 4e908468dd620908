use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{
    parse_datetime, parse_datetime_opt, query_all, query_one, query_optional, to_rfc3339,
    to_rfc3339_opt, DbHandle, DbResult,
};

/// Column list shared by every query that maps through [`ImageRecord::from_row`].
pub(crate) const IMAGE_COLUMNS: &str = "i.id, i.owner_id, i.original_filename, i.ext, i.hash, \
     i.storage_relpath, i.size_bytes, i.mime_type, i.content_digest, i.created_at, \
     i.updated_at, i.is_deleted, i.deleted_at, i.is_favorite";

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    pub owner_id: i64,
    pub original_filename: Option<String>,
    pub ext: String,
    /// Random path token
    pub hash: String,
    pub storage_relpath: String,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub content_digest: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_favorite: bool,
}

impl ImageRecord {
    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<i64> {
        db.execute(
            "INSERT INTO images (
                owner_id, original_filename, ext, hash, storage_relpath, size_bytes,
                mime_type, content_digest, created_at, updated_at, is_deleted, deleted_at,
                is_favorite
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                self.owner_id,
                self.original_filename,
                self.ext,
                self.hash,
                self.storage_relpath,
                self.size_bytes as i64,
                self.mime_type,
                self.content_digest,
                to_rfc3339(self.created_at),
                to_rfc3339(self.updated_at),
                self.is_deleted,
                to_rfc3339_opt(self.deleted_at),
                self.is_favorite,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn load<H: DbHandle>(db: &H, id: i64) -> DbResult<Self> {
        query_one(
            db,
            &format!("SELECT {IMAGE_COLUMNS} FROM images i WHERE i.id = ?1"),
            params![id],
            ImageRecord::from_row,
        )
    }

    pub fn find<H: DbHandle>(db: &H, id: i64) -> DbResult<Option<Self>> {
        query_optional(
            db,
            &format!("SELECT {IMAGE_COLUMNS} FROM images i WHERE i.id = ?1"),
            params![id],
            ImageRecord::from_row,
        )
    }

    pub fn find_by_relpath<H: DbHandle>(db: &H, relpath: &str) -> DbResult<Option<Self>> {
        query_optional(
            db,
            &format!("SELECT {IMAGE_COLUMNS} FROM images i WHERE i.storage_relpath = ?1"),
            params![relpath],
            ImageRecord::from_row,
        )
    }

    /// Non-deleted favorites, newest first.
    pub fn list_favorites<H: DbHandle>(db: &H) -> DbResult<Vec<Self>> {
        query_all(
            db,
            &format!(
                "SELECT {IMAGE_COLUMNS} FROM images i
                 WHERE i.is_favorite = 1 AND i.is_deleted = 0
                 ORDER BY i.created_at DESC, i.id DESC"
            ),
            [],
            ImageRecord::from_row,
        )
    }

    pub fn set_deleted<H: DbHandle>(
        db: &H,
        id: i64,
        deleted: bool,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let deleted_at = deleted.then(|| to_rfc3339(now));
        db.execute(
            "UPDATE images SET is_deleted = ?1, deleted_at = ?2, updated_at = ?3 WHERE id = ?4",
            params![deleted, deleted_at, to_rfc3339(now), id],
        )?;
        Ok(())
    }

    pub fn set_favorite<H: DbHandle>(
        db: &H,
        id: i64,
        favorite: bool,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        db.execute(
            "UPDATE images SET is_favorite = ?1, updated_at = ?2 WHERE id = ?3",
            params![favorite, to_rfc3339(now), id],
        )?;
        Ok(())
    }

    /// Record new file statistics after the original was rewritten.
    pub fn update_file_stats<H: DbHandle>(
        db: &H,
        id: i64,
        size_bytes: u64,
        content_digest: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        db.execute(
            "UPDATE images SET size_bytes = ?1, content_digest = ?2, updated_at = ?3 WHERE id = ?4",
            params![size_bytes as i64, content_digest, to_rfc3339(now), id],
        )?;
        Ok(())
    }

    pub fn touch<H: DbHandle>(db: &H, id: i64, now: DateTime<Utc>) -> DbResult<()> {
        db.execute(
            "UPDATE images SET updated_at = ?1 WHERE id = ?2",
            params![to_rfc3339(now), id],
        )?;
        Ok(())
    }

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            original_filename: row.get(2)?,
            ext: row.get(3)?,
            hash: row.get(4)?,
            storage_relpath: row.get(5)?,
            size_bytes: row.get::<_, i64>(6)?.max(0) as u64,
            mime_type: row.get(7)?,
            content_digest: row.get(8)?,
            created_at: parse_datetime(row.get(9)?, "created_at")?,
            updated_at: parse_datetime(row.get(10)?, "updated_at")?,
            is_deleted: row.get(11)?,
            deleted_at: parse_datetime_opt(row.get(12)?, "deleted_at")?,
            is_favorite: row.get(13)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::CatalogDb;

    pub(crate) fn sample(owner_id: i64, relpath: &str) -> ImageRecord {
        let now = Utc::now();
        ImageRecord {
            id: 0,
            owner_id,
            original_filename: Some("cat.jpg".into()),
            ext: "jpg".into(),
            hash: "AbCd1234".into(),
            storage_relpath: relpath.into(),
            size_bytes: 1234,
            mime_type: Some("image/jpeg".into()),
            content_digest: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
            is_favorite: false,
        }
    }

    #[test]
    fn test_insert_and_load() {
        let db = CatalogDb::in_memory().unwrap();
        let id = sample(7, "2024/01/01/AbCd1234.jpg").insert(&db).unwrap();
        let loaded = ImageRecord::load(&db, id).unwrap();
        assert_eq!(loaded.owner_id, 7);
        assert_eq!(loaded.size_bytes, 1234);
        assert!(!loaded.is_deleted);
        assert!(ImageRecord::find(&db, id + 100).unwrap().is_none());
    }

    #[test]
    fn test_relpath_is_unique() {
        let db = CatalogDb::in_memory().unwrap();
        sample(1, "2024/01/01/x.jpg").insert(&db).unwrap();
        assert!(sample(2, "2024/01/01/x.jpg").insert(&db).is_err());
    }

    #[test]
    fn test_soft_delete_and_restore() {
        let db = CatalogDb::in_memory().unwrap();
        let id = sample(1, "2024/01/01/a.jpg").insert(&db).unwrap();

        ImageRecord::set_deleted(&db, id, true, Utc::now()).unwrap();
        let deleted = ImageRecord::load(&db, id).unwrap();
        assert!(deleted.is_deleted);
        assert!(deleted.deleted_at.is_some());

        ImageRecord::set_deleted(&db, id, false, Utc::now()).unwrap();
        let restored = ImageRecord::load(&db, id).unwrap();
        assert!(!restored.is_deleted);
        assert!(restored.deleted_at.is_none());
    }

    #[test]
    fn test_favorites_skip_deleted() {
        let db = CatalogDb::in_memory().unwrap();
        let a = sample(1, "2024/01/01/a.jpg").insert(&db).unwrap();
        let b = sample(1, "2024/01/01/b.jpg").insert(&db).unwrap();
        ImageRecord::set_favorite(&db, a, true, Utc::now()).unwrap();
        ImageRecord::set_favorite(&db, b, true, Utc::now()).unwrap();
        ImageRecord::set_deleted(&db, b, true, Utc::now()).unwrap();

        let favorites = ImageRecord::list_favorites(&db).unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, a);
    }
}
