use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{parse_datetime, query_all, query_one, query_optional, to_rfc3339, DbHandle, DbResult};
use crate::types::TagSource;

#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
    pub source: TagSource,
    pub created_at: DateTime<Utc>,
}

impl TagRecord {
    /// Look up the `(name, source)` pair, creating it if absent.
    pub fn find_or_create<H: DbHandle>(
        db: &H,
        name: &str,
        source: TagSource,
        now: DateTime<Utc>,
    ) -> DbResult<Self> {
        if let Some(existing) = Self::find(db, name, source)? {
            return Ok(existing);
        }

        db.execute(
            "INSERT OR IGNORE INTO tags (name, source, created_at) VALUES (?1, ?2, ?3)",
            params![name, source.as_str(), to_rfc3339(now)],
        )?;
        query_one(
            db,
            "SELECT id, name, source, created_at FROM tags WHERE name = ?1 AND source = ?2",
            params![name, source.as_str()],
            TagRecord::from_row,
        )
    }

    pub fn find<H: DbHandle>(db: &H, name: &str, source: TagSource) -> DbResult<Option<Self>> {
        query_optional(
            db,
            "SELECT id, name, source, created_at FROM tags WHERE name = ?1 AND source = ?2",
            params![name, source.as_str()],
            TagRecord::from_row,
        )
    }

    /// Associate a tag with an image; a repeated link is a no-op.
    pub fn attach<H: DbHandle>(
        db: &H,
        image_id: i64,
        tag_id: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        db.execute(
            "INSERT OR IGNORE INTO image_tags (image_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
            params![image_id, tag_id, to_rfc3339(now)],
        )?;
        Ok(())
    }

    /// Find-or-create each name under `source` and link it to the image.
    pub fn attach_names<H: DbHandle>(
        db: &H,
        image_id: i64,
        names: &[String],
        source: TagSource,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        for name in names {
            let tag = Self::find_or_create(db, name, source, now)?;
            Self::attach(db, image_id, tag.id, now)?;
        }
        Ok(())
    }

    /// Drop the image's links to tags of one source. The tags themselves stay.
    pub fn detach_source<H: DbHandle>(db: &H, image_id: i64, source: TagSource) -> DbResult<()> {
        db.execute(
            "DELETE FROM image_tags
             WHERE image_id = ?1
               AND tag_id IN (SELECT id FROM tags WHERE source = ?2)",
            params![image_id, source.as_str()],
        )?;
        Ok(())
    }

    /// Distinct tag names on an image, any source, alphabetical.
    pub fn names_for_image<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Vec<String>> {
        query_all(
            db,
            "SELECT DISTINCT t.name
             FROM tags t
             INNER JOIN image_tags it ON it.tag_id = t.id
             WHERE it.image_id = ?1
             ORDER BY t.name",
            params![image_id],
            |row| Ok(row.get(0)?),
        )
    }

    /// Names linked to an image from one source, alphabetical.
    pub fn names_for_source<H: DbHandle>(
        db: &H,
        image_id: i64,
        source: TagSource,
    ) -> DbResult<Vec<String>> {
        query_all(
            db,
            "SELECT t.name
             FROM tags t
             INNER JOIN image_tags it ON it.tag_id = t.id
             WHERE it.image_id = ?1 AND t.source = ?2
             ORDER BY t.name",
            params![image_id, source.as_str()],
            |row| Ok(row.get(0)?),
        )
    }

    pub fn load_for_image<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Vec<Self>> {
        query_all(
            db,
            "SELECT t.id, t.name, t.source, t.created_at
             FROM tags t
             INNER JOIN image_tags it ON it.tag_id = t.id
             WHERE it.image_id = ?1
             ORDER BY t.name, t.source",
            params![image_id],
            TagRecord::from_row,
        )
    }

    /// Catalog vocabulary: distinct names across all sources, alphabetical.
    pub fn all_names<H: DbHandle>(db: &H) -> DbResult<Vec<String>> {
        query_all(
            db,
            "SELECT DISTINCT name FROM tags ORDER BY name",
            [],
            |row| Ok(row.get(0)?),
        )
    }

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        let source: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            source: source.parse()?,
            created_at: parse_datetime(row.get(3)?, "created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::images::tests::sample;
    use crate::db::CatalogDb;

    #[test]
    fn test_same_name_different_source_is_distinct() {
        let db = CatalogDb::in_memory().unwrap();
        let now = Utc::now();
        let custom = TagRecord::find_or_create(&db, "Canon", TagSource::Custom, now).unwrap();
        let exif = TagRecord::find_or_create(&db, "Canon", TagSource::Exif, now).unwrap();
        let again = TagRecord::find_or_create(&db, "Canon", TagSource::Custom, now).unwrap();
        assert_ne!(custom.id, exif.id);
        assert_eq!(custom.id, again.id);
        assert_eq!(TagRecord::all_names(&db).unwrap(), vec!["Canon"]);
    }

    #[test]
    fn test_detach_source_keeps_other_sources() {
        let db = CatalogDb::in_memory().unwrap();
        let now = Utc::now();
        let image_id = sample(1, "2024/01/01/a.jpg").insert(&db).unwrap();

        TagRecord::attach_names(&db, image_id, &["Canon".into()], TagSource::Exif, now).unwrap();
        TagRecord::attach_names(
            &db,
            image_id,
            &["cat".into(), "outdoor".into(), "cat".into()],
            TagSource::Custom,
            now,
        )
        .unwrap();
        assert_eq!(
            TagRecord::names_for_image(&db, image_id).unwrap(),
            vec!["Canon", "cat", "outdoor"]
        );

        TagRecord::detach_source(&db, image_id, TagSource::Custom).unwrap();
        assert_eq!(TagRecord::names_for_image(&db, image_id).unwrap(), vec!["Canon"]);
        // Detached tags remain in the vocabulary.
        assert_eq!(
            TagRecord::all_names(&db).unwrap(),
            vec!["Canon", "cat", "outdoor"]
        );
    }

    #[test]
    fn test_load_for_image_reports_sources() {
        let db = CatalogDb::in_memory().unwrap();
        let now = Utc::now();
        let image_id = sample(1, "2024/01/01/a.jpg").insert(&db).unwrap();
        TagRecord::attach_names(&db, image_id, &["x".into()], TagSource::Exif, now).unwrap();
        TagRecord::attach_names(&db, image_id, &["x".into()], TagSource::Custom, now).unwrap();

        let tags = TagRecord::load_for_image(&db, image_id).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(TagRecord::names_for_image(&db, image_id).unwrap(), vec!["x"]);
    }

    #[test]
    fn test_names_for_source_filters_provenance() {
        let db = CatalogDb::in_memory().unwrap();
        let now = Utc::now();
        let image_id = sample(1, "2024/01/01/a.jpg").insert(&db).unwrap();
        TagRecord::attach_names(&db, image_id, &["sofa".into(), "cat".into()], TagSource::Ai, now)
            .unwrap();
        TagRecord::attach_names(&db, image_id, &["pet".into()], TagSource::Custom, now).unwrap();

        assert_eq!(
            TagRecord::names_for_source(&db, image_id, TagSource::Ai).unwrap(),
            vec!["cat", "sofa"]
        );
        assert!(TagRecord::names_for_source(&db, image_id, TagSource::Exif)
            .unwrap()
            .is_empty());
    }
}
