//! Tag-based retrieval: exact set filtering with pagination, and overlap
//! ranking for resolved free-text queries.
//!
//! Tags match by name regardless of source, and match counts are over
//! distinct names, so one text carried by two sources counts once.

use rusqlite::params_from_iter;
use rusqlite::types::Value;

use super::images::{ImageRecord, IMAGE_COLUMNS};
use super::{placeholders, query_all, query_one, DbHandle, DbResult};
use crate::types::TagMode;

/// Maximum number of images returned by overlap ranking.
pub const OVERLAP_LIMIT: usize = 5;

/// Which images a query may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Soft-deleted images are hidden
    Active,
    /// Soft-deleted images are included
    All,
}

impl Visibility {
    fn clause(self) -> &'static str {
        match self {
            Self::Active => "i.is_deleted = 0",
            Self::All => "1 = 1",
        }
    }
}

/// Exact tag filter plus page selection.
#[derive(Debug, Clone)]
pub struct TagFilter {
    /// Requested names; empty means no tag constraint
    pub names: Vec<String>,
    pub mode: TagMode,
    pub visibility: Visibility,
    pub limit: u32,
    pub offset: u64,
}

/// An image with the number of distinct requested names it carries.
#[derive(Debug, Clone)]
pub struct OverlapMatch {
    pub image: ImageRecord,
    pub matched: u32,
}

/// Trim, drop empties, and de-duplicate while keeping first occurrence.
pub fn normalize_names(names: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Build the WHERE clause and its bound values for a filter.
fn filter_clause(filter: &TagFilter, names: &[String]) -> (String, Vec<Value>) {
    let mut sql = filter.visibility.clause().to_string();
    let mut values: Vec<Value> = Vec::new();
    if names.is_empty() {
        return (sql, values);
    }

    sql.push_str(&format!(
        " AND i.id IN (
            SELECT it.image_id FROM image_tags it
            INNER JOIN tags t ON t.id = it.tag_id
            WHERE t.name IN ({})
            GROUP BY it.image_id",
        placeholders(names.len())
    ));
    values.extend(names.iter().cloned().map(Value::Text));
    if filter.mode == TagMode::All {
        sql.push_str(" HAVING COUNT(DISTINCT t.name) = ?");
        values.push(Value::Integer(names.len() as i64));
    }
    sql.push(')');
    (sql, values)
}

/// One page of images matching the filter, newest first, plus the total count.
pub fn filter_images<H: DbHandle>(db: &H, filter: &TagFilter) -> DbResult<(u64, Vec<ImageRecord>)> {
    let names = normalize_names(&filter.names);
    let (clause, values) = filter_clause(filter, &names);

    let total: i64 = query_one(
        db,
        &format!("SELECT COUNT(*) FROM images i WHERE {clause}"),
        params_from_iter(values.iter()),
        |row| Ok(row.get(0)?),
    )?;

    let mut page_values = values;
    page_values.push(Value::Integer(i64::from(filter.limit)));
    page_values.push(Value::Integer(filter.offset.min(i64::MAX as u64) as i64));
    let images = query_all(
        db,
        &format!(
            "SELECT {IMAGE_COLUMNS} FROM images i
             WHERE {clause}
             ORDER BY i.created_at DESC, i.id DESC
             LIMIT ? OFFSET ?"
        ),
        params_from_iter(page_values.iter()),
        ImageRecord::from_row,
    )?;

    tracing::debug!(
        "Tag filter {:?} ({:?}) matched {} images",
        names,
        filter.mode,
        total
    );
    Ok((total.max(0) as u64, images))
}

/// Rank non-deleted images by how many distinct `names` they carry.
///
/// Ordered by match count descending, then id descending; at most
/// [`OVERLAP_LIMIT`] results. Images matching nothing are omitted.
pub fn rank_by_overlap<H: DbHandle>(db: &H, names: &[String]) -> DbResult<Vec<OverlapMatch>> {
    let names = normalize_names(names);
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let mut values: Vec<Value> = names.iter().cloned().map(Value::Text).collect();
    values.push(Value::Integer(OVERLAP_LIMIT as i64));
    query_all(
        db,
        &format!(
            "SELECT {IMAGE_COLUMNS}, COUNT(DISTINCT t.name) AS matched
             FROM images i
             INNER JOIN image_tags it ON it.image_id = i.id
             INNER JOIN tags t ON t.id = it.tag_id
             WHERE i.is_deleted = 0 AND t.name IN ({})
             GROUP BY i.id
             ORDER BY matched DESC, i.id DESC
             LIMIT ?",
            placeholders(names.len())
        ),
        params_from_iter(values.iter()),
        |row| {
            Ok(OverlapMatch {
                image: ImageRecord::from_row(row)?,
                matched: row.get(14)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::images::tests::sample;
    use crate::db::{CatalogDb, TagRecord};
    use crate::types::TagSource;
    use chrono::{Duration, Utc};

    /// Insert an image created `age_secs` ago carrying `tags`.
    fn image_with(db: &CatalogDb, n: u32, age_secs: i64, tags: &[(&str, TagSource)]) -> i64 {
        let mut record = sample(1, &format!("2024/01/01/img{n}.jpg"));
        record.created_at = Utc::now() - Duration::seconds(age_secs);
        let id = record.insert(db).unwrap();
        for (name, source) in tags {
            TagRecord::attach_names(db, id, &[name.to_string()], *source, Utc::now()).unwrap();
        }
        id
    }

    fn filter(names: &[&str], mode: TagMode) -> TagFilter {
        TagFilter {
            names: names.iter().map(|s| s.to_string()).collect(),
            mode,
            visibility: Visibility::Active,
            limit: 20,
            offset: 0,
        }
    }

    fn ids(images: &[ImageRecord]) -> Vec<i64> {
        images.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_all_mode_requires_every_name() {
        let db = CatalogDb::in_memory().unwrap();
        use TagSource::*;
        let both = image_with(&db, 1, 30, &[("cat", Custom), ("outdoor", Custom)]);
        let _cat = image_with(&db, 2, 20, &[("cat", Custom)]);
        let both_mixed = image_with(&db, 3, 10, &[("cat", Exif), ("outdoor", Custom)]);
        let _dupe = image_with(&db, 4, 5, &[("cat", Custom), ("cat", Exif)]);

        let (total, images) = filter_images(&db, &filter(&["cat", "outdoor"], TagMode::All)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(ids(&images), vec![both_mixed, both]);
    }

    #[test]
    fn test_any_mode_deduplicates_images() {
        let db = CatalogDb::in_memory().unwrap();
        use TagSource::*;
        let a = image_with(&db, 1, 30, &[("cat", Custom), ("outdoor", Custom)]);
        let b = image_with(&db, 2, 20, &[("dog", Custom)]);
        let c = image_with(&db, 3, 10, &[("outdoor", Exif)]);

        let (total, images) =
            filter_images(&db, &filter(&["cat", "outdoor", "dog"], TagMode::Any)).unwrap();
        assert_eq!(total, 3);
        assert_eq!(ids(&images), vec![c, b, a]);
    }

    #[test]
    fn test_duplicate_request_names_are_collapsed() {
        let db = CatalogDb::in_memory().unwrap();
        let a = image_with(&db, 1, 10, &[("cat", TagSource::Custom)]);
        let (total, images) =
            filter_images(&db, &filter(&["cat", " cat ", ""], TagMode::All)).unwrap();
        assert_eq!(total, 1);
        assert_eq!(ids(&images), vec![a]);
    }

    #[test]
    fn test_visibility_and_pagination() {
        let db = CatalogDb::in_memory().unwrap();
        let old = image_with(&db, 1, 30, &[]);
        let mid = image_with(&db, 2, 20, &[]);
        let new = image_with(&db, 3, 10, &[]);
        ImageRecord::set_deleted(&db, mid, true, Utc::now()).unwrap();

        let (total, images) = filter_images(&db, &filter(&[], TagMode::All)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(ids(&images), vec![new, old]);

        let mut admin = filter(&[], TagMode::All);
        admin.visibility = Visibility::All;
        admin.limit = 1;
        admin.offset = 1;
        let (total, images) = filter_images(&db, &admin).unwrap();
        assert_eq!(total, 3);
        assert_eq!(ids(&images), vec![mid]);
    }

    #[test]
    fn test_overlap_orders_by_count_then_id() {
        let db = CatalogDb::in_memory().unwrap();
        use TagSource::*;
        let one_a = image_with(&db, 1, 60, &[("sea", Custom)]);
        let two = image_with(&db, 2, 50, &[("sea", Custom), ("sky", Custom)]);
        let one_b = image_with(&db, 3, 40, &[("sky", Exif), ("sky", Custom)]);
        let three = image_with(&db, 4, 30, &[("sea", Custom), ("sky", Custom), ("sun", Ai)]);
        let deleted = image_with(&db, 5, 20, &[("sea", Custom), ("sky", Custom), ("sun", Custom)]);
        let _none = image_with(&db, 6, 10, &[("tree", Custom)]);
        ImageRecord::set_deleted(&db, deleted, true, Utc::now()).unwrap();

        let names: Vec<String> = ["sea", "sky", "sun"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_by_overlap(&db, &names).unwrap();
        let order: Vec<(i64, u32)> = ranked.iter().map(|m| (m.image.id, m.matched)).collect();
        assert_eq!(order, vec![(three, 3), (two, 2), (one_b, 1), (one_a, 1)]);
    }

    #[test]
    fn test_overlap_caps_results() {
        let db = CatalogDb::in_memory().unwrap();
        for n in 0..8 {
            image_with(&db, n, i64::from(n), &[("cat", TagSource::Custom)]);
        }
        let ranked = rank_by_overlap(&db, &["cat".to_string()]).unwrap();
        assert_eq!(ranked.len(), OVERLAP_LIMIT);
        assert!(ranked.windows(2).all(|w| w[0].image.id > w[1].image.id));
        assert!(rank_by_overlap(&db, &[]).unwrap().is_empty());
    }
}
