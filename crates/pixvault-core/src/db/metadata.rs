//! One-to-one and one-to-many metadata side tables.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{
    parse_datetime_opt, query_all, query_optional, to_rfc3339_opt, DbHandle, DbResult,
};
use crate::types::{CaptureTime, Dimensions, ExifEntry, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionsRecord {
    pub image_id: i64,
    pub width: u32,
    pub height: u32,
}

impl DimensionsRecord {
    /// Insert or overwrite the row for this image.
    pub fn upsert<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "INSERT INTO image_dimensions (image_id, width, height) VALUES (?1, ?2, ?3)
             ON CONFLICT(image_id) DO UPDATE SET width = excluded.width, height = excluded.height",
            params![self.image_id, self.width, self.height],
        )?;
        Ok(())
    }

    pub fn load<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Option<Self>> {
        query_optional(
            db,
            "SELECT image_id, width, height FROM image_dimensions WHERE image_id = ?1",
            params![image_id],
            |row| {
                Ok(Self {
                    image_id: row.get(0)?,
                    width: row.get(1)?,
                    height: row.get(2)?,
                })
            },
        )
    }

    pub fn to_view(self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureTimeRecord {
    pub image_id: i64,
    pub taken_at: Option<DateTime<Utc>>,
    pub taken_at_raw: Option<String>,
}

impl CaptureTimeRecord {
    pub fn upsert<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "INSERT INTO image_capture_time (image_id, taken_at, taken_at_raw) VALUES (?1, ?2, ?3)
             ON CONFLICT(image_id) DO UPDATE SET
                taken_at = excluded.taken_at,
                taken_at_raw = excluded.taken_at_raw",
            params![
                self.image_id,
                to_rfc3339_opt(self.taken_at),
                self.taken_at_raw
            ],
        )?;
        Ok(())
    }

    pub fn load<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Option<Self>> {
        query_optional(
            db,
            "SELECT image_id, taken_at, taken_at_raw FROM image_capture_time WHERE image_id = ?1",
            params![image_id],
            |row| {
                Ok(Self {
                    image_id: row.get(0)?,
                    taken_at: parse_datetime_opt(row.get(1)?, "taken_at")?,
                    taken_at_raw: row.get(2)?,
                })
            },
        )
    }

    pub fn to_view(self) -> CaptureTime {
        CaptureTime {
            taken_at: self.taken_at,
            taken_at_raw: self.taken_at_raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub image_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub gps_raw: Option<String>,
}

impl LocationRecord {
    pub fn from_location(image_id: i64, location: &Location) -> Self {
        Self {
            image_id,
            latitude: location.latitude,
            longitude: location.longitude,
            altitude: location.altitude,
            gps_raw: location.gps_raw.clone(),
        }
    }

    pub fn upsert<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "INSERT INTO image_location (image_id, latitude, longitude, altitude, gps_raw)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(image_id) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                altitude = excluded.altitude,
                gps_raw = excluded.gps_raw",
            params![
                self.image_id,
                self.latitude,
                self.longitude,
                self.altitude,
                self.gps_raw
            ],
        )?;
        Ok(())
    }

    pub fn load<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Option<Self>> {
        query_optional(
            db,
            "SELECT image_id, latitude, longitude, altitude, gps_raw
             FROM image_location WHERE image_id = ?1",
            params![image_id],
            |row| {
                Ok(Self {
                    image_id: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                    altitude: row.get(3)?,
                    gps_raw: row.get(4)?,
                })
            },
        )
    }

    pub fn to_view(self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            gps_raw: self.gps_raw,
        }
    }
}

/// Free-form EXIF key/value rows.
pub struct ExifEntryRecord;

impl ExifEntryRecord {
    /// Replace every entry of an image with `entries`.
    pub fn replace_all<H: DbHandle>(db: &H, image_id: i64, entries: &[ExifEntry]) -> DbResult<()> {
        db.execute(
            "DELETE FROM image_exif_entries WHERE image_id = ?1",
            params![image_id],
        )?;
        let mut stmt = db.prepare(
            "INSERT INTO image_exif_entries (image_id, exif_key, exif_value) VALUES (?1, ?2, ?3)",
        )?;
        for entry in entries {
            stmt.execute(params![image_id, entry.key, entry.value])?;
        }
        Ok(())
    }

    pub fn load_for_image<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Vec<ExifEntry>> {
        query_all(
            db,
            "SELECT exif_key, exif_value FROM image_exif_entries WHERE image_id = ?1 ORDER BY id",
            params![image_id],
            |row| {
                Ok(ExifEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                })
            },
        )
    }
}
