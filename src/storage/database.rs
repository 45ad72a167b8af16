//! SQLite-backed annotation store
//!
//! One table of quadrilateral + text records, indexed by image name. Every
//! mutating call runs in autocommit mode, so it is durable on return.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::geometry::{PixelPoint, PixelQuad};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS label_text (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    img_name TEXT NOT NULL,
    x1 INTEGER NOT NULL,
    y1 INTEGER NOT NULL,
    x2 INTEGER NOT NULL,
    y2 INTEGER NOT NULL,
    x3 INTEGER NOT NULL,
    y3 INTEGER NOT NULL,
    x4 INTEGER NOT NULL,
    y4 INTEGER NOT NULL,
    img_text TEXT NOT NULL,
    tsp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_label_text_img_name ON label_text (img_name ASC);
"#;

const SELECT_COLUMNS: &str = "id, img_name, x1, y1, x2, y2, x3, y3, x4, y4, img_text, tsp";

/// A persisted annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRecord {
    /// Store-assigned id, increasing in insertion order
    pub id: i64,
    /// Image the record belongs to (file name)
    pub image_identity: String,
    /// Corners in pixel space
    pub quad: PixelQuad,
    /// Transcribed text, possibly empty
    pub text: String,
    /// Unix timestamp (seconds) of the last write
    pub last_modified: i64,
}

/// Durable, per-image collection of annotation records
pub struct AnnotationStore {
    conn: Connection,
}

impl AnnotationStore {
    /// Open or create the label database at path
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init_schema()?;
        info!("Opened label database at {:?}", path);
        Ok(store)
    }

    /// Open a throwaway database that lives only as long as the store
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create the table and index if they do not exist yet
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Reject every write from now on, to exercise storage failures
    #[cfg(test)]
    pub(crate) fn set_query_only(&self, on: bool) -> Result<()> {
        self.conn.pragma_update(None, "query_only", on)?;
        Ok(())
    }

    /// Close the connection, reporting any error the engine raises on close
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }

    /// All records of an image, ordered by ascending id
    pub fn get_all(&self, image_identity: &str) -> Result<Vec<AnnotationRecord>> {
        let sql = format!(
            "SELECT {} FROM label_text WHERE img_name = ?1 ORDER BY id",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![image_identity], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Loaded {} records for {}", records.len(), image_identity);
        Ok(records)
    }

    /// A single record, if it exists under this image
    pub fn get(&self, image_identity: &str, id: i64) -> Result<Option<AnnotationRecord>> {
        let sql = format!(
            "SELECT {} FROM label_text WHERE img_name = ?1 AND id = ?2",
            SELECT_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![image_identity, id], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// Number of records stored for an image
    pub fn count(&self, image_identity: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM label_text WHERE img_name = ?1",
            params![image_identity],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Insert a record and return its new id
    pub fn add(&self, image_identity: &str, quad: &PixelQuad, text: &str) -> Result<i64> {
        let [p1, p2, p3, p4] = quad;
        self.conn.execute(
            "INSERT INTO label_text (img_name, x1, y1, x2, y2, x3, y3, x4, y4, img_text, tsp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                image_identity,
                p1.x,
                p1.y,
                p2.x,
                p2.y,
                p3.x,
                p3.y,
                p4.x,
                p4.y,
                text,
                unix_now()
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Added record {} to {}", id, image_identity);
        Ok(id)
    }

    /// Remove a record; a missing id is not an error
    pub fn delete(&self, image_identity: &str, id: i64) -> Result<()> {
        let affected = self.conn.execute(
            "DELETE FROM label_text WHERE img_name = ?1 AND id = ?2",
            params![image_identity, id],
        )?;
        debug!("Deleted record {} from {} ({} rows)", id, image_identity, affected);
        Ok(())
    }

    /// Replace a record's text
    pub fn update_text(&self, image_identity: &str, id: i64, text: &str) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE label_text SET img_text = ?1, tsp = ?2 WHERE img_name = ?3 AND id = ?4",
            params![text, unix_now(), image_identity, id],
        )?;
        log_scoped_update("text", image_identity, id, affected);
        Ok(())
    }

    /// Replace all four corners of a record
    pub fn update_quadrilateral(
        &self,
        image_identity: &str,
        id: i64,
        quad: &PixelQuad,
    ) -> Result<()> {
        let [p1, p2, p3, p4] = quad;
        let affected = self.conn.execute(
            "UPDATE label_text
             SET x1 = ?1, y1 = ?2, x2 = ?3, y2 = ?4, x3 = ?5, y3 = ?6, x4 = ?7, y4 = ?8, tsp = ?9
             WHERE img_name = ?10 AND id = ?11",
            params![
                p1.x,
                p1.y,
                p2.x,
                p2.y,
                p3.x,
                p3.y,
                p4.x,
                p4.y,
                unix_now(),
                image_identity,
                id
            ],
        )?;
        log_scoped_update("quadrilateral", image_identity, id, affected);
        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AnnotationRecord> {
    let mut quad = [PixelPoint::new(0, 0); 4];
    for (i, corner) in quad.iter_mut().enumerate() {
        *corner = PixelPoint::new(row.get(2 + i * 2)?, row.get(3 + i * 2)?);
    }

    Ok(AnnotationRecord {
        id: row.get(0)?,
        image_identity: row.get(1)?,
        quad,
        text: row.get(10)?,
        last_modified: row.get(11)?,
    })
}

fn log_scoped_update(what: &str, image_identity: &str, id: i64, affected: usize) {
    if affected == 0 {
        warn!("Update of {} matched no record {} in {}", what, id, image_identity);
    } else {
        debug!("Updated {} of record {} in {}", what, id, image_identity);
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnotateError;
    use tempfile::TempDir;

    fn quad(pairs: [(i32, i32); 4]) -> PixelQuad {
        pairs.map(PixelPoint::from)
    }

    fn sample_quad() -> PixelQuad {
        quad([(10, 20), (110, 20), (110, 60), (10, 60)])
    }

    #[test]
    fn test_add_then_get_all() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let before = unix_now();

        let id = store.add("img1.png", &sample_quad(), "hello").unwrap();
        let records = store.get_all("img1.png").unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].image_identity, "img1.png");
        assert_eq!(records[0].quad, sample_quad());
        assert_eq!(records[0].text, "hello");
        assert!(records[0].last_modified >= before);
    }

    #[test]
    fn test_get_all_unknown_image_is_empty() {
        let store = AnnotationStore::open_in_memory().unwrap();
        store.add("img1.png", &sample_quad(), "").unwrap();
        assert!(store.get_all("other.png").unwrap().is_empty());
    }

    #[test]
    fn test_ids_increase_and_order_by_id() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let a = store.add("img1.png", &sample_quad(), "a").unwrap();
        let b = store.add("img2.png", &sample_quad(), "b").unwrap();
        let c = store.add("img1.png", &sample_quad(), "c").unwrap();
        assert!(a < b && b < c);

        let texts: Vec<_> = store
            .get_all("img1.png")
            .unwrap()
            .into_iter()
            .map(|r| (r.id, r.text))
            .collect();
        assert_eq!(texts, vec![(a, "a".to_string()), (c, "c".to_string())]);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let a = store.add("img1.png", &sample_quad(), "").unwrap();
        store.delete("img1.png", a).unwrap();
        let b = store.add("img1.png", &sample_quad(), "").unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_update_text_wrong_image_is_noop() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = store.add("img1.png", &sample_quad(), "x").unwrap();

        store.update_text("img2.png", id, "y").unwrap();

        let records = store.get_all("img1.png").unwrap();
        assert_eq!(records[0].text, "x");
    }

    #[test]
    fn test_update_text() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = store.add("img1.png", &sample_quad(), "").unwrap();

        store.update_text("img1.png", id, "新的文本").unwrap();

        let record = store.get("img1.png", id).unwrap().unwrap();
        assert_eq!(record.text, "新的文本");
        assert_eq!(record.quad, sample_quad());
    }

    #[test]
    fn test_update_quadrilateral() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = store.add("img1.png", &sample_quad(), "keep").unwrap();
        let moved = quad([(1, 2), (30, 4), (31, 40), (2, 41)]);

        store.update_quadrilateral("img1.png", id, &moved).unwrap();
        store.update_quadrilateral("img2.png", id, &sample_quad()).unwrap();

        let record = store.get("img1.png", id).unwrap().unwrap();
        assert_eq!(record.quad, moved);
        assert_eq!(record.text, "keep");
    }

    #[test]
    fn test_delete_then_get_all_is_empty() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = store.add("img1.png", &sample_quad(), "").unwrap();

        store.delete("img1.png", id).unwrap();

        assert!(store.get_all("img1.png").unwrap().is_empty());
        assert_eq!(store.count("img1.png").unwrap(), 0);
    }

    #[test]
    fn test_delete_missing_or_wrong_scope_is_silent() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = store.add("img1.png", &sample_quad(), "").unwrap();

        store.delete("img1.png", id + 100).unwrap();
        store.delete("img2.png", id).unwrap();

        assert_eq!(store.count("img1.png").unwrap(), 1);
    }

    #[test]
    fn test_get_wrong_scope_is_none() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = store.add("img1.png", &sample_quad(), "").unwrap();
        assert!(store.get("img2.png", id).unwrap().is_none());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("label.sqllite3");

        let store = AnnotationStore::open(&path).unwrap();
        let id = store.add("img1.png", &sample_quad(), "persisted").unwrap();
        store.close().unwrap();

        let reopened = AnnotationStore::open(&path).unwrap();
        let records = reopened.get_all("img1.png").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].text, "persisted");
    }

    fn seed_old_record(store: &AnnotationStore) -> i64 {
        store
            .conn
            .execute(
                "INSERT INTO label_text (img_name,x1,y1,x2,y2,x3,y3,x4,y4,img_text,tsp)
                 VALUES ('img1.png',1,2,3,4,5,6,7,8,'old',1600000000)",
                [],
            )
            .unwrap();
        store.conn.last_insert_rowid()
    }

    #[test]
    fn test_updates_bump_last_modified() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = seed_old_record(&store);

        store.update_text("img1.png", id, "new").unwrap();
        let after_text = store.get("img1.png", id).unwrap().unwrap();
        assert!(after_text.last_modified > 1600000000);

        let other = seed_old_record(&store);
        store.update_quadrilateral("img1.png", other, &sample_quad()).unwrap();
        let after_quad = store.get("img1.png", other).unwrap().unwrap();
        assert!(after_quad.last_modified > 1600000000);
        assert_eq!(after_quad.quad, sample_quad());
    }

    #[test]
    fn test_wrong_scope_update_keeps_last_modified() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = seed_old_record(&store);

        store.update_text("img2.png", id, "new").unwrap();
        store.update_quadrilateral("img2.png", id, &sample_quad()).unwrap();

        let record = store.get("img1.png", id).unwrap().unwrap();
        assert_eq!(record.last_modified, 1600000000);
        assert_eq!(record.text, "old");
    }

    #[test]
    fn test_query_only_rejects_writes() {
        let store = AnnotationStore::open_in_memory().unwrap();
        let id = store.add("img1.png", &sample_quad(), "").unwrap();
        store.set_query_only(true).unwrap();

        let result = store.update_text("img1.png", id, "x");
        assert!(matches!(result, Err(AnnotateError::StorageFailure(_))));
        assert_eq!(store.get("img1.png", id).unwrap().unwrap().text, "");
    }

    #[test]
    fn test_opens_existing_label_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("label.sqllite3");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
            conn.execute(
                "INSERT INTO label_text (img_name,x1,y1,x2,y2,x3,y3,x4,y4,img_text,tsp)
                 VALUES ('a.jpg',1,2,3,4,5,6,7,8,'old',1600000000)",
                [],
            )
            .unwrap();
        }

        let store = AnnotationStore::open(&path).unwrap();
        let records = store.get_all("a.jpg").unwrap();
        assert_eq!(records[0].quad, quad([(1, 2), (3, 4), (5, 6), (7, 8)]));
        assert_eq!(records[0].last_modified, 1600000000);
    }
}
