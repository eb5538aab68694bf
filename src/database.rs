//! SQLite event store.
//!
//! One database holds one video's events; `replace_all` imports a run by
//! dropping whatever was loaded before. `execute_query` runs LLM-generated
//! SELECTs for the query engine and refuses anything else.

use anyhow::Result;
use chrono::Utc;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

use crate::pipeline::DetectionEvent;

/// Schema text handed to the LLM for text-to-SQL. Keep in sync with
/// `migrate`.
pub const SCHEMA: &str = "\
CREATE TABLE detections (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    track_id      INTEGER NOT NULL,  -- persistent id of one tracked vehicle
    frame_id      INTEGER NOT NULL,
    timestamp     REAL    NOT NULL,  -- seconds from the start of the video
    label         TEXT    NOT NULL,  -- 'car' | 'truck' | 'bus' | 'motorcycle'
    confidence    REAL    NOT NULL,  -- 0.0 to 1.0
    bbox_x1       INTEGER NOT NULL,
    bbox_y1       INTEGER NOT NULL,
    bbox_x2       INTEGER NOT NULL,
    bbox_y2       INTEGER NOT NULL,
    color         TEXT    NOT NULL,  -- color name, or 'unknown'/'other'
    license_plate TEXT    NOT NULL,  -- '' when no plate was read
    created_at    TEXT    NOT NULL   -- ingest wall-clock time, RFC 3339
);";

/// Aggregates over the stored run.
#[derive(Debug, Serialize)]
pub struct Statistics {
    pub total_events: u64,
    pub unique_tracks: u64,
    /// Distinct tracks with a non-empty plate.
    pub plates_recognized: u64,
    /// Largest event timestamp, seconds.
    pub video_span_secs: f64,
    pub by_label: Vec<(String, u64)>,
    pub by_color: Vec<(String, u64)>,
}

pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS detections (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                track_id      INTEGER NOT NULL,
                frame_id      INTEGER NOT NULL,
                timestamp     REAL    NOT NULL,
                label         TEXT    NOT NULL,
                confidence    REAL    NOT NULL,
                bbox_x1       INTEGER NOT NULL,
                bbox_y1       INTEGER NOT NULL,
                bbox_x2       INTEGER NOT NULL,
                bbox_y2       INTEGER NOT NULL,
                color         TEXT    NOT NULL,
                license_plate TEXT    NOT NULL,
                created_at    TEXT    NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_track ON detections (track_id);
            CREATE INDEX IF NOT EXISTS idx_label ON detections (label);
            CREATE INDEX IF NOT EXISTS idx_plate ON detections (license_plate);
        ",
        )?;
        Ok(())
    }

    /// Replace the table contents with one run's events, transactionally.
    pub fn replace_all(&mut self, events: &[DetectionEvent]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM detections", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO detections
                 (track_id, frame_id, timestamp, label, confidence,
                  bbox_x1, bbox_y1, bbox_x2, bbox_y2, color, license_plate, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            let created_at = Utc::now().to_rfc3339();
            for event in events {
                stmt.execute(params![
                    event.track_id,
                    event.frame_id as i64,
                    event.timestamp,
                    event.label,
                    event.confidence,
                    event.bbox[0],
                    event.bbox[1],
                    event.bbox[2],
                    event.bbox[3],
                    event.color,
                    event.license_plate,
                    created_at,
                ])?;
            }
        }
        tx.commit()?;
        info!("Stored {} events", events.len());
        Ok(events.len())
    }

    /// Run an arbitrary SELECT and render every value as a string.
    /// Anything that writes is refused — this executes model-generated SQL.
    pub fn execute_query(&self, sql: &str) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let head = sql.trim_start().to_ascii_uppercase();
        if !head.starts_with("SELECT") && !head.starts_with("WITH") {
            anyhow::bail!("refusing to run non-SELECT SQL: {}", sql.trim());
        }

        let mut stmt = self.conn.prepare(sql)?;
        // WITH can prefix a writable CTE (`WITH x AS (...) DELETE ...`), so
        // the keyword check alone is not enough; sqlite knows per statement
        // whether it writes.
        if !stmt.readonly() {
            anyhow::bail!("refusing to run SQL that writes to the database: {}", sql.trim());
        }
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let ncols = columns.len();

        let mut rows = Vec::new();
        let mut raw = stmt.query([])?;
        while let Some(row) = raw.next()? {
            let mut rendered = Vec::with_capacity(ncols);
            for i in 0..ncols {
                rendered.push(render_value(row.get_ref(i)?));
            }
            rows.push(rendered);
        }
        Ok((columns, rows))
    }

    pub fn get_recent(&self, limit: u32) -> Result<Vec<DetectionEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT track_id, frame_id, timestamp, label, confidence,
                    bbox_x1, bbox_y1, bbox_x2, bbox_y2, color, license_plate
             FROM detections ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], map_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_events(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_statistics(&self) -> Result<Statistics> {
        let total_events: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))?;
        let unique_tracks: u64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT track_id) FROM detections",
            [],
            |row| row.get(0),
        )?;
        let plates_recognized: u64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT track_id) FROM detections WHERE license_plate != ''",
            [],
            |row| row.get(0),
        )?;
        let video_span_secs: f64 = self.conn.query_row(
            "SELECT COALESCE(MAX(timestamp), 0.0) FROM detections",
            [],
            |row| row.get(0),
        )?;

        let by_label = self.grouped_counts("label")?;
        let by_color = self.grouped_counts("color")?;

        Ok(Statistics {
            total_events,
            unique_tracks,
            plates_recognized,
            video_span_secs,
            by_label,
            by_color,
        })
    }

    fn grouped_counts(&self, column: &str) -> Result<Vec<(String, u64)>> {
        // column is one of our own identifiers, never user input
        let sql = format!(
            "SELECT {col}, COUNT(*) as cnt FROM detections GROUP BY {col} ORDER BY cnt DESC",
            col = column
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(counts)
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DetectionEvent> {
    Ok(DetectionEvent {
        track_id: row.get(0)?,
        frame_id: row.get::<_, i64>(1)? as u64,
        timestamp: row.get(2)?,
        label: row.get(3)?,
        confidence: row.get(4)?,
        bbox: [row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?],
        color: row.get(9)?,
        license_plate: row.get(10)?,
    })
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(track_id: i64, frame_id: u64, plate: &str) -> DetectionEvent {
        DetectionEvent {
            track_id,
            frame_id,
            timestamp: frame_id as f64 / 30.0,
            label: "car".into(),
            confidence: 0.9,
            bbox: [10, 20, 110, 220],
            color: "red".into(),
            license_plate: plate.into(),
        }
    }

    #[test]
    fn insert_and_read_back() {
        let mut store = EventStore::open_in_memory().unwrap();
        store
            .replace_all(&[event(1, 0, "AB123"), event(1, 5, "AB123")])
            .unwrap();
        assert_eq!(store.count_events().unwrap(), 2);

        let recent = store.get_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first.
        assert_eq!(recent[0].frame_id, 5);
        assert_eq!(recent[0].license_plate, "AB123");
        assert_eq!(recent[0].bbox, [10, 20, 110, 220]);
    }

    #[test]
    fn replace_all_clears_previous_runs() {
        let mut store = EventStore::open_in_memory().unwrap();
        store.replace_all(&[event(1, 0, ""), event(2, 0, "")]).unwrap();
        store.replace_all(&[event(9, 0, "ZZ999")]).unwrap();
        assert_eq!(store.count_events().unwrap(), 1);
        assert_eq!(store.get_recent(10).unwrap()[0].track_id, 9);
    }

    #[test]
    fn execute_query_returns_columns_and_rows() {
        let mut store = EventStore::open_in_memory().unwrap();
        store
            .replace_all(&[event(1, 0, "AB123"), event(2, 0, "")])
            .unwrap();

        let (columns, rows) = store
            .execute_query(
                "SELECT track_id, license_plate FROM detections \
                 WHERE license_plate != '' ORDER BY track_id",
            )
            .unwrap();
        assert_eq!(columns, vec!["track_id", "license_plate"]);
        assert_eq!(rows, vec![vec!["1".to_string(), "AB123".to_string()]]);
    }

    #[test]
    fn execute_query_refuses_writes() {
        let mut store = EventStore::open_in_memory().unwrap();
        store.replace_all(&[event(1, 0, "AB123")]).unwrap();

        assert!(store.execute_query("DELETE FROM detections").is_err());
        assert!(store
            .execute_query("INSERT INTO detections VALUES (1)")
            .is_err());
        // A writable CTE starts with WITH but must still be refused.
        assert!(store
            .execute_query("WITH x AS (SELECT 1) DELETE FROM detections")
            .is_err());
        assert_eq!(store.count_events().unwrap(), 1);

        assert!(store
            .execute_query("  with x as (select 1) select * from x")
            .is_ok());
    }

    #[test]
    fn statistics_cover_the_run() {
        let mut store = EventStore::open_in_memory().unwrap();
        let mut truck = event(3, 10, "");
        truck.label = "truck".into();
        truck.color = "blue".into();
        store
            .replace_all(&[event(1, 0, "AB123"), event(1, 5, "AB123"), truck])
            .unwrap();

        let stats = store.get_statistics().unwrap();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.unique_tracks, 2);
        assert_eq!(stats.plates_recognized, 1);
        assert!((stats.video_span_secs - 10.0 / 30.0).abs() < 1e-9);
        assert_eq!(stats.by_label[0], ("car".to_string(), 2));
        assert!(stats.by_color.contains(&("blue".to_string(), 1)));
    }
}
