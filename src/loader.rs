//! loader.rs — Bulk import of the video feed from JSON.
//!
//! Accepts either a top-level array of videos or an object with a `videos`
//! array. Each video may carry a `snapshots` array. Malformed entries are
//! skipped, videos already in the store are left alone, and each video is
//! written inside its own savepoint so one bad record never loses a batch.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Transaction};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::database::Database;

/// Storage format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const COUNTERS: &[&str] = &["views_count", "likes_count", "comments_count", "reports_count"];
const DELTA_COUNTERS: &[&str] = &[
    "delta_views_count",
    "delta_likes_count",
    "delta_comments_count",
    "delta_reports_count",
];

/// Outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub videos: usize,
    pub snapshots: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Database {
    pub fn load_json_file(&self, path: &Path, batch_size: usize) -> Result<LoadReport> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let document: Value = serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        self.load_json(&document, batch_size)
    }

    pub fn load_json(&self, document: &Value, batch_size: usize) -> Result<LoadReport> {
        let videos = video_list(document)?;
        info!("Importing {} video entries", videos.len());

        let batch_size = batch_size.max(1);
        let mut conn = self.connect()?;
        let mut report = LoadReport::default();
        let mut tx = conn.transaction()?;

        for (index, entry) in videos.iter().enumerate() {
            let Some(video) = entry.as_object() else {
                warn!(index, "skipping entry: not an object");
                report.skipped += 1;
                continue;
            };
            let Some(video_id) = video.get("id").and_then(id_string) else {
                warn!(index, "skipping entry: no id");
                report.skipped += 1;
                continue;
            };

            if video_exists(&tx, &video_id)? {
                report.duplicates += 1;
                if report.duplicates <= 5 {
                    warn!(video_id = %video_id, "video already exists, skipping");
                }
                continue;
            }

            let sp = tx.savepoint()?;
            match insert_video(&sp, &video_id, video) {
                Ok(snapshots) => {
                    sp.commit()?;
                    report.videos += 1;
                    report.snapshots += snapshots;
                }
                Err(err) => {
                    // dropping the savepoint rolls this video back
                    drop(sp);
                    warn!(index, video_id = %video_id, error = %err, "failed to import video");
                    report.failed += 1;
                    continue;
                }
            }

            if report.videos % batch_size == 0 {
                tx.commit()?;
                tx = conn.transaction()?;
                info!(
                    "Imported {} videos and {} snapshots so far",
                    report.videos, report.snapshots
                );
            }
        }

        tx.commit()?;
        info!(?report, "JSON import finished");
        Ok(report)
    }
}

fn video_list(document: &Value) -> Result<&Vec<Value>> {
    match document {
        Value::Array(items) => Ok(items),
        Value::Object(map) => match map.get("videos") {
            Some(Value::Array(items)) => Ok(items),
            _ => {
                let keys: Vec<&String> = map.keys().collect();
                bail!("JSON object has no `videos` array (keys: {keys:?})")
            }
        },
        other => bail!("Unsupported JSON layout: expected array or object, got {other}"),
    }
}

fn video_exists(tx: &Transaction<'_>, video_id: &str) -> rusqlite::Result<bool> {
    let mut stmt = tx.prepare_cached("SELECT 1 FROM videos WHERE id = ?1")?;
    stmt.exists(params![video_id])
}

/// Insert one video and its snapshots. Returns the number of new snapshots.
fn insert_video(conn: &rusqlite::Connection, video_id: &str, video: &Map<String, Value>) -> Result<usize> {
    let creator_id = video
        .get("creator_id")
        .and_then(id_string)
        .unwrap_or_else(|| "unknown".to_string());
    let counters = read_counters(video, COUNTERS)?;

    conn.execute(
        "INSERT INTO videos
         (id, creator_id, video_created_at, views_count, likes_count,
          comments_count, reports_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            video_id,
            creator_id,
            timestamp_field(video, "video_created_at"),
            counters[0],
            counters[1],
            counters[2],
            counters[3],
            timestamp_field(video, "created_at"),
            timestamp_field(video, "updated_at"),
        ],
    )?;

    let Some(snapshots) = video.get("snapshots").and_then(Value::as_array) else {
        return Ok(0);
    };

    let mut inserted = 0;
    for (j, entry) in snapshots.iter().enumerate() {
        let Some(snapshot) = entry.as_object() else {
            continue;
        };
        let snapshot_id = snapshot
            .get("id")
            .and_then(id_string)
            .unwrap_or_else(|| format!("snap_{video_id}_{j}"));
        let counters = read_counters(snapshot, COUNTERS)?;
        let deltas = read_counters(snapshot, DELTA_COUNTERS)?;

        inserted += conn.execute(
            "INSERT OR IGNORE INTO video_snapshots
             (id, video_id, views_count, likes_count, comments_count, reports_count,
              delta_views_count, delta_likes_count, delta_comments_count, delta_reports_count,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                snapshot_id,
                video_id,
                counters[0],
                counters[1],
                counters[2],
                counters[3],
                deltas[0],
                deltas[1],
                deltas[2],
                deltas[3],
                timestamp_field(snapshot, "created_at"),
                timestamp_field(snapshot, "updated_at"),
            ],
        )?;
    }
    Ok(inserted)
}

/// Ids arrive as strings or numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn read_counters(object: &Map<String, Value>, keys: &[&str]) -> Result<[i64; 4]> {
    let mut out = [0i64; 4];
    for (slot, key) in out.iter_mut().zip(keys) {
        *slot = counter(object.get(*key)).with_context(|| format!("bad value for `{key}`"))?;
    }
    Ok(out)
}

/// Missing or null → 0; numbers and numeric strings are accepted.
fn counter(value: Option<&Value>) -> Result<i64> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .context("number out of range"),
        Some(Value::String(s)) => Ok(s.trim().parse::<i64>()?),
        Some(other) => bail!("expected a number, got {other}"),
    }
}

fn timestamp_field(object: &Map<String, Value>, key: &str) -> String {
    let raw = object.get(key).and_then(Value::as_str);
    parse_timestamp(raw)
        .unwrap_or_else(|| {
            if let Some(raw) = raw {
                warn!(field = key, value = raw, "unparseable timestamp, using current time");
            }
            Utc::now().naive_utc()
        })
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Parse a feed timestamp into naive UTC. Offsets are converted to UTC.
pub fn parse_timestamp(raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
