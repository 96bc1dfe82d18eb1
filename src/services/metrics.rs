use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::warn;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS request_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    operation TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    success INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_request_log_timestamp ON request_log(timestamp);
"#;

/// Pipeline operations that are timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upload,
    Query,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::Query => "query",
        }
    }
}

/// Request latency log in SQLite. Recording never fails the caller.
pub struct MetricsStore {
    conn: Mutex<Connection>,
}

impl MetricsStore {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "auto_vacuum", "INCREMENTAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn record(&self, operation: Operation, latency_ms: u64, success: bool) {
        let Ok(conn) = self.conn.lock() else {
            return;
        };
        if let Err(e) = conn.execute(
            "INSERT INTO request_log (timestamp, operation, latency_ms, success)
             VALUES (datetime('now'), ?1, ?2, ?3)",
            params![operation.as_str(), latency_ms as i64, success as i32],
        ) {
            warn!(error = %e, "failed to record metrics");
        }
    }

    pub fn get_summary(&self, retention_days: u32) -> MetricsSummary {
        let Ok(conn) = self.conn.lock() else {
            return MetricsSummary::default();
        };
        let query = format!(
            r#"
            SELECT
                COUNT(*) as total_requests,
                COALESCE(SUM(CASE WHEN operation = 'upload' THEN 1 ELSE 0 END), 0) as uploads,
                COALESCE(SUM(CASE WHEN operation = 'query' THEN 1 ELSE 0 END), 0) as queries,
                COALESCE(AVG(latency_ms), 0) as avg_latency_ms,
                COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END) * 100.0 / NULLIF(COUNT(*), 0), 0) as error_rate
            FROM request_log
            WHERE timestamp >= datetime('now', '-{} days')
            "#,
            retention_days
        );

        conn.query_row(&query, [], |row| {
            Ok(MetricsSummary {
                total_requests: row.get::<_, i64>(0)? as u64,
                uploads: row.get::<_, i64>(1)? as u64,
                queries: row.get::<_, i64>(2)? as u64,
                avg_latency_ms: row.get::<_, f64>(3)? as u64,
                error_rate: row.get::<_, f64>(4)? as f32,
            })
        })
        .unwrap_or_default()
    }

    pub fn cleanup(&self, retention_days: u32) {
        let Ok(conn) = self.conn.lock() else {
            return;
        };
        let query = format!(
            "DELETE FROM request_log WHERE timestamp < datetime('now', '-{} days')",
            retention_days
        );
        let _ = conn.execute(&query, []);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub uploads: u64,
    pub queries: u64,
    pub avg_latency_ms: u64,
    pub error_rate: f32,
}
