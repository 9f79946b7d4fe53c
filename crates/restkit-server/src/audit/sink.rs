//! Audit sinks

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use super::models::{AuditCategory, AuditRecord};

/// Destination for audit records
///
/// Sinks must not fail the request: write errors are logged and dropped.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Emits records as tracing events on the `restkit::audit` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        let data = record.data.as_ref().map(|d| d.to_string());
        match record.category {
            AuditCategory::Error => tracing::warn!(
                target: "restkit::audit",
                category = %record.category,
                request_id = ?record.request_id,
                method = %record.method,
                path = %record.path,
                status = record.status,
                reply_message = record.message.as_deref(),
                data = data.as_deref(),
                "Request failed"
            ),
            AuditCategory::Response => tracing::info!(
                target: "restkit::audit",
                category = %record.category,
                request_id = ?record.request_id,
                method = %record.method,
                path = %record.path,
                status = record.status,
                reply_message = record.message.as_deref(),
                "Request completed"
            ),
            AuditCategory::Request => tracing::info!(
                target: "restkit::audit",
                category = %record.category,
                method = %record.method,
                path = %record.path,
                ip = record.ip_address.as_deref(),
                user_agent = record.user_agent.as_deref(),
                "Request received"
            ),
        }
    }
}

/// Writes JSON lines into one daily-rotated file per category
///
/// Files are named `<category>.<date>.log` under the configured directory.
pub struct FileAuditSink {
    dir: PathBuf,
    writers: HashMap<AuditCategory, Mutex<RollingFileAppender>>,
}

impl FileAuditSink {
    pub fn new(dir: impl AsRef<Path>) -> restkit_common::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let mut writers = HashMap::new();
        for category in AuditCategory::ALL {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(category.as_str())
                .filename_suffix("log")
                .build(&dir)
                .map_err(std::io::Error::other)?;
            writers.insert(category, Mutex::new(appender));
        }

        tracing::info!(dir = %dir.display(), "File audit sink initialized");
        Ok(Self { dir, writers })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, record: &AuditRecord) {
        let Some(writer) = self.writers.get(&record.category) else {
            return;
        };

        let mut line = match serde_json::to_vec(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize audit record");
                return;
            },
        };
        line.push(b'\n');

        let mut writer = writer.lock();
        if let Err(e) = writer.write_all(&line).and_then(|_| writer.flush()) {
            tracing::error!(
                error = %e,
                category = %record.category,
                "Failed to write audit record"
            );
        }
    }
}
