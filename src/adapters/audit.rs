use crate::domain::model::Role;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only action log kept next to the tracing output.
///
/// Write failures are reported through `tracing` and swallowed: an operation
/// never fails because its audit line could not be written.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn server(log_dir: impl AsRef<Path>, market: &str) -> Self {
        Self {
            path: Some(log_dir.as_ref().join(format!("{}_Server.log", market))),
        }
    }

    pub fn client(log_dir: impl AsRef<Path>, role: Role, user_id: &str) -> Self {
        Self {
            path: Some(
                log_dir
                    .as_ref()
                    .join(format!("{}_{}_Client.log", role.label(), user_id)),
            ),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// `[ts] Purchase Share | Params: ... | Status: Successfully Completed`
    pub async fn record(&self, action: &str, params: &str, success: bool) {
        let status = if success {
            "Successfully Completed"
        } else {
            "Failed"
        };
        self.append(&format!("{} | Params: {} | Status: {}", action, params, status))
            .await;
    }

    /// `[ts] purchaseShare | Response: ...`
    pub async fn record_response(&self, method: &str, response: &str) {
        self.append(&format!("{} | Response: {}", method, response)).await;
    }

    async fn append(&self, entry: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        let line = format!("[{}] {}\n", timestamp, entry);

        if let Err(e) = Self::write_line(path, &line).await {
            tracing::warn!("Failed to write audit log {}: {}", path.display(), e);
        }
    }

    async fn write_line(path: &Path, line: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
