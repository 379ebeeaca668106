//! Durable access log: one combined-log-format line per request.
//!
//! The request path never touches the filesystem. Lines go over a bounded
//! channel to a dedicated writer task; when the queue is full the line is
//! dropped and counted instead of stalling the response.

use std::path::Path;

use axum::http::{HeaderMap, Method, StatusCode, Uri, Version, header};
use metrics::counter;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{error, warn};

use super::error::InfraError;

const CLF_DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!(
    "[day]/[month repr:short]/[year]:[hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
);

/// Cloneable handle for enqueueing access log lines.
#[derive(Clone)]
pub struct AccessLog {
    tx: mpsc::Sender<String>,
}

impl AccessLog {
    /// Open the log file in append mode and start the writer task. The file
    /// must be openable before the server starts serving.
    pub async fn spawn(
        path: &Path,
        queue_capacity: usize,
    ) -> Result<(Self, JoinHandle<()>), InfraError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        let (tx, rx) = mpsc::channel(queue_capacity);
        let task = tokio::spawn(write_lines(file, rx));

        Ok((Self { tx }, task))
    }

    /// Enqueue a line without waiting. Full queue drops the line.
    pub fn record(&self, line: String) {
        match self.tx.try_send(line) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                counter!("bottega_access_log_dropped_total").increment(1);
                warn!(target: "bottega::access_log", "access log queue full, line dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(target: "bottega::access_log", "access log writer is gone, line dropped");
            }
        }
    }
}

async fn write_lines(mut file: File, mut rx: mpsc::Receiver<String>) {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        if let Err(err) = file.write_all(line.as_bytes()).await {
            error!(target: "bottega::access_log", error = %err, "failed to append access log line");
            continue;
        }
        if let Err(err) = file.flush().await {
            error!(target: "bottega::access_log", error = %err, "failed to flush access log");
        }
    }
}

/// Render one request/response pair in combined log format.
pub fn combined_line(
    remote: Option<&str>,
    method: &Method,
    uri: &Uri,
    version: Version,
    status: StatusCode,
    response_headers: &HeaderMap,
    referer: Option<&str>,
    user_agent: Option<&str>,
    now: OffsetDateTime,
) -> String {
    let remote = remote.unwrap_or("-");
    let date = now
        .format(CLF_DATE_FORMAT)
        .unwrap_or_else(|_| "-".to_string());
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let size = response_headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    let referer = referer.unwrap_or("-");
    let user_agent = user_agent.unwrap_or("-");

    format!(
        "{remote} - - [{date}] \"{method} {target} {version:?}\" {status} {size} \"{referer}\" \"{user_agent}\"",
        status = status.as_u16(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use time::macros::datetime;

    #[test]
    fn renders_combined_format() {
        let mut response_headers = HeaderMap::new();
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("512"));

        let line = combined_line(
            Some("203.0.113.7"),
            &Method::GET,
            &Uri::from_static("/products?cursor=abc"),
            Version::HTTP_11,
            StatusCode::OK,
            &response_headers,
            Some("http://example.com/"),
            Some("test-agent"),
            datetime!(2000-10-10 13:55:36 UTC),
        );

        assert_eq!(
            line,
            "203.0.113.7 - - [10/Oct/2000:13:55:36 +0000] \"GET /products?cursor=abc HTTP/1.1\" 200 512 \"http://example.com/\" \"test-agent\""
        );
    }

    #[test]
    fn missing_fields_render_as_dashes() {
        let line = combined_line(
            None,
            &Method::POST,
            &Uri::from_static("/cart"),
            Version::HTTP_11,
            StatusCode::INTERNAL_SERVER_ERROR,
            &HeaderMap::new(),
            None,
            None,
            datetime!(2000-10-10 13:55:36 UTC),
        );

        assert_eq!(
            line,
            "- - - [10/Oct/2000:13:55:36 +0000] \"POST /cart HTTP/1.1\" 500 - \"-\" \"-\""
        );
    }

    #[tokio::test]
    async fn writer_appends_enqueued_lines() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("access.log");

        let (log, task) = AccessLog::spawn(&path, 8).await.expect("spawn writer");
        log.record("first line".to_string());
        log.record("second line".to_string());
        drop(log);
        task.await.expect("writer task");

        let contents = tokio::fs::read_to_string(&path).await.expect("read log");
        assert_eq!(contents, "first line\nsecond line\n");
    }
}
