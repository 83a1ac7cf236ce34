//! Bulk message pipeline.
//!
//! Reads a spreadsheet (CSV) of recipients and sends one static message
//! per row, sequentially, with a fixed inter-send delay as a crude rate
//! limit. Unlike a fire-and-forget loop, every row's outcome is collected
//! and returned to the caller.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::BridgeError;
use crate::protocol::ContactType;
use crate::Result;

use super::dispatcher::{Dispatcher, MessagePayload, OutboundRequest};

/// Tuning for the bulk pipeline.
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Pause between consecutive sends.
    pub send_delay: Duration,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            send_delay: Duration::from_secs(3),
        }
    }
}

/// One recipient row of the import file.
#[derive(Debug, Clone, Deserialize)]
struct BulkRow {
    contact_type: String,
    number: String,
}

/// Result of one row's send.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    /// 1-based row number in the import file.
    pub row: usize,
    pub contact_type: String,
    pub number: String,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate of a bulk run.
#[derive(Debug, Clone, Serialize)]
pub struct BulkSummary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    pub rows: Vec<RowOutcome>,
}

/// Run the bulk pipeline to completion.
///
/// Rows are parsed up front so a malformed file fails the whole request;
/// send failures are per-row and never abort the remaining rows.
pub async fn send_rows(
    dispatcher: &Dispatcher,
    config: &BulkConfig,
    session_id: &str,
    message: &str,
    file_path: &Path,
) -> Result<BulkSummary> {
    let rows = read_rows(file_path)?;
    let total = rows.len();
    info!(session_id, total, path = %file_path.display(), "bulk send started");

    let mut outcomes = Vec::with_capacity(total);
    for (index, row) in rows.into_iter().enumerate() {
        let outcome = send_one(dispatcher, session_id, message, index + 1, row).await;
        if let Some(error) = &outcome.error {
            warn!(session_id, row = outcome.row, error, "bulk row failed");
        }
        outcomes.push(outcome);

        if index + 1 < total {
            tokio::time::sleep(config.send_delay).await;
        }
    }

    let sent = outcomes.iter().filter(|o| o.sent).count();
    let summary = BulkSummary {
        total,
        sent,
        failed: total - sent,
        rows: outcomes,
    };
    info!(session_id, sent = summary.sent, failed = summary.failed, "bulk send finished");
    Ok(summary)
}

async fn send_one(
    dispatcher: &Dispatcher,
    session_id: &str,
    message: &str,
    row_number: usize,
    row: BulkRow,
) -> RowOutcome {
    let result = match row.contact_type.parse::<ContactType>() {
        Ok(contact_type) => {
            dispatcher
                .send(OutboundRequest {
                    session_id: session_id.to_string(),
                    contact_type,
                    contact_id: row.number.clone(),
                    payload: MessagePayload::Static {
                        text: message.to_string(),
                    },
                })
                .await
        }
        Err(e) => Err(e),
    };

    RowOutcome {
        row: row_number,
        contact_type: row.contact_type,
        number: row.number,
        sent: result.is_ok(),
        error: result.err().map(|e| e.to_string()),
    }
}

fn read_rows(path: &Path) -> Result<Vec<BulkRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| BridgeError::BulkFile(format!("{}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: BulkRow = record.map_err(|e| BridgeError::BulkFile(e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}
