//! Inbox scan that turns dropped `.eml` files into unassigned leads.
//!
//! Only the `From:` and `Subject:` headers are read. Routing of leads to
//! clients is left to whoever works the admin surface.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shared::types::NewLead;
use sqlx::sqlite::SqlitePool;
use tracing::{error, info, warn};

use crate::database::leads as db_leads;
use crate::database::utils::{is_valid_email, sanitize_string, truncate_string};

pub const SOURCE: &str = "email";
const PROCESSED_SUFFIX: &str = "processed";
const REJECTED_SUFFIX: &str = "rejected";
const MAX_SUBJECT_CHARS: usize = 255;

/// Totals for one inbox scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub processed: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Sender and subject pulled from a message's header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub email: String,
    pub name: Option<String>,
    pub subject: Option<String>,
}

/// Parse the header block (everything before the first blank line).
///
/// Folded header lines are unfolded. `None` when there is no usable sender.
pub fn parse_message(raw: &str) -> Option<ParsedMessage> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let header = |name: &str| {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    };

    let (name, email) = parse_address(header("from")?)?;
    let subject = header("subject")
        .map(|s| truncate_string(&sanitize_string(s), MAX_SUBJECT_CHARS))
        .filter(|s| !s.is_empty());

    Some(ParsedMessage {
        email,
        name,
        subject,
    })
}

/// `Jane Doe <jane@example.com>`, `"Doe, Jane" <jane@example.com>` or a bare
/// address.
fn parse_address(value: &str) -> Option<(Option<String>, String)> {
    let (name, email) = match (value.rfind('<'), value.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = value[..open].trim().trim_matches('"').trim();
            let name = (!name.is_empty()).then(|| sanitize_string(name));
            (name, value[open + 1..close].trim())
        }
        _ => (None, value.trim()),
    };

    let email = sanitize_string(email).to_ascii_lowercase();
    is_valid_email(&email).then_some((name, email))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn is_pending(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
}

/// Scan `inbox` once. Per-file failures are logged and counted; only a
/// failure to read the directory itself is returned as an error.
pub async fn ingest_inbox(pool: &SqlitePool, inbox: &Path) -> Result<IngestReport> {
    let mut entries = tokio::fs::read_dir(inbox)
        .await
        .with_context(|| format!("Failed to read inbox {}", inbox.display()))?;

    let mut pending = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("Failed to list inbox")?
    {
        let path = entry.path();
        if is_pending(&path) {
            pending.push(path);
        }
    }
    pending.sort();

    let mut report = IngestReport::default();
    for path in pending {
        match ingest_file(pool, &path).await {
            Ok(true) => report.processed += 1,
            Ok(false) => report.rejected += 1,
            Err(e) => {
                error!("Failed to ingest {}: {:#}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    if report != IngestReport::default() {
        info!(
            "Email ingestion: {} processed, {} rejected, {} failed",
            report.processed, report.rejected, report.failed
        );
    }
    Ok(report)
}

/// `Ok(true)` when a lead was created, `Ok(false)` when the file was rejected.
async fn ingest_file(pool: &SqlitePool, path: &Path) -> Result<bool> {
    let raw = tokio::fs::read(path).await.context("Failed to read message")?;
    let raw = String::from_utf8_lossy(&raw);

    let Some(message) = parse_message(&raw) else {
        warn!("No usable sender in {}; rejecting", path.display());
        tokio::fs::rename(path, with_suffix(path, REJECTED_SUFFIX))
            .await
            .context("Failed to mark message rejected")?;
        return Ok(false);
    };

    let lead_id = db_leads::create_lead(
        pool,
        NewLead {
            client_id: None,
            email: message.email,
            name: message.name,
            subject: message.subject,
            source: SOURCE.to_string(),
        },
    )
    .await
    .context("Failed to insert lead")?;

    tokio::fs::rename(path, with_suffix(path, PROCESSED_SUFFIX))
        .await
        .context("Failed to mark message processed")?;

    info!("Lead {} created from {}", lead_id, path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    use crate::database::leads::{LeadFilter, LeadScope};
    use crate::database::open_database;

    #[test]
    fn parses_named_sender_and_subject() {
        let raw = "From: \"Doe, Jane\" <Jane@Example.com>\r\nSubject: Pricing\r\n question\r\n\r\nBody: ignored\r\n";
        let m = parse_message(raw).unwrap();
        assert_eq!(m.email, "jane@example.com");
        assert_eq!(m.name.as_deref(), Some("Doe, Jane"));
        assert_eq!(m.subject.as_deref(), Some("Pricing question"));
    }

    #[test]
    fn bare_address_has_no_name() {
        let m = parse_message("from: lead@example.org\n\n").unwrap();
        assert_eq!(m.email, "lead@example.org");
        assert_eq!(m.name, None);
        assert_eq!(m.subject, None);
    }

    #[test]
    fn headers_after_body_are_ignored() {
        assert_eq!(parse_message("Subject: hi\n\nFrom: x@example.com\n"), None);
    }

    #[test]
    fn garbage_sender_is_rejected() {
        assert_eq!(parse_message("From: not an address\n\n"), None);
    }

    #[tokio::test]
    async fn scan_creates_leads_and_renames_files() {
        let pool = open_database(":memory:").await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        std::fs::write(
            dir.path().join("a.eml"),
            "From: Ann <ann@example.com>\nSubject: Hello\n\nhi",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.eml"), "Subject: no sender\n\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "From: skip@example.com\n\n").unwrap();

        let report = assert_ok!(ingest_inbox(&pool, dir.path()).await);
        assert_eq!(
            report,
            IngestReport {
                processed: 1,
                rejected: 1,
                failed: 0
            }
        );

        assert!(dir.path().join("a.eml.processed").exists());
        assert!(dir.path().join("b.eml.rejected").exists());
        assert!(dir.path().join("notes.txt").exists());

        let filter = LeadFilter {
            status: None,
            limit: 10,
            offset: 0,
        };
        let leads = db_leads::list_leads(&pool, LeadScope::All, &filter)
            .await
            .unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].email, "ann@example.com");
        assert_eq!(leads[0].source, SOURCE);
        assert_eq!(leads[0].client_id, None);

        // Second scan finds nothing new.
        let again = ingest_inbox(&pool, dir.path()).await.unwrap();
        assert_eq!(again, IngestReport::default());
    }

    #[tokio::test]
    async fn missing_inbox_is_an_error() {
        let pool = open_database(":memory:").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(ingest_inbox(&pool, &dir.path().join("nope")).await.is_err());
    }
}
