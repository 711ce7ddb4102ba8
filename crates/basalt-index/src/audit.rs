//! The append-only audit log.
//!
//! Events are appended with a monotonically increasing sequence number;
//! queries page backwards (newest first) using the sequence as a keyset
//! continuation token. Truncation by timestamp is the only way rows leave
//! the table.

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use tracing::debug;

use basalt_model::types::AuditEvent;

use crate::error::{IndexError, IndexResult};
use crate::store::{Index, ts_from_sql, ts_to_sql};

/// Filters for an audit query; all optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Restrict to one bucket.
    pub bucket: Option<String>,
    /// Restrict to one principal display form.
    pub principal: Option<String>,
    /// Restrict to one event type.
    pub event_type: Option<String>,
}

struct RawEvent {
    seq: i64,
    event: AuditEvent,
    timestamp: String,
    additional: Option<String>,
}

#[allow(clippy::cast_sign_loss)]
fn event_from_row(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        seq: row.get(0)?,
        timestamp: row.get(2)?,
        additional: row.get(13)?,
        event: AuditEvent {
            id: row.get(1)?,
            timestamp: Utc::now(), // replaced after decoding
            event_type: row.get(3)?,
            principal: row.get(4)?,
            source_ip: row.get(5)?,
            user_agent: row.get(6)?,
            request_id: row.get(7)?,
            bucket: row.get(8)?,
            key: row.get(9)?,
            operation: row.get(10)?,
            status: row.get::<_, i64>(11)? as u16,
            error_message: row.get(12)?,
            additional_data: None,
        },
    })
}

fn decode_event(raw: RawEvent) -> IndexResult<(i64, AuditEvent)> {
    let mut event = raw.event;
    event.timestamp = ts_from_sql(&raw.timestamp)?;
    event.additional_data = raw
        .additional
        .as_deref()
        .map(|s| {
            serde_json::from_str(s)
                .map_err(|e| IndexError::Corrupt(format!("bad audit payload: {e}")))
        })
        .transpose()?;
    Ok((raw.seq, event))
}

const EVENT_COLUMNS: &str = "seq, id, timestamp, event_type, principal, source_ip, user_agent, \
     request_id, bucket, key, operation, status, error_message, additional_data";

impl Index {
    /// Append one audit event.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn append_audit(&self, event: &AuditEvent) -> IndexResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO audit_events
                 (id, timestamp, event_type, principal, source_ip, user_agent,
                  request_id, bucket, key, operation, status, error_message, additional_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                event.id,
                ts_to_sql(event.timestamp),
                event.event_type,
                event.principal,
                event.source_ip,
                event.user_agent,
                event.request_id,
                event.bucket,
                event.key,
                event.operation,
                i64::from(event.status),
                event.error_message,
                event
                    .additional_data
                    .as_ref()
                    .map(serde_json::Value::to_string),
            ],
        )?;
        Ok(())
    }

    /// Query audit events, newest first.
    ///
    /// `token` is the continuation token from a previous page; the second
    /// tuple element is the token for the next page, absent when the log
    /// is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure or a corrupt row.
    pub fn query_audit(
        &self,
        filter: &AuditFilter,
        limit: usize,
        token: Option<&str>,
    ) -> IndexResult<(Vec<AuditEvent>, Option<String>)> {
        let before_seq: i64 = match token {
            Some(token) => token
                .parse()
                .map_err(|_| IndexError::Corrupt(format!("bad audit token: {token}")))?,
            None => i64::MAX,
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM audit_events
             WHERE seq < ?1
               AND (?2 IS NULL OR bucket = ?2)
               AND (?3 IS NULL OR principal = ?3)
               AND (?4 IS NULL OR event_type = ?4)
             ORDER BY seq DESC
             LIMIT ?5"
        ))?;

        #[allow(clippy::cast_possible_wrap)]
        let rows = stmt.query_map(
            params![
                before_seq,
                filter.bucket,
                filter.principal,
                filter.event_type,
                limit as i64 + 1,
            ],
            event_from_row,
        )?;

        let mut events = Vec::new();
        let mut last_seq = None;
        let mut has_more = false;
        for raw in rows {
            if events.len() == limit {
                has_more = true;
                break;
            }
            let (seq, event) = decode_event(raw?)?;
            last_seq = Some(seq);
            events.push(event);
        }

        let next_token = if has_more {
            last_seq.map(|seq| seq.to_string())
        } else {
            None
        };
        Ok((events, next_token))
    }

    /// Delete events older than `cutoff`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn truncate_audit_before(&self, cutoff: DateTime<Utc>) -> IndexResult<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM audit_events WHERE timestamp < ?1",
            params![ts_to_sql(cutoff)],
        )?;
        if removed > 0 {
            debug!(removed, "truncated audit events");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(event_type: &str, bucket: Option<&str>, principal: &str) -> AuditEvent {
        AuditEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_owned(),
            principal: principal.to_owned(),
            source_ip: Some("127.0.0.1".to_owned()),
            user_agent: Some("aws-cli/2".to_owned()),
            request_id: "r1".to_owned(),
            bucket: bucket.map(str::to_owned),
            key: None,
            operation: event_type.to_owned(),
            status: 200,
            error_message: None,
            additional_data: None,
        }
    }

    #[test]
    fn test_should_return_events_newest_first() {
        let index = Index::open_in_memory().expect("open");
        for name in ["First", "Second", "Third"] {
            index
                .append_audit(&event(name, Some("b1"), "alice"))
                .expect("append");
        }

        let (events, token) = index
            .query_audit(&AuditFilter::default(), 10, None)
            .expect("query");
        let names: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(names, vec!["Third", "Second", "First"]);
        assert!(token.is_none());
    }

    #[test]
    fn test_should_paginate_with_continuation_token() {
        let index = Index::open_in_memory().expect("open");
        for i in 0..5 {
            index
                .append_audit(&event(&format!("Op{i}"), None, "alice"))
                .expect("append");
        }

        let (page1, token) = index
            .query_audit(&AuditFilter::default(), 2, None)
            .expect("page 1");
        assert_eq!(page1.len(), 2);
        let token = token.expect("token for more pages");

        let (page2, _token2) = index
            .query_audit(&AuditFilter::default(), 2, Some(&token))
            .expect("page 2");
        assert_eq!(page2.len(), 2);
        // No overlap between pages.
        assert_ne!(page1[1].event_type, page2[0].event_type);
    }

    #[test]
    fn test_should_filter_by_bucket_and_principal() {
        let index = Index::open_in_memory().expect("open");
        index
            .append_audit(&event("PutObject", Some("b1"), "alice"))
            .expect("append");
        index
            .append_audit(&event("PutObject", Some("b2"), "bob"))
            .expect("append");

        let filter = AuditFilter {
            bucket: Some("b1".to_owned()),
            ..AuditFilter::default()
        };
        let (events, _) = index.query_audit(&filter, 10, None).expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].principal, "alice");

        let filter = AuditFilter {
            principal: Some("bob".to_owned()),
            ..AuditFilter::default()
        };
        let (events, _) = index.query_audit(&filter, 10, None).expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].bucket.as_deref(), Some("b2"));
    }

    #[test]
    fn test_should_truncate_old_events() {
        let index = Index::open_in_memory().expect("open");
        let mut old = event("Ancient", None, "alice");
        old.timestamp = Utc::now() - Duration::days(30);
        index.append_audit(&old).expect("append old");
        index.append_audit(&event("Fresh", None, "alice")).expect("append");

        let removed = index
            .truncate_audit_before(Utc::now() - Duration::days(7))
            .expect("truncate");
        assert_eq!(removed, 1);

        let (events, _) = index
            .query_audit(&AuditFilter::default(), 10, None)
            .expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "Fresh");
    }
}
