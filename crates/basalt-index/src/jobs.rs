//! The batch job table and its status state machine.
//!
//! Only the bookkeeping lives here; the workers that interpret manifests
//! are a separate concern. Status transitions are validated against
//! [`BatchJobStatus::can_transition_to`] inside the update transaction, so
//! two racing updaters cannot both move a job out of the same state.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

use basalt_model::types::{BatchJob, BatchJobStatus, JobProgress};

use crate::error::{IndexError, IndexResult};
use crate::store::{Index, json_from_sql, json_to_sql, ts_from_sql, ts_to_sql};

struct RawJob {
    id: String,
    operation_type: String,
    parameters: String,
    manifest_location: String,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    failure_reasons: String,
    progress_total: i64,
    progress_processed: i64,
    progress_failed: i64,
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<RawJob> {
    Ok(RawJob {
        id: row.get(0)?,
        operation_type: row.get(1)?,
        parameters: row.get(2)?,
        manifest_location: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        completed_at: row.get(6)?,
        failure_reasons: row.get(7)?,
        progress_total: row.get(8)?,
        progress_processed: row.get(9)?,
        progress_failed: row.get(10)?,
    })
}

#[allow(clippy::cast_sign_loss)]
fn decode_job(raw: RawJob) -> IndexResult<BatchJob> {
    Ok(BatchJob {
        status: BatchJobStatus::from_str(&raw.status)
            .map_err(|e| IndexError::Corrupt(e.to_string()))?,
        created_at: ts_from_sql(&raw.created_at)?,
        completed_at: raw.completed_at.as_deref().map(ts_from_sql).transpose()?,
        parameters: json_from_sql(&raw.parameters)?,
        failure_reasons: json_from_sql(&raw.failure_reasons)?,
        progress: JobProgress {
            total: raw.progress_total as u64,
            processed: raw.progress_processed as u64,
            failed: raw.progress_failed as u64,
        },
        id: raw.id,
        operation_type: raw.operation_type,
        manifest_location: raw.manifest_location,
    })
}

const JOB_COLUMNS: &str = "id, operation_type, parameters, manifest_location, status, \
     created_at, completed_at, failure_reasons, progress_total, progress_processed, \
     progress_failed";

impl Index {
    /// Insert a new batch job.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    #[allow(clippy::cast_possible_wrap)]
    pub fn create_job(&self, job: &BatchJob) -> IndexResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO batch_jobs
                 (id, operation_type, parameters, manifest_location, status, created_at,
                  completed_at, failure_reasons, progress_total, progress_processed,
                  progress_failed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.operation_type,
                json_to_sql(&job.parameters)?,
                job.manifest_location,
                job.status.as_str(),
                ts_to_sql(job.created_at),
                job.completed_at.map(ts_to_sql),
                json_to_sql(&job.failure_reasons)?,
                job.progress.total as i64,
                job.progress.processed as i64,
                job.progress.failed as i64,
            ],
        )?;
        info!(job_id = %job.id, operation = %job.operation_type, "batch job created");
        Ok(())
    }

    /// Fetch one job.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchJob`] when absent.
    pub fn get_job(&self, id: &str) -> IndexResult<BatchJob> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM batch_jobs WHERE id = ?1"),
                params![id],
                job_from_row,
            )
            .optional()?
            .ok_or_else(|| IndexError::NoSuchJob(id.to_owned()))?;
        decode_job(raw)
    }

    /// List jobs, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn list_jobs(&self, status: Option<BatchJobStatus>) -> IndexResult<Vec<BatchJob>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM batch_jobs
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![status.map(|s| s.as_str())], job_from_row)?;
        let mut jobs = Vec::new();
        for raw in rows {
            jobs.push(decode_job(raw?)?);
        }
        Ok(jobs)
    }

    /// Move a job to a new status, optionally recording a failure reason.
    /// Terminal transitions stamp `completed_at`.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchJob`] or [`IndexError::InvalidJobTransition`].
    pub fn update_job_status(
        &self,
        id: &str,
        next: BatchJobStatus,
        failure_reason: Option<&str>,
    ) -> IndexResult<BatchJob> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let raw = tx
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM batch_jobs WHERE id = ?1"),
                params![id],
                job_from_row,
            )
            .optional()?
            .ok_or_else(|| IndexError::NoSuchJob(id.to_owned()))?;
        let mut job = decode_job(raw)?;

        if !job.status.can_transition_to(next) {
            return Err(IndexError::InvalidJobTransition {
                from: job.status.as_str(),
                to: next.as_str(),
            });
        }

        if let Some(reason) = failure_reason {
            job.failure_reasons.push(reason.to_owned());
        }
        let completed_at = if next.is_terminal() {
            Some(Utc::now())
        } else {
            None
        };

        tx.execute(
            "UPDATE batch_jobs
             SET status = ?2, completed_at = ?3, failure_reasons = ?4
             WHERE id = ?1",
            params![
                id,
                next.as_str(),
                completed_at.map(ts_to_sql),
                json_to_sql(&job.failure_reasons)?,
            ],
        )?;
        tx.commit()?;

        info!(job_id = %id, from = job.status.as_str(), to = next.as_str(), "batch job transition");
        job.status = next;
        job.completed_at = completed_at;
        Ok(job)
    }

    /// Update a job's progress counters.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchJob`] when absent.
    #[allow(clippy::cast_possible_wrap)]
    pub fn update_job_progress(&self, id: &str, progress: JobProgress) -> IndexResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE batch_jobs
             SET progress_total = ?2, progress_processed = ?3, progress_failed = ?4
             WHERE id = ?1",
            params![
                id,
                progress.total as i64,
                progress.processed as i64,
                progress.failed as i64,
            ],
        )?;
        if changed == 0 {
            return Err(IndexError::NoSuchJob(id.to_owned()));
        }
        Ok(())
    }

    /// Delete a job row.
    ///
    /// # Errors
    ///
    /// [`IndexError::NoSuchJob`] when absent.
    pub fn delete_job(&self, id: &str) -> IndexResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM batch_jobs WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(IndexError::NoSuchJob(id.to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> BatchJob {
        BatchJob {
            id: id.to_owned(),
            operation_type: "S3PutObjectCopy".to_owned(),
            parameters: serde_json::json!({"targetBucket": "b2"}),
            manifest_location: "b1/manifests/jobs.csv".to_owned(),
            status: BatchJobStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            failure_reasons: Vec::new(),
            progress: JobProgress::default(),
        }
    }

    #[test]
    fn test_should_create_and_fetch_job() {
        let index = Index::open_in_memory().expect("open");
        index.create_job(&job("j1")).expect("create");

        let fetched = index.get_job("j1").expect("get");
        assert_eq!(fetched.status, BatchJobStatus::Pending);
        assert_eq!(fetched.parameters["targetBucket"], "b2");
        assert!(fetched.completed_at.is_none());
    }

    #[test]
    fn test_should_walk_the_status_machine() {
        let index = Index::open_in_memory().expect("open");
        index.create_job(&job("j1")).expect("create");

        index
            .update_job_status("j1", BatchJobStatus::Ready, None)
            .expect("ready");
        index
            .update_job_status("j1", BatchJobStatus::Active, None)
            .expect("active");
        index
            .update_job_status("j1", BatchJobStatus::Paused, None)
            .expect("paused");
        index
            .update_job_status("j1", BatchJobStatus::Active, None)
            .expect("resume");
        let done = index
            .update_job_status("j1", BatchJobStatus::Complete, None)
            .expect("complete");
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn test_should_reject_illegal_transitions() {
        let index = Index::open_in_memory().expect("open");
        index.create_job(&job("j1")).expect("create");

        // Pending cannot jump straight to Active.
        assert!(matches!(
            index.update_job_status("j1", BatchJobStatus::Active, None),
            Err(IndexError::InvalidJobTransition { .. })
        ));

        index
            .update_job_status("j1", BatchJobStatus::Cancelled, None)
            .expect("cancel");
        // Terminal states are final.
        assert!(matches!(
            index.update_job_status("j1", BatchJobStatus::Ready, None),
            Err(IndexError::InvalidJobTransition { .. })
        ));
    }

    #[test]
    fn test_should_accumulate_failure_reasons() {
        let index = Index::open_in_memory().expect("open");
        index.create_job(&job("j1")).expect("create");
        index
            .update_job_status("j1", BatchJobStatus::Ready, None)
            .expect("ready");
        let failed = index
            .update_job_status("j1", BatchJobStatus::Failed, Some("manifest unreadable"))
            .expect("fail");
        assert_eq!(failed.failure_reasons, vec!["manifest unreadable"]);
    }

    #[test]
    fn test_should_update_progress_counters() {
        let index = Index::open_in_memory().expect("open");
        index.create_job(&job("j1")).expect("create");
        index
            .update_job_progress(
                "j1",
                JobProgress {
                    total: 100,
                    processed: 40,
                    failed: 2,
                },
            )
            .expect("progress");
        let fetched = index.get_job("j1").expect("get");
        assert_eq!(fetched.progress.processed, 40);
        assert_eq!(fetched.progress.failed, 2);
    }

    #[test]
    fn test_should_list_jobs_filtered_by_status() {
        let index = Index::open_in_memory().expect("open");
        index.create_job(&job("j1")).expect("create");
        index.create_job(&job("j2")).expect("create");
        index
            .update_job_status("j2", BatchJobStatus::Ready, None)
            .expect("ready");

        let pending = index
            .list_jobs(Some(BatchJobStatus::Pending))
            .expect("list");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "j1");

        assert_eq!(index.list_jobs(None).expect("list").len(), 2);
    }

    #[test]
    fn test_should_delete_job() {
        let index = Index::open_in_memory().expect("open");
        index.create_job(&job("j1")).expect("create");
        index.delete_job("j1").expect("delete");
        assert!(matches!(index.get_job("j1"), Err(IndexError::NoSuchJob(_))));
        assert!(matches!(
            index.delete_job("j1"),
            Err(IndexError::NoSuchJob(_))
        ));
    }
}
