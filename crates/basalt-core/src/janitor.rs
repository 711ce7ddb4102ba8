//! The lifecycle janitor.
//!
//! A single periodic background task. Each pass walks every bucket's
//! enabled lifecycle rules, expires current versions past their age,
//! trims non-current versions by age and keep-count, and aborts multipart
//! uploads older than the configured threshold. One rule's failure is
//! logged and never aborts the pass; a new tick is skipped while the
//! previous pass is still running.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use basalt_index::IndexError;
use basalt_model::lifecycle::{LifecycleConfiguration, LifecycleRule, RuleStatus};
use basalt_model::types::{BucketConfigKind, BucketRecord, ObjectVersion};

use crate::metrics::Metrics;
use crate::multipart;
use crate::ops::object::{DeleteOutcome, delete_current, delete_specific};
use crate::state::ServiceState;

/// What one pass accomplished.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassSummary {
    /// Current versions expired (delete-marker or removal).
    pub expired_objects: usize,
    /// Non-current versions removed.
    pub expired_versions: usize,
    /// Multipart uploads garbage-collected.
    pub aborted_uploads: usize,
    /// Rules or entries that failed.
    pub errors: usize,
}

/// Run the janitor until the process exits, one pass per configured
/// interval. Single-flight: a tick that fires while a pass is running is
/// skipped.
pub async fn run(state: Arc<ServiceState>) {
    let mut ticker =
        tokio::time::interval(Duration::from_secs(state.config.janitor_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so startup stays quick.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if state
            .janitor_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("previous janitor pass still running, skipping tick");
            continue;
        }
        let summary = run_pass(&state, Utc::now()).await;
        state.janitor_running.store(false, Ordering::Release);
        info!(
            expired_objects = summary.expired_objects,
            expired_versions = summary.expired_versions,
            aborted_uploads = summary.aborted_uploads,
            errors = summary.errors,
            "janitor pass finished"
        );
    }
}

/// Run one pass against the clock value `now` (parameterized so tests can
/// move time).
pub async fn run_pass(state: &ServiceState, now: DateTime<Utc>) -> PassSummary {
    let mut summary = PassSummary::default();

    let buckets = match state.index.list_buckets(None) {
        Ok(buckets) => buckets,
        Err(e) => {
            warn!(error = %e, "janitor cannot enumerate buckets");
            summary.errors += 1;
            return summary;
        }
    };

    for (bucket_name, _) in buckets {
        let record = match state.index.get_bucket(&bucket_name) {
            Ok(record) => record,
            Err(e) => {
                warn!(bucket = %bucket_name, error = %e, "janitor cannot read bucket");
                summary.errors += 1;
                continue;
            }
        };
        let config = match lifecycle_for(state, &bucket_name) {
            Ok(config) => config,
            Err(e) => {
                warn!(bucket = %bucket_name, error = %e, "janitor cannot read lifecycle");
                summary.errors += 1;
                continue;
            }
        };
        let Some(config) = config else { continue };

        for rule in config.rules.iter().filter(|r| r.status == RuleStatus::Enabled) {
            apply_rule(state, &record, rule, now, &mut summary).await;
        }
    }

    collect_stale_uploads(state, now, &mut summary).await;

    Metrics::incr(&state.metrics.janitor_passes_total);
    Metrics::add(
        &state.metrics.janitor_expired_total,
        (summary.expired_objects + summary.expired_versions) as u64,
    );
    summary
}

fn lifecycle_for(
    state: &ServiceState,
    bucket: &str,
) -> Result<Option<LifecycleConfiguration>, IndexError> {
    match state
        .index
        .get_bucket_config(bucket, BucketConfigKind::Lifecycle)
    {
        Ok(document) => {
            let config = serde_json::from_str(&document)
                .map_err(|e| IndexError::Corrupt(format!("lifecycle: {e}")))?;
            Ok(Some(config))
        }
        Err(IndexError::NoSuchConfig(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn apply_rule(
    state: &ServiceState,
    record: &BucketRecord,
    rule: &LifecycleRule,
    now: DateTime<Utc>,
    summary: &mut PassSummary,
) {
    if rule.expiration_days.is_some() {
        expire_current_versions(state, record, rule, now, summary).await;
    }
    if rule.noncurrent_days.is_some() || rule.newer_noncurrent_versions.is_some() {
        expire_noncurrent_versions(state, record, rule, now, summary).await;
    }
}

/// Current-version expiration: delete (with orchestrator semantics, so a
/// versioned bucket gets a delete marker) every matching object older than
/// the rule's age.
async fn expire_current_versions(
    state: &ServiceState,
    record: &BucketRecord,
    rule: &LifecycleRule,
    now: DateTime<Utc>,
    summary: &mut PassSummary,
) {
    let Some(days) = rule.expiration_days else {
        return;
    };
    let cutoff = now - chrono::Duration::days(i64::from(days));

    let mut marker = String::new();
    loop {
        let page = match state
            .index
            .list_objects(&record.name, &rule.prefix, "", &marker, 1000)
        {
            Ok(page) => page,
            Err(e) => {
                warn!(bucket = %record.name, error = %e, "janitor listing failed");
                summary.errors += 1;
                return;
            }
        };

        for object in &page.objects {
            if object.last_modified >= cutoff || !rule.matches(&object.key, &object.tags) {
                continue;
            }
            match delete_current(state, record, &object.key, record.owner.clone()).await {
                Ok(DeleteOutcome::NothingToDo) => {}
                Ok(_) => {
                    debug!(bucket = %record.name, key = %object.key, "expired current version");
                    summary.expired_objects += 1;
                }
                Err(e) => {
                    warn!(bucket = %record.name, key = %object.key, error = %e, "expiration failed");
                    summary.errors += 1;
                }
            }
        }

        match page.next_marker {
            Some(next) if page.is_truncated => marker = next,
            _ => break,
        }
    }
}

/// Non-current expiration: group versions by key, newest first, skip the
/// latest, and expire the rest by age and/or keep-count.
async fn expire_noncurrent_versions(
    state: &ServiceState,
    record: &BucketRecord,
    rule: &LifecycleRule,
    now: DateTime<Utc>,
    summary: &mut PassSummary,
) {
    // Collect every version under the prefix; paging keeps memory bounded
    // per key group rather than per bucket.
    let mut by_key: BTreeMap<String, Vec<ObjectVersion>> = BTreeMap::new();
    let mut key_marker = String::new();
    let mut version_marker = String::new();
    loop {
        let page = match state.index.list_versions(
            &record.name,
            &rule.prefix,
            "",
            &key_marker,
            &version_marker,
            1000,
        ) {
            Ok(page) => page,
            Err(e) => {
                warn!(bucket = %record.name, error = %e, "janitor version listing failed");
                summary.errors += 1;
                return;
            }
        };
        for version in page.versions {
            by_key.entry(version.key.clone()).or_default().push(version);
        }
        if !page.is_truncated {
            break;
        }
        key_marker = page.next_key_marker.unwrap_or_default();
        version_marker = page.next_version_id_marker.unwrap_or_default();
    }

    let age_cutoff = rule
        .noncurrent_days
        .map(|days| now - chrono::Duration::days(i64::from(days)));
    let keep = rule.newer_noncurrent_versions.map(|n| n as usize);

    for (key, mut versions) in by_key {
        versions.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        // Index 0 is the current version; the rest are non-current, newest
        // first.
        for (noncurrent_index, version) in versions.iter().skip(1).enumerate() {
            let past_age = age_cutoff.is_some_and(|cutoff| version.last_modified < cutoff);
            let past_count = keep.is_some_and(|keep| noncurrent_index >= keep);
            let expire = match (age_cutoff.is_some(), keep.is_some()) {
                (true, true) => past_age && past_count,
                (true, false) => past_age,
                (false, true) => past_count,
                (false, false) => false,
            };
            if !expire {
                continue;
            }
            match delete_specific(state, &record.name, &key, &version.version_id).await {
                Ok(_) => {
                    debug!(
                        bucket = %record.name,
                        key = %key,
                        version_id = %version.version_id,
                        "expired non-current version"
                    );
                    summary.expired_versions += 1;
                }
                Err(e) => {
                    warn!(bucket = %record.name, key = %key, error = %e, "version expiration failed");
                    summary.errors += 1;
                }
            }
        }
    }
}

/// Abort multipart uploads older than the configured threshold.
async fn collect_stale_uploads(
    state: &ServiceState,
    now: DateTime<Utc>,
    summary: &mut PassSummary,
) {
    let cutoff = now
        - chrono::Duration::seconds(i64::try_from(state.config.multipart_abort_secs).unwrap_or(0));
    let stale = match state.index.uploads_initiated_before(cutoff) {
        Ok(stale) => stale,
        Err(e) => {
            warn!(error = %e, "janitor cannot enumerate stale uploads");
            summary.errors += 1;
            return;
        }
    };
    for upload in stale {
        match multipart::abort(state, &upload.upload_id).await {
            Ok(()) => {
                debug!(upload_id = %upload.upload_id, "aborted stale multipart upload");
                summary.aborted_uploads += 1;
            }
            Err(e) => {
                warn!(upload_id = %upload.upload_id, error = %e, "stale upload abort failed");
                summary.errors += 1;
            }
        }
    }
}
