//! Notification event emission.
//!
//! After a successful write or delete the orchestrator matches the event
//! against the bucket's notification configuration. Matching events are
//! emitted to the structured log and counted; delivering to real queue or
//! topic transports is a separate concern behind the stored ARN.

use tracing::info;

use basalt_model::notification::NotificationConfiguration;
use basalt_model::types::BucketConfigKind;

use crate::metrics::Metrics;
use crate::state::ServiceState;

/// `PutObject` completed.
pub const OBJECT_CREATED_PUT: &str = "s3:ObjectCreated:Put";
/// `CopyObject` completed.
pub const OBJECT_CREATED_COPY: &str = "s3:ObjectCreated:Copy";
/// `CompleteMultipartUpload` completed.
pub const OBJECT_CREATED_COMPLETE_MULTIPART: &str =
    "s3:ObjectCreated:CompleteMultipartUpload";
/// An object or version was removed.
pub const OBJECT_REMOVED_DELETE: &str = "s3:ObjectRemoved:Delete";
/// A delete marker was created.
pub const OBJECT_REMOVED_DELETE_MARKER: &str =
    "s3:ObjectRemoved:DeleteMarkerCreated";

/// Emit `event_type` for `key` to every matching target of the bucket's
/// notification configuration. Failures are swallowed: notification is
/// best-effort and never fails the request that triggered it.
pub fn emit(state: &ServiceState, bucket: &str, event_type: &str, key: &str) {
    let Ok(document) = state
        .index
        .get_bucket_config(bucket, BucketConfigKind::Notification)
    else {
        return;
    };
    let Ok(config) = serde_json::from_str::<NotificationConfiguration>(&document) else {
        return;
    };

    for target in config.targets() {
        if target.matches(event_type, key) {
            info!(
                bucket,
                key,
                event = event_type,
                target = %target.arn,
                "notification event"
            );
            Metrics::incr(&state.metrics.notifications_total);
        }
    }
}
