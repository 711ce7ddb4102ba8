//! Typed notification configuration and event matching.
//!
//! Parsed from the `PutBucketNotificationConfiguration` XML and persisted
//! as a JSON document. After successful writes and deletes the orchestrator
//! matches the event against every target's event patterns and key filter
//! rules.

use serde::{Deserialize, Serialize};

/// One notification sink: a topic, queue, or lambda target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTarget {
    /// Optional configuration id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The destination ARN.
    pub arn: String,
    /// Event patterns (e.g. `s3:ObjectCreated:*`).
    pub events: Vec<String>,
    /// Key prefix filter rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_prefix: Option<String>,
    /// Key suffix filter rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_suffix: Option<String>,
}

impl NotificationTarget {
    /// Whether this target wants the given event for the given key.
    #[must_use]
    pub fn matches(&self, event_type: &str, key: &str) -> bool {
        let event_ok = self.events.iter().any(|pattern| {
            pattern
                .strip_suffix('*')
                .map_or(pattern == event_type, |prefix| event_type.starts_with(prefix))
        });
        if !event_ok {
            return false;
        }
        if let Some(prefix) = &self.filter_prefix {
            if !key.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(suffix) = &self.filter_suffix {
            if !key.ends_with(suffix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// The full notification configuration for a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfiguration {
    /// SNS topic targets.
    #[serde(default)]
    pub topics: Vec<NotificationTarget>,
    /// SQS queue targets.
    #[serde(default)]
    pub queues: Vec<NotificationTarget>,
    /// Lambda function targets.
    #[serde(default)]
    pub lambda_functions: Vec<NotificationTarget>,
}

impl NotificationConfiguration {
    /// Iterate over every configured target.
    pub fn targets(&self) -> impl Iterator<Item = &NotificationTarget> {
        self.topics
            .iter()
            .chain(self.queues.iter())
            .chain(self.lambda_functions.iter())
    }

    /// Whether no targets are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.queues.is_empty() && self.lambda_functions.is_empty()
    }
}
