//! Typed lifecycle configuration.
//!
//! Parsed from the `PutBucketLifecycleConfiguration` XML and persisted as a
//! JSON document; the janitor interprets it on every pass.

use serde::{Deserialize, Serialize};

use crate::types::Tag;

/// A bucket lifecycle configuration: an ordered list of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConfiguration {
    /// The rules, applied independently.
    pub rules: Vec<LifecycleRule>,
}

/// Whether a rule is applied by the janitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStatus {
    /// The janitor applies this rule.
    Enabled,
    /// The rule is kept but skipped.
    Disabled,
}

/// One lifecycle rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    /// Optional rule id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Enabled or Disabled.
    pub status: RuleStatus,
    /// Key prefix filter; empty matches every key.
    #[serde(default)]
    pub prefix: String,
    /// Optional tag filter; every tag must be present on the object.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Expire current versions older than this many days.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_days: Option<u32>,
    /// Expire non-current versions older than this many days.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noncurrent_days: Option<u32>,
    /// Keep at most this many newer non-current versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newer_noncurrent_versions: Option<u32>,
    /// Abort incomplete multipart uploads older than this many days.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_incomplete_days: Option<u32>,
}

impl LifecycleRule {
    /// Whether the rule's filter matches the given key and tag set.
    #[must_use]
    pub fn matches(&self, key: &str, tags: &[Tag]) -> bool {
        if !key.starts_with(&self.prefix) {
            return false;
        }
        self.tags.iter().all(|wanted| {
            tags.iter()
                .any(|t| t.key == wanted.key && t.value == wanted.value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(prefix: &str, tags: Vec<Tag>) -> LifecycleRule {
        LifecycleRule {
            id: None,
            status: RuleStatus::Enabled,
            prefix: prefix.to_owned(),
            tags,
            expiration_days: Some(1),
            noncurrent_days: None,
            newer_noncurrent_versions: None,
            abort_incomplete_days: None,
        }
    }

    #[test]
    fn test_should_match_by_prefix() {
        let r = rule("logs/", Vec::new());
        assert!(r.matches("logs/app.log", &[]));
        assert!(!r.matches("data/app.log", &[]));
    }

    #[test]
    fn test_should_match_empty_prefix() {
        let r = rule("", Vec::new());
        assert!(r.matches("anything", &[]));
    }

    #[test]
    fn test_should_require_all_filter_tags() {
        let r = rule(
            "",
            vec![Tag {
                key: "tier".to_owned(),
                value: "cold".to_owned(),
            }],
        );
        let matching = [Tag {
            key: "tier".to_owned(),
            value: "cold".to_owned(),
        }];
        let wrong_value = [Tag {
            key: "tier".to_owned(),
            value: "hot".to_owned(),
        }];
        assert!(r.matches("k", &matching));
        assert!(!r.matches("k", &wrong_value));
        assert!(!r.matches("k", &[]));
    }

    #[test]
    fn test_should_roundtrip_through_json() {
        let config = LifecycleConfiguration {
            rules: vec![rule("logs/", Vec::new())],
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let back: LifecycleConfiguration = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
