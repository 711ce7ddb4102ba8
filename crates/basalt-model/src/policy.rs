//! Bucket policy documents.
//!
//! Policies are JSON documents with `Statement` entries; several fields
//! accept either a single value or an array, modeled by [`OneOrMany`].
//! Matching supports `*` and `?` wildcards in actions and resource ARNs.
//! Conditions are stored but not evaluated.

use serde::{Deserialize, Serialize};

/// A JSON field that is either one value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value.
    One(T),
    /// A list of values.
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Iterate over the contained values.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        match self {
            Self::One(v) => std::slice::from_ref(v).iter(),
            Self::Many(vs) => vs.iter(),
        }
    }
}

/// The effect of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Grant the matched actions.
    Allow,
    /// Refuse the matched actions; deny always wins.
    Deny,
}

/// The principal a statement applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyPrincipal {
    /// `"*"` — every principal.
    Wildcard(String),
    /// `{"AWS": ...}` — specific canonical ids or `"*"`.
    Aws {
        /// The AWS principal entries.
        #[serde(rename = "AWS")]
        aws: OneOrMany<String>,
    },
}

impl PolicyPrincipal {
    /// Whether this principal spec matches the given canonical id
    /// (`None` = anonymous).
    #[must_use]
    pub fn matches(&self, canonical_id: Option<&str>) -> bool {
        match self {
            Self::Wildcard(s) => s == "*",
            Self::Aws { aws } => aws
                .iter()
                .any(|entry| entry == "*" || Some(entry.as_str()) == canonical_id),
        }
    }
}

/// One policy statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Optional statement id.
    #[serde(rename = "Sid", default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Allow or Deny.
    #[serde(rename = "Effect")]
    pub effect: Effect,
    /// The principals the statement applies to; absent means every
    /// principal.
    #[serde(
        rename = "Principal",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub principal: Option<PolicyPrincipal>,
    /// Action patterns (`s3:GetObject`, `s3:*`, ...).
    #[serde(rename = "Action")]
    pub action: OneOrMany<String>,
    /// Resource ARN patterns; absent means every resource in the bucket.
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany<String>>,
    /// Conditions, stored but not evaluated.
    #[serde(
        rename = "Condition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<serde_json::Value>,
}

impl Statement {
    /// Whether this statement matches (principal, action, resource ARN).
    #[must_use]
    pub fn matches(&self, canonical_id: Option<&str>, action: &str, resource_arn: &str) -> bool {
        let principal_ok = self
            .principal
            .as_ref()
            .is_none_or(|p| p.matches(canonical_id));
        if !principal_ok {
            return false;
        }

        let action_ok = self.action.iter().any(|a| wildcard_match(a, action));
        if !action_ok {
            return false;
        }

        self.resource
            .as_ref()
            .is_none_or(|r| r.iter().any(|pattern| wildcard_match(pattern, resource_arn)))
    }
}

/// A bucket policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// The policy language version.
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// The statements; order-insensitive, any matching Deny wins.
    #[serde(rename = "Statement")]
    pub statement: OneOrMany<Statement>,
}

impl PolicyDocument {
    /// Parse a policy document from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error for malformed documents; callers map
    /// this to `MalformedPolicy`.
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Iterate over the statements.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.statement.iter()
    }
}

/// Build the resource ARN for a bucket or object.
#[must_use]
pub fn resource_arn(bucket: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("arn:aws:s3:::{bucket}/{key}"),
        None => format!("arn:aws:s3:::{bucket}"),
    }
}

/// Glob-style matching with `*` (any run) and `?` (any single character).
#[must_use]
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();
    match_from(&pattern, &value)
}

fn match_from(pattern: &[char], value: &[char]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some((&'*', rest)) => {
            // Try consuming zero or more characters.
            (0..=value.len()).any(|skip| match_from(rest, &value[skip..]))
        }
        Some((&'?', rest)) => value
            .split_first()
            .is_some_and(|(_, tail)| match_from(rest, tail)),
        Some((&c, rest)) => value
            .split_first()
            .is_some_and(|(&v, tail)| v == c && match_from(rest, tail)),
    }
}
