//! The three-phase access decision pipeline.
//!
//! 1. Special principals: the test-only bypass, and the anonymous-to-admin
//!    fallback for buckets owned by the admin principal. Both are gated by
//!    configuration and default off.
//! 2. Bucket-existence guard: any action other than `CreateBucket` against
//!    a missing bucket answers `NoSuchBucket` before policy or ACL run.
//! 3. Policy phase: any matching `Deny` wins; a matching `Allow` admits.
//! 4. ACL phase (only on implicit policy deny): resource ACL with implicit
//!    owner full control.
//! 5. Default deny.

use tracing::{debug, warn};

use basalt_index::{Index, IndexError};
use basalt_model::policy::{Effect, PolicyDocument, resource_arn};
use basalt_model::types::{AccessControlPolicy, BucketConfigKind, Principal};
use basalt_model::{S3Error, S3ErrorCode};

use crate::acl::acl_allows;
use crate::action::S3Action;

/// Canonical id of the test-only principal honored when
/// [`EvaluatorConfig::allow_test_principal`] is set.
pub const TEST_PRINCIPAL_ID: &str = "basalt-test";

/// Evaluator feature gates. Both default off and must stay off in
/// production deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluatorConfig {
    /// Honor the [`TEST_PRINCIPAL_ID`] bypass.
    pub allow_test_principal: bool,
    /// Evaluate unauthenticated requests to admin-owned buckets as if they
    /// came from the admin principal.
    pub admin_fallback_for_anonymous: bool,
}

/// One access decision request.
#[derive(Debug)]
pub struct AccessRequest<'a> {
    /// The acting principal.
    pub principal: &'a Principal,
    /// The action being attempted.
    pub action: S3Action,
    /// The target bucket.
    pub bucket: &'a str,
    /// The target key for object-level actions.
    pub key: Option<&'a str>,
    /// The admin principal's canonical id, if one is provisioned.
    pub admin_id: Option<&'a str>,
}

/// Run the full pipeline; `Ok(())` means the handler may proceed.
///
/// # Errors
///
/// `NoSuchBucket` from the existence guard, `NoSuchKey` for reads of a
/// missing object (so ACLs never mask existence), `AccessDenied`
/// otherwise, or an internal error if the index fails.
pub fn evaluate(
    index: &Index,
    config: EvaluatorConfig,
    request: &AccessRequest<'_>,
) -> Result<(), S3Error> {
    // Phase 1: special principals.
    if config.allow_test_principal
        && request.principal.canonical_id() == Some(TEST_PRINCIPAL_ID)
    {
        debug!(action = %request.action, "test principal bypass");
        return Ok(());
    }

    // CreateBucket has no bucket entity to consult: any authenticated
    // principal may create.
    if request.action == S3Action::CreateBucket {
        if request.principal.is_anonymous() {
            return Err(S3Error::access_denied(request.bucket.to_owned()));
        }
        return Ok(());
    }

    // Phase 2: bucket-existence guard, ahead of any authorization outcome.
    let bucket = match index.get_bucket(request.bucket) {
        Ok(bucket) => bucket,
        Err(IndexError::NoSuchBucket(name)) => return Err(S3Error::no_such_bucket(name)),
        Err(e) => return Err(e.into()),
    };

    // Anonymous requests to admin-owned buckets may be promoted to admin.
    let effective_principal: Principal;
    let principal = if config.admin_fallback_for_anonymous
        && request.principal.is_anonymous()
        && request.admin_id == Some(bucket.owner.id.as_str())
    {
        effective_principal = Principal::user(bucket.owner.id.clone(), "admin");
        &effective_principal
    } else {
        request.principal
    };

    // Phase 3: bucket policy. Absence is an implicit deny that falls
    // through to the ACL phase.
    let arn = resource_arn(request.bucket, request.key);
    match index.get_bucket_config(request.bucket, BucketConfigKind::Policy) {
        Ok(document) => match PolicyDocument::parse(document.as_bytes()) {
            Ok(policy) => {
                let mut allowed = false;
                for statement in policy.statements() {
                    if !statement.matches(principal.canonical_id(), request.action.as_str(), &arn)
                    {
                        continue;
                    }
                    match statement.effect {
                        Effect::Deny => {
                            debug!(action = %request.action, arn = %arn, "explicit policy deny");
                            return Err(S3Error::access_denied(arn));
                        }
                        Effect::Allow => allowed = true,
                    }
                }
                if allowed {
                    return Ok(());
                }
            }
            Err(e) => {
                // A stored policy that no longer parses must not widen
                // access; treat it as an implicit deny.
                warn!(bucket = %request.bucket, error = %e, "stored bucket policy unreadable");
            }
        },
        Err(IndexError::NoSuchConfig(_)) => {}
        Err(e) => return Err(e.into()),
    }

    // Phase 4: ACL. For object actions use the object's ACL when the
    // object exists and carries one; otherwise fall back to the bucket ACL.
    let mut object_missing = false;
    let acl: AccessControlPolicy = if let Some(key) = request.key {
        match index.get_version(request.bucket, key, None) {
            Ok(version) if !version.is_delete_marker => version
                .acl
                .unwrap_or_else(|| AccessControlPolicy::private(version.owner)),
            Ok(_) | Err(IndexError::NoSuchKey(_)) => {
                object_missing = true;
                bucket.acl.clone()
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        bucket.acl.clone()
    };

    if acl_allows(&acl, principal, request.action) {
        return Ok(());
    }

    // Reads of a missing object surface NoSuchKey rather than
    // AccessDenied, so ACLs never mask existence.
    if object_missing
        && matches!(request.action, S3Action::GetObject | S3Action::HeadObject)
    {
        return Err(S3Error::no_such_key(request.key.unwrap_or_default()));
    }

    // Phase 5: default deny.
    Err(S3Error::access_denied(arn))
}
