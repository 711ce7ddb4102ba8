//! ACL grant evaluation.

use basalt_model::types::{
    ALL_USERS_URI, AUTHENTICATED_USERS_URI, AccessControlPolicy, Grantee, Principal,
};

use crate::action::{S3Action, permission_covers};

/// Whether a grantee matches the acting principal.
#[must_use]
pub fn grantee_matches(grantee: &Grantee, principal: &Principal) -> bool {
    match grantee {
        Grantee::CanonicalUser { id, .. } => principal.canonical_id() == Some(id.as_str()),
        Grantee::Group { uri } => match uri.as_str() {
            ALL_USERS_URI => true,
            AUTHENTICATED_USERS_URI => !principal.is_anonymous(),
            _ => false,
        },
    }
}

/// Whether the ACL allows `principal` to perform `action`.
///
/// The resource owner has implicit `FULL_CONTROL`; otherwise the grants are
/// walked in order until one matches both the principal and the action.
#[must_use]
pub fn acl_allows(acl: &AccessControlPolicy, principal: &Principal, action: S3Action) -> bool {
    if principal.canonical_id() == Some(acl.owner.id.as_str()) {
        return true;
    }
    acl.grants.iter().any(|grant| {
        grantee_matches(&grant.grantee, principal) && permission_covers(grant.permission, action)
    })
}

#[cfg(test)]
mod tests {
    use basalt_model::types::{CannedAcl, Grant, Owner, Permission};

    use super::*;

    fn owner() -> Owner {
        Owner {
            id: "owner-id".to_owned(),
            display_name: "owner".to_owned(),
        }
    }

    #[test]
    fn test_should_grant_owner_implicit_full_control() {
        let acl = AccessControlPolicy {
            owner: owner(),
            grants: Vec::new(),
        };
        let principal = Principal::user("owner-id", "owner");
        assert!(acl_allows(&acl, &principal, S3Action::PutBucketPolicy));
        assert!(acl_allows(&acl, &principal, S3Action::DeleteObject));
    }

    #[test]
    fn test_should_match_canonical_user_by_id() {
        let mut acl = AccessControlPolicy::private(owner());
        acl.grants.push(Grant {
            grantee: Grantee::CanonicalUser {
                id: "reader-id".to_owned(),
                display_name: "reader".to_owned(),
            },
            permission: Permission::Read,
        });

        let reader = Principal::user("reader-id", "reader");
        assert!(acl_allows(&acl, &reader, S3Action::GetObject));
        assert!(!acl_allows(&acl, &reader, S3Action::PutObject));

        let stranger = Principal::user("stranger-id", "stranger");
        assert!(!acl_allows(&acl, &stranger, S3Action::GetObject));
    }

    #[test]
    fn test_should_match_all_users_group_for_anonymous() {
        let acl = AccessControlPolicy::canned(owner(), CannedAcl::PublicRead);
        assert!(acl_allows(&acl, &Principal::Anonymous, S3Action::GetObject));
        assert!(!acl_allows(&acl, &Principal::Anonymous, S3Action::PutObject));
    }

    #[test]
    fn test_should_restrict_authenticated_users_group() {
        let acl = AccessControlPolicy::canned(owner(), CannedAcl::AuthenticatedRead);
        let user = Principal::user("any-id", "any");
        assert!(acl_allows(&acl, &user, S3Action::GetObject));
        assert!(!acl_allows(&acl, &Principal::Anonymous, S3Action::GetObject));
    }

    #[test]
    fn test_should_ignore_unknown_group_uris() {
        let grantee = Grantee::Group {
            uri: "http://acs.amazonaws.com/groups/s3/LogDelivery".to_owned(),
        };
        assert!(!grantee_matches(&grantee, &Principal::Anonymous));
        assert!(!grantee_matches(&grantee, &Principal::user("id", "name")));
    }
}
