//! Request validation: bucket names, object keys, metadata limits.

use basalt_model::{S3Error, S3ErrorCode, s3_error};

/// Longest allowed object key, per the S3 limit.
const MAX_KEY_LENGTH: usize = 1024;

/// Combined size cap for user metadata (keys plus values).
const MAX_METADATA_SIZE: usize = 2 * 1024;

/// Validate a bucket name: 3–63 characters of lowercase letters, digits,
/// hyphens, and periods; must start and end alphanumeric; no adjacent
/// periods; must not look like an IPv4 address.
///
/// # Errors
///
/// Returns `InvalidBucketName` describing the violated rule.
pub fn validate_bucket_name(name: &str) -> Result<(), S3Error> {
    let fail = |reason: &str| {
        Err(S3Error::with_message(
            S3ErrorCode::InvalidBucketName,
            format!("invalid bucket name '{name}': {reason}"),
        ))
    };

    if name.len() < 3 || name.len() > 63 {
        return fail("must be between 3 and 63 characters");
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return fail("only lowercase letters, digits, hyphens, and periods are allowed");
    }
    let first = name.as_bytes()[0];
    let last = name.as_bytes()[name.len() - 1];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit())
        || !(last.is_ascii_lowercase() || last.is_ascii_digit())
    {
        return fail("must begin and end with a letter or digit");
    }
    if name.contains("..") {
        return fail("must not contain adjacent periods");
    }
    if looks_like_ipv4(name) {
        return fail("must not be formatted as an IP address");
    }
    Ok(())
}

fn looks_like_ipv4(name: &str) -> bool {
    let octets: Vec<&str> = name.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| !o.is_empty() && o.len() <= 3 && o.bytes().all(|b| b.is_ascii_digit()))
}

/// Validate an object key: non-empty, within the length limit, valid
/// UTF-8 (guaranteed by the router), and free of path traversal segments.
///
/// # Errors
///
/// Returns `InvalidArgument` for violations.
pub fn validate_object_key(key: &str) -> Result<(), S3Error> {
    if key.is_empty() {
        return Err(s3_error!(InvalidArgument, "object key must not be empty"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(s3_error!(InvalidArgument, "object key is too long"));
    }
    // Keys address the index, never the filesystem, but reject traversal
    // segments anyway so they cannot leak into copy-source parsing.
    if key.split('/').any(|segment| segment == "..") {
        return Err(s3_error!(InvalidArgument, "object key must not contain '..'"));
    }
    Ok(())
}

/// Validate the combined size of user metadata.
///
/// # Errors
///
/// Returns `InvalidArgument` when the limit is exceeded.
pub fn validate_metadata(
    user_metadata: &std::collections::HashMap<String, String>,
) -> Result<(), S3Error> {
    let total: usize = user_metadata
        .iter()
        .map(|(k, v)| k.len() + v.len())
        .sum();
    if total > MAX_METADATA_SIZE {
        return Err(s3_error!(
            InvalidArgument,
            "user metadata exceeds the maximum allowed size"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_accept_valid_bucket_names() {
        for name in ["abc", "my-bucket", "my.bucket.2024", "a1b2c3", "0leading-digit"] {
            assert!(validate_bucket_name(name).is_ok(), "rejected {name}");
        }
    }

    #[test]
    fn test_should_reject_invalid_bucket_names() {
        for name in [
            "ab",                  // too short
            &"a".repeat(64),       // too long
            "UpperCase",           // uppercase
            "under_score",         // underscore
            "-leading-hyphen",     // bad first char
            "trailing-hyphen-",    // bad last char
            "double..dot",         // adjacent periods
            "192.168.0.1",         // IPv4-shaped
            "has space",           // space
        ] {
            assert!(validate_bucket_name(name).is_err(), "accepted {name}");
        }
    }

    #[test]
    fn test_should_not_mistake_names_with_numbers_for_ips() {
        assert!(validate_bucket_name("1.2.3.4.5").is_ok());
        assert!(validate_bucket_name("bucket.1.2.3").is_ok());
    }

    #[test]
    fn test_should_validate_object_keys() {
        assert!(validate_object_key("a/b/c.txt").is_ok());
        assert!(validate_object_key("with spaces and ünïcode").is_ok());
        assert!(validate_object_key("").is_err());
        assert!(validate_object_key(&"k".repeat(1025)).is_err());
        assert!(validate_object_key("a/../b").is_err());
        assert!(validate_object_key("..").is_err());
    }

    #[test]
    fn test_should_cap_metadata_size() {
        let mut small = std::collections::HashMap::new();
        small.insert("note".to_owned(), "fine".to_owned());
        assert!(validate_metadata(&small).is_ok());

        let mut big = std::collections::HashMap::new();
        big.insert("blob".to_owned(), "x".repeat(3000));
        assert!(validate_metadata(&big).is_err());
    }
}
