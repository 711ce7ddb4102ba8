//! ETag computation.
//!
//! Single-part objects carry the quoted hex MD5 of their bytes. Multipart
//! objects carry the MD5 of the concatenated binary part digests with a
//! `-<part count>` suffix.

use md5::{Digest, Md5};

/// Compute the hex-encoded MD5 digest of `data`.
///
/// # Examples
///
/// ```
/// use basalt_store::etag::md5_hex;
///
/// assert_eq!(md5_hex(b"hello"), "5d41402abc4b2a76b9719d911017c592");
/// ```
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Quote a hex digest as an S3 ETag.
#[must_use]
pub fn quote(hex_digest: &str) -> String {
    format!("\"{hex_digest}\"")
}

/// Strip the surrounding quotes from an ETag, if present.
#[must_use]
pub fn unquote(etag: &str) -> &str {
    etag.trim_matches('"')
}

/// Compute the composite multipart ETag from unquoted per-part hex digests:
/// `"hex(md5(md5_1 ∥ … ∥ md5_N))-N"`.
#[must_use]
pub fn composite_etag(part_md5_hexes: &[impl AsRef<str>]) -> String {
    let mut combined = Vec::with_capacity(part_md5_hexes.len() * 16);
    for hex_digest in part_md5_hexes {
        if let Ok(bytes) = hex::decode(unquote(hex_digest.as_ref())) {
            combined.extend_from_slice(&bytes);
        }
    }
    let final_md5 = hex::encode(Md5::digest(&combined));
    format!("\"{final_md5}-{}\"", part_md5_hexes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_compute_known_md5() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn test_should_quote_and_unquote() {
        let quoted = quote("abc");
        assert_eq!(quoted, "\"abc\"");
        assert_eq!(unquote(&quoted), "abc");
        assert_eq!(unquote("abc"), "abc");
    }

    #[test]
    fn test_should_compute_composite_etag_from_part_digests() {
        // hex(md5(bin(m1) || bin(m2))) + "-2", computed by hand.
        let m1 = md5_hex(b"hello ");
        let m2 = md5_hex(b"world");

        let mut combined = Vec::new();
        combined.extend_from_slice(&hex::decode(&m1).expect("valid hex"));
        combined.extend_from_slice(&hex::decode(&m2).expect("valid hex"));
        let expected = format!("\"{}-2\"", hex::encode(Md5::digest(&combined)));

        assert_eq!(composite_etag(&[m1, m2]), expected);
    }

    #[test]
    fn test_should_accept_quoted_part_digests() {
        let m1 = md5_hex(b"a");
        let from_quoted = composite_etag(&[quote(&m1)]);
        let from_plain = composite_etag(&[m1]);
        assert_eq!(from_quoted, from_plain);
        assert!(from_plain.ends_with("-1\""));
    }
}
