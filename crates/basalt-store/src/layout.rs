//! On-disk layout: content-addressed blob paths, part staging paths, and
//! temp-file naming.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

/// Directory under the root holding object blobs.
pub const OBJECTS_DIR: &str = "objects";
/// Directory under the root holding staged multipart parts.
pub const MULTIPART_DIR: &str = "multipart";
/// Infix marking in-flight temp files, swept on process start.
pub const TMP_INFIX: &str = ".tmp.";

/// Content address for a `(key, version)` pair within a bucket.
///
/// Keys may contain `/` and arbitrary UTF-8, so the blob filename is the
/// SHA-256 of the pair rather than the key itself; the first two hex
/// characters fan the files out into 256 subdirectories.
#[must_use]
pub fn blob_address(key: &str, version_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update([0u8]);
    hasher.update(version_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Path of an object blob.
#[must_use]
pub fn blob_path(root: &Path, bucket: &str, key: &str, version_id: &str) -> PathBuf {
    let address = blob_address(key, version_id);
    root.join(OBJECTS_DIR)
        .join(bucket)
        .join(&address[..2])
        .join(format!("{address}.dat"))
}

/// Directory holding a bucket's blobs.
#[must_use]
pub fn bucket_dir(root: &Path, bucket: &str) -> PathBuf {
    root.join(OBJECTS_DIR).join(bucket)
}

/// Directory holding one upload's staged parts.
#[must_use]
pub fn upload_dir(root: &Path, upload_id: &str) -> PathBuf {
    root.join(MULTIPART_DIR).join(upload_id)
}

/// Path of one staged part.
#[must_use]
pub fn part_path(root: &Path, upload_id: &str, part_number: u32) -> PathBuf {
    upload_dir(root, upload_id).join(format!("{part_number}.part"))
}

/// Derive a sibling temp path (`<name>.tmp.<random>`) for an in-flight
/// write.
#[must_use]
pub fn tmp_sibling(path: &Path) -> PathBuf {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{TMP_INFIX}{suffix}"))
}

/// Whether a filename denotes an abandoned temp file.
#[must_use]
pub fn is_tmp_name(name: &str) -> bool {
    name.contains(TMP_INFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_address_blobs_stably() {
        let a = blob_address("a/b/c", "null");
        let b = blob_address("a/b/c", "null");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_should_distinguish_key_version_boundaries() {
        // The separator byte prevents ("ab", "c") from colliding with ("a", "bc").
        assert_ne!(blob_address("ab", "c"), blob_address("a", "bc"));
        assert_ne!(blob_address("k", "v1"), blob_address("k", "v2"));
    }

    #[test]
    fn test_should_build_fanned_out_blob_path() {
        let path = blob_path(Path::new("/data"), "b1", "key", "null");
        let s = path.to_string_lossy();
        assert!(s.starts_with("/data/objects/b1/"));
        assert!(s.ends_with(".dat"));
        // The fan-out component is the first two characters of the address.
        let address = blob_address("key", "null");
        assert!(s.contains(&format!("/{}/", &address[..2])));
    }

    #[test]
    fn test_should_build_part_paths() {
        let path = part_path(Path::new("/data"), "upload-1", 7);
        assert_eq!(path, PathBuf::from("/data/multipart/upload-1/7.part"));
    }

    #[test]
    fn test_should_name_tmp_siblings_in_same_dir() {
        let blob = PathBuf::from("/data/objects/b1/ab/abc.dat");
        let tmp = tmp_sibling(&blob);
        assert_eq!(tmp.parent(), blob.parent());
        let name = tmp.file_name().map(|n| n.to_string_lossy().into_owned());
        assert!(name.is_some_and(|n| is_tmp_name(&n)));
        assert!(!is_tmp_name("abc.dat"));
    }
}
