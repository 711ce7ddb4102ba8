//! S3 XML serialization: converting response types to S3-compatible XML.
//!
//! Conventions, per the AWS RestXml protocol:
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 (`2006-02-03T16:45:09.000Z`)
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`

use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesText, Event};

use basalt_model::lifecycle::{LifecycleConfiguration, LifecycleRule, RuleStatus};
use basalt_model::notification::{NotificationConfiguration, NotificationTarget};
use basalt_model::types::{AccessControlPolicy, Grantee, ObjectVersion, Owner, Tag};

use crate::error::XmlError;
use crate::responses::{
    CompleteUploadResult, CopyResult, DeleteResultPage, InitiateUploadResult, ListBucketsPage,
    ListObjectsPage, ListPartsPage, ListUploadsPage, ListVersionsPage, VersioningView,
};

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing S3 types to XML.
///
/// Implementors write their content as child elements inside the current
/// context; the root element and namespace are handled by [`to_xml`].
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as a complete S3 XML document.
///
/// # Errors
///
/// Returns `XmlError` if serialization fails.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(quick_xml::events::BytesDecl::new(
        "1.0",
        Some("UTF-8"),
        None,
    )))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_text<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text(writer, tag, v)?;
    }
    Ok(())
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text(writer, tag, if value { "true" } else { "false" })
}

fn write_u64<W: Write>(writer: &mut Writer<W>, tag: &str, value: u64) -> io::Result<()> {
    write_text(writer, tag, &value.to_string())
}

fn write_timestamp<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &chrono::DateTime<chrono::Utc>,
) -> io::Result<()> {
    write_text(writer, tag, &format_timestamp(value))
}

/// Format a `DateTime<Utc>` as ISO 8601 with milliseconds and `Z` suffix.
#[must_use]
pub fn format_timestamp(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn write_owner<W: Write>(writer: &mut Writer<W>, owner: &Owner) -> io::Result<()> {
    writer.create_element("Owner").write_inner_content(|w| {
        write_text(w, "ID", &owner.id)?;
        write_text(w, "DisplayName", &owner.display_name)?;
        Ok(())
    })?;
    Ok(())
}

fn write_common_prefixes<W: Write>(writer: &mut Writer<W>, prefixes: &[String]) -> io::Result<()> {
    for prefix in prefixes {
        writer
            .create_element("CommonPrefixes")
            .write_inner_content(|w| write_text(w, "Prefix", prefix))?;
    }
    Ok(())
}

fn write_contents_entry<W: Write>(writer: &mut Writer<W>, obj: &ObjectVersion) -> io::Result<()> {
    writer.create_element("Contents").write_inner_content(|w| {
        write_text(w, "Key", &obj.key)?;
        write_timestamp(w, "LastModified", &obj.last_modified)?;
        write_text(w, "ETag", &obj.etag)?;
        write_u64(w, "Size", obj.size)?;
        write_owner(w, &obj.owner)?;
        write_text(w, "StorageClass", &obj.storage_class)?;
        Ok(())
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Listing responses
// ---------------------------------------------------------------------------

impl S3Serialize for ListBucketsPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_owner(writer, &self.owner)?;
        writer.create_element("Buckets").write_inner_content(|w| {
            for (name, created) in &self.buckets {
                w.create_element("Bucket").write_inner_content(|w| {
                    write_text(w, "Name", name)?;
                    write_timestamp(w, "CreationDate", created)?;
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for ListObjectsPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Name", &self.bucket)?;
        write_text(writer, "Prefix", &self.prefix)?;
        if self.v2 {
            write_optional_text(writer, "StartAfter", self.start_after.as_deref())?;
            write_optional_text(
                writer,
                "ContinuationToken",
                self.continuation_token.as_deref(),
            )?;
            write_optional_text(
                writer,
                "NextContinuationToken",
                if self.is_truncated {
                    self.next_marker.as_deref()
                } else {
                    None
                },
            )?;
            write_u64(writer, "KeyCount", self.contents.len() as u64)?;
        } else {
            write_text(writer, "Marker", self.marker.as_deref().unwrap_or(""))?;
            if self.is_truncated {
                write_optional_text(writer, "NextMarker", self.next_marker.as_deref())?;
            }
        }
        write_u64(writer, "MaxKeys", self.max_keys as u64)?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for obj in &self.contents {
            write_contents_entry(writer, obj)?;
        }
        write_common_prefixes(writer, &self.common_prefixes)?;
        Ok(())
    }
}

impl S3Serialize for ListVersionsPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Name", &self.bucket)?;
        write_text(writer, "Prefix", &self.prefix)?;
        write_text(writer, "KeyMarker", self.key_marker.as_deref().unwrap_or(""))?;
        write_text(
            writer,
            "VersionIdMarker",
            self.version_id_marker.as_deref().unwrap_or(""),
        )?;
        if self.is_truncated {
            write_optional_text(writer, "NextKeyMarker", self.next_key_marker.as_deref())?;
            write_optional_text(
                writer,
                "NextVersionIdMarker",
                self.next_version_id_marker.as_deref(),
            )?;
        }
        write_u64(writer, "MaxKeys", self.max_keys as u64)?;
        write_optional_text(writer, "Delimiter", self.delimiter.as_deref())?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;

        for version in &self.versions {
            if version.is_delete_marker {
                writer
                    .create_element("DeleteMarker")
                    .write_inner_content(|w| {
                        write_text(w, "Key", &version.key)?;
                        write_text(w, "VersionId", &version.version_id)?;
                        write_bool(w, "IsLatest", version.is_latest)?;
                        write_timestamp(w, "LastModified", &version.last_modified)?;
                        write_owner(w, &version.owner)?;
                        Ok(())
                    })?;
            } else {
                writer.create_element("Version").write_inner_content(|w| {
                    write_text(w, "Key", &version.key)?;
                    write_text(w, "VersionId", &version.version_id)?;
                    write_bool(w, "IsLatest", version.is_latest)?;
                    write_timestamp(w, "LastModified", &version.last_modified)?;
                    write_text(w, "ETag", &version.etag)?;
                    write_u64(w, "Size", version.size)?;
                    write_owner(w, &version.owner)?;
                    write_text(w, "StorageClass", &version.storage_class)?;
                    Ok(())
                })?;
            }
        }
        write_common_prefixes(writer, &self.common_prefixes)?;
        Ok(())
    }
}

impl S3Serialize for ListUploadsPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Bucket", &self.bucket)?;
        write_u64(writer, "MaxUploads", self.max_uploads as u64)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for upload in &self.uploads {
            writer.create_element("Upload").write_inner_content(|w| {
                write_text(w, "Key", &upload.key)?;
                write_text(w, "UploadId", &upload.upload_id)?;
                write_owner(w, &upload.owner)?;
                write_text(w, "StorageClass", "STANDARD")?;
                write_timestamp(w, "Initiated", &upload.initiated)?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl S3Serialize for ListPartsPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Bucket", &self.bucket)?;
        write_text(writer, "Key", &self.key)?;
        write_text(writer, "UploadId", &self.upload_id)?;
        write_u64(writer, "MaxParts", self.max_parts as u64)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for part in &self.parts {
            writer.create_element("Part").write_inner_content(|w| {
                write_text(w, "PartNumber", &part.part_number.to_string())?;
                write_timestamp(w, "LastModified", &part.last_modified)?;
                write_text(w, "ETag", &part.etag)?;
                write_u64(w, "Size", part.size)?;
                Ok(())
            })?;
        }
        write_owner(writer, &self.owner)?;
        write_text(writer, "StorageClass", "STANDARD")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Multipart / copy / delete responses
// ---------------------------------------------------------------------------

impl S3Serialize for InitiateUploadResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Bucket", &self.bucket)?;
        write_text(writer, "Key", &self.key)?;
        write_text(writer, "UploadId", &self.upload_id)?;
        Ok(())
    }
}

impl S3Serialize for CompleteUploadResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "Location", &self.location)?;
        write_text(writer, "Bucket", &self.bucket)?;
        write_text(writer, "Key", &self.key)?;
        write_text(writer, "ETag", &self.etag)?;
        Ok(())
    }
}

impl S3Serialize for CopyResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text(writer, "ETag", &self.etag)?;
        write_timestamp(writer, "LastModified", &self.last_modified)?;
        Ok(())
    }
}

impl S3Serialize for DeleteResultPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        if !self.quiet {
            for entry in &self.deleted {
                writer.create_element("Deleted").write_inner_content(|w| {
                    write_text(w, "Key", &entry.key)?;
                    write_optional_text(w, "VersionId", entry.version_id.as_deref())?;
                    if entry.delete_marker {
                        write_bool(w, "DeleteMarker", true)?;
                        write_optional_text(
                            w,
                            "DeleteMarkerVersionId",
                            entry.delete_marker_version_id.as_deref(),
                        )?;
                    }
                    Ok(())
                })?;
            }
        }
        for error in &self.errors {
            writer.create_element("Error").write_inner_content(|w| {
                write_text(w, "Key", &error.key)?;
                write_optional_text(w, "VersionId", error.version_id.as_deref())?;
                write_text(w, "Code", &error.code)?;
                write_text(w, "Message", &error.message)?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Configuration responses
// ---------------------------------------------------------------------------

impl S3Serialize for VersioningView {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Status", self.status)?;
        write_optional_text(writer, "MfaDelete", self.mfa_delete)?;
        Ok(())
    }
}

/// Wrapper rendering a tag slice as a `<TagSet>`.
#[derive(Debug)]
pub struct TagSetView<'a>(pub &'a [Tag]);

impl S3Serialize for TagSetView<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        writer.create_element("TagSet").write_inner_content(|w| {
            for tag in self.0 {
                w.create_element("Tag").write_inner_content(|w| {
                    write_text(w, "Key", &tag.key)?;
                    write_text(w, "Value", &tag.value)?;
                    Ok(())
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl S3Serialize for AccessControlPolicy {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_owner(writer, &self.owner)?;
        writer
            .create_element("AccessControlList")
            .write_inner_content(|w| {
                for grant in &self.grants {
                    w.create_element("Grant").write_inner_content(|w| {
                        match &grant.grantee {
                            Grantee::CanonicalUser { id, display_name } => {
                                w.create_element("Grantee")
                                    .with_attribute((
                                        "xmlns:xsi",
                                        "http://www.w3.org/2001/XMLSchema-instance",
                                    ))
                                    .with_attribute(("xsi:type", "CanonicalUser"))
                                    .write_inner_content(|w| {
                                        write_text(w, "ID", id)?;
                                        write_text(w, "DisplayName", display_name)?;
                                        Ok(())
                                    })?;
                            }
                            Grantee::Group { uri } => {
                                w.create_element("Grantee")
                                    .with_attribute((
                                        "xmlns:xsi",
                                        "http://www.w3.org/2001/XMLSchema-instance",
                                    ))
                                    .with_attribute(("xsi:type", "Group"))
                                    .write_inner_content(|w| write_text(w, "URI", uri))?;
                            }
                        }
                        write_text(w, "Permission", grant.permission.as_str())?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
        Ok(())
    }
}

impl S3Serialize for LifecycleConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for rule in &self.rules {
            write_lifecycle_rule(writer, rule)?;
        }
        Ok(())
    }
}

fn write_lifecycle_rule<W: Write>(writer: &mut Writer<W>, rule: &LifecycleRule) -> io::Result<()> {
    writer.create_element("Rule").write_inner_content(|w| {
        write_optional_text(w, "ID", rule.id.as_deref())?;
        write_text(
            w,
            "Status",
            match rule.status {
                RuleStatus::Enabled => "Enabled",
                RuleStatus::Disabled => "Disabled",
            },
        )?;
        if rule.tags.is_empty() {
            w.create_element("Filter")
                .write_inner_content(|w| write_text(w, "Prefix", &rule.prefix))?;
        } else {
            w.create_element("Filter").write_inner_content(|w| {
                w.create_element("And").write_inner_content(|w| {
                    write_text(w, "Prefix", &rule.prefix)?;
                    for tag in &rule.tags {
                        w.create_element("Tag").write_inner_content(|w| {
                            write_text(w, "Key", &tag.key)?;
                            write_text(w, "Value", &tag.value)?;
                            Ok(())
                        })?;
                    }
                    Ok(())
                })?;
                Ok(())
            })?;
        }
        if let Some(days) = rule.expiration_days {
            w.create_element("Expiration")
                .write_inner_content(|w| write_text(w, "Days", &days.to_string()))?;
        }
        if rule.noncurrent_days.is_some() || rule.newer_noncurrent_versions.is_some() {
            w.create_element("NoncurrentVersionExpiration")
                .write_inner_content(|w| {
                    if let Some(days) = rule.noncurrent_days {
                        write_text(w, "NoncurrentDays", &days.to_string())?;
                    }
                    if let Some(n) = rule.newer_noncurrent_versions {
                        write_text(w, "NewerNoncurrentVersions", &n.to_string())?;
                    }
                    Ok(())
                })?;
        }
        if let Some(days) = rule.abort_incomplete_days {
            w.create_element("AbortIncompleteMultipartUpload")
                .write_inner_content(|w| {
                    write_text(w, "DaysAfterInitiation", &days.to_string())
                })?;
        }
        Ok(())
    })?;
    Ok(())
}

impl S3Serialize for NotificationConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for target in &self.topics {
            write_notification_target(writer, "TopicConfiguration", "Topic", target)?;
        }
        for target in &self.queues {
            write_notification_target(writer, "QueueConfiguration", "Queue", target)?;
        }
        for target in &self.lambda_functions {
            write_notification_target(
                writer,
                "CloudFunctionConfiguration",
                "CloudFunction",
                target,
            )?;
        }
        Ok(())
    }
}

fn write_notification_target<W: Write>(
    writer: &mut Writer<W>,
    element: &str,
    arn_element: &str,
    target: &NotificationTarget,
) -> io::Result<()> {
    writer.create_element(element).write_inner_content(|w| {
        write_optional_text(w, "Id", target.id.as_deref())?;
        write_text(w, arn_element, &target.arn)?;
        for event in &target.events {
            write_text(w, "Event", event)?;
        }
        if target.filter_prefix.is_some() || target.filter_suffix.is_some() {
            w.create_element("Filter").write_inner_content(|w| {
                w.create_element("S3Key").write_inner_content(|w| {
                    if let Some(prefix) = &target.filter_prefix {
                        write_filter_rule(w, "prefix", prefix)?;
                    }
                    if let Some(suffix) = &target.filter_suffix {
                        write_filter_rule(w, "suffix", suffix)?;
                    }
                    Ok(())
                })?;
                Ok(())
            })?;
        }
        Ok(())
    })?;
    Ok(())
}

fn write_filter_rule<W: Write>(writer: &mut Writer<W>, name: &str, value: &str) -> io::Result<()> {
    writer.create_element("FilterRule").write_inner_content(|w| {
        write_text(w, "Name", name)?;
        write_text(w, "Value", value)?;
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use basalt_model::types::{Grant, ObjectMetadata, Permission};
    use chrono::Utc;

    use super::*;

    fn xml_string<T: S3Serialize>(root: &str, value: &T) -> String {
        let bytes = to_xml(root, value).expect("serialize");
        String::from_utf8(bytes).expect("valid UTF-8")
    }

    fn owner() -> Owner {
        Owner {
            id: "abc".to_owned(),
            display_name: "alice".to_owned(),
        }
    }

    fn version(key: &str, version_id: &str, delete_marker: bool) -> ObjectVersion {
        ObjectVersion {
            key: key.to_owned(),
            version_id: version_id.to_owned(),
            size: 5,
            etag: "\"5d41402abc4b2a76b9719d911017c592\"".to_owned(),
            last_modified: Utc::now(),
            is_latest: true,
            is_delete_marker: delete_marker,
            storage_class: "STANDARD".to_owned(),
            owner: owner(),
            metadata: ObjectMetadata::default(),
            checksum: None,
            parts_count: None,
            acl: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_should_serialize_list_buckets() {
        let page = ListBucketsPage {
            owner: owner(),
            buckets: vec![("b1".to_owned(), Utc::now()), ("b2".to_owned(), Utc::now())],
        };
        let xml = xml_string("ListAllMyBucketsResult", &page);
        assert!(xml.contains("xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\""));
        assert!(xml.contains("<Name>b1</Name>"));
        assert!(xml.contains("<Name>b2</Name>"));
        assert!(xml.contains("<DisplayName>alice</DisplayName>"));
    }

    #[test]
    fn test_should_serialize_list_objects_v1() {
        let page = ListObjectsPage {
            bucket: "b1".to_owned(),
            prefix: String::new(),
            delimiter: None,
            max_keys: 1000,
            marker: None,
            continuation_token: None,
            start_after: None,
            is_truncated: true,
            next_marker: Some("k3".to_owned()),
            contents: vec![version("k1", "null", false)],
            common_prefixes: vec!["photos/".to_owned()],
            v2: false,
        };
        let xml = xml_string("ListBucketResult", &page);
        assert!(xml.contains("<Marker></Marker>"));
        assert!(xml.contains("<NextMarker>k3</NextMarker>"));
        assert!(xml.contains("<IsTruncated>true</IsTruncated>"));
        assert!(xml.contains("<Key>k1</Key>"));
        assert!(xml.contains("<CommonPrefixes><Prefix>photos/</Prefix></CommonPrefixes>"));
        assert!(!xml.contains("KeyCount"));
    }

    #[test]
    fn test_should_serialize_list_objects_v2() {
        let page = ListObjectsPage {
            bucket: "b1".to_owned(),
            prefix: "p/".to_owned(),
            delimiter: Some("/".to_owned()),
            max_keys: 2,
            marker: None,
            continuation_token: Some("tok".to_owned()),
            start_after: None,
            is_truncated: false,
            next_marker: None,
            contents: vec![version("p/k", "null", false)],
            common_prefixes: Vec::new(),
            v2: true,
        };
        let xml = xml_string("ListBucketResult", &page);
        assert!(xml.contains("<KeyCount>1</KeyCount>"));
        assert!(xml.contains("<ContinuationToken>tok</ContinuationToken>"));
        assert!(xml.contains("<Delimiter>/</Delimiter>"));
        assert!(!xml.contains("<Marker>"));
    }

    #[test]
    fn test_should_serialize_versions_and_delete_markers() {
        let page = ListVersionsPage {
            bucket: "b1".to_owned(),
            prefix: String::new(),
            delimiter: None,
            max_keys: 1000,
            key_marker: None,
            version_id_marker: None,
            is_truncated: false,
            next_key_marker: None,
            next_version_id_marker: None,
            versions: vec![version("k", "v1", false), version("k", "v2", true)],
            common_prefixes: Vec::new(),
        };
        let xml = xml_string("ListVersionsResult", &page);
        assert!(xml.contains("<Version>"));
        assert!(xml.contains("<DeleteMarker>"));
        assert!(xml.contains("<VersionId>v1</VersionId>"));
        assert!(xml.contains("<VersionId>v2</VersionId>"));
    }

    #[test]
    fn test_should_serialize_complete_upload_result() {
        let result = CompleteUploadResult {
            location: "http://127.0.0.1:8080/b1/k".to_owned(),
            bucket: "b1".to_owned(),
            key: "k".to_owned(),
            etag: "\"abc-2\"".to_owned(),
        };
        let xml = xml_string("CompleteMultipartUploadResult", &result);
        assert!(xml.contains("<ETag>&quot;abc-2&quot;</ETag>"));
        assert!(xml.contains("<Location>http://127.0.0.1:8080/b1/k</Location>"));
    }

    #[test]
    fn test_should_serialize_delete_result() {
        let page = DeleteResultPage {
            deleted: vec![crate::responses::DeletedEntry {
                key: "k".to_owned(),
                version_id: None,
                delete_marker: true,
                delete_marker_version_id: Some("dm1".to_owned()),
            }],
            errors: vec![crate::responses::DeleteErrorEntry {
                key: "locked".to_owned(),
                version_id: None,
                code: "AccessDenied".to_owned(),
                message: "Access Denied".to_owned(),
            }],
            quiet: false,
        };
        let xml = xml_string("DeleteResult", &page);
        assert!(xml.contains("<DeleteMarker>true</DeleteMarker>"));
        assert!(xml.contains("<DeleteMarkerVersionId>dm1</DeleteMarkerVersionId>"));
        assert!(xml.contains("<Code>AccessDenied</Code>"));
    }

    #[test]
    fn test_should_suppress_deleted_entries_in_quiet_mode() {
        let page = DeleteResultPage {
            deleted: vec![crate::responses::DeletedEntry {
                key: "k".to_owned(),
                version_id: None,
                delete_marker: false,
                delete_marker_version_id: None,
            }],
            errors: Vec::new(),
            quiet: true,
        };
        let xml = xml_string("DeleteResult", &page);
        assert!(!xml.contains("<Deleted>"));
    }

    #[test]
    fn test_should_serialize_versioning_states() {
        let never = VersioningView {
            status: None,
            mfa_delete: None,
        };
        let xml = xml_string("VersioningConfiguration", &never);
        assert!(!xml.contains("<Status>"));

        let enabled = VersioningView {
            status: Some("Enabled"),
            mfa_delete: Some("Enabled"),
        };
        let xml = xml_string("VersioningConfiguration", &enabled);
        assert!(xml.contains("<Status>Enabled</Status>"));
        assert!(xml.contains("<MfaDelete>Enabled</MfaDelete>"));
    }

    #[test]
    fn test_should_serialize_acl_with_grantee_types() {
        let mut policy = AccessControlPolicy::private(owner());
        policy.grants.push(Grant {
            grantee: basalt_model::types::Grantee::Group {
                uri: basalt_model::types::ALL_USERS_URI.to_owned(),
            },
            permission: Permission::Read,
        });
        let xml = xml_string("AccessControlPolicy", &policy);
        assert!(xml.contains("xsi:type=\"CanonicalUser\""));
        assert!(xml.contains("xsi:type=\"Group\""));
        assert!(xml.contains("<Permission>FULL_CONTROL</Permission>"));
        assert!(xml.contains("<Permission>READ</Permission>"));
        assert!(xml.contains("<URI>http://acs.amazonaws.com/groups/global/AllUsers</URI>"));
    }

    #[test]
    fn test_should_serialize_tag_set() {
        let tags = vec![Tag {
            key: "env".to_owned(),
            value: "prod".to_owned(),
        }];
        let xml = xml_string("Tagging", &TagSetView(&tags));
        assert!(xml.contains("<TagSet><Tag><Key>env</Key><Value>prod</Value></Tag></TagSet>"));
    }

    #[test]
    fn test_should_serialize_lifecycle_rules() {
        use basalt_model::lifecycle::{LifecycleRule, RuleStatus};
        let config = LifecycleConfiguration {
            rules: vec![LifecycleRule {
                id: Some("expire-logs".to_owned()),
                status: RuleStatus::Enabled,
                prefix: "logs/".to_owned(),
                tags: Vec::new(),
                expiration_days: Some(30),
                noncurrent_days: Some(7),
                newer_noncurrent_versions: Some(3),
                abort_incomplete_days: Some(1),
            }],
        };
        let xml = xml_string("LifecycleConfiguration", &config);
        assert!(xml.contains("<ID>expire-logs</ID>"));
        assert!(xml.contains("<Prefix>logs/</Prefix>"));
        assert!(xml.contains("<Days>30</Days>"));
        assert!(xml.contains("<NoncurrentDays>7</NoncurrentDays>"));
        assert!(xml.contains("<NewerNoncurrentVersions>3</NewerNoncurrentVersions>"));
        assert!(xml.contains("<DaysAfterInitiation>1</DaysAfterInitiation>"));
    }

    #[test]
    fn test_should_serialize_notification_targets() {
        use basalt_model::notification::NotificationTarget;
        let config = NotificationConfiguration {
            topics: vec![NotificationTarget {
                id: Some("t1".to_owned()),
                arn: "arn:aws:sns:us-east-1:0:topic".to_owned(),
                events: vec!["s3:ObjectCreated:*".to_owned()],
                filter_prefix: Some("logs/".to_owned()),
                filter_suffix: None,
            }],
            queues: Vec::new(),
            lambda_functions: Vec::new(),
        };
        let xml = xml_string("NotificationConfiguration", &config);
        assert!(xml.contains("<TopicConfiguration>"));
        assert!(xml.contains("<Topic>arn:aws:sns:us-east-1:0:topic</Topic>"));
        assert!(xml.contains("<Event>s3:ObjectCreated:*</Event>"));
        assert!(xml.contains("<Name>prefix</Name>"));
    }
}
