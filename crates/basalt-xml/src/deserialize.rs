//! S3 XML deserialization: parsing request bodies into typed values.
//!
//! Covers the XML request bodies this server accepts: bulk delete,
//! multipart completion, tagging, versioning, lifecycle, notification, and
//! explicit ACL documents.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use basalt_model::lifecycle::{LifecycleConfiguration, LifecycleRule, RuleStatus};
use basalt_model::notification::{NotificationConfiguration, NotificationTarget};
use basalt_model::types::{AccessControlPolicy, Grant, Grantee, Owner, Permission, Tag};

use crate::error::XmlError;

/// Trait for deserializing S3 types from XML.
///
/// The reader is positioned just after the opening tag of the element; the
/// implementation reads child content and returns once the matching end tag
/// is consumed.
pub trait S3Deserialize: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or required fields are
    /// missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize S3-compatible XML into a typed value.
///
/// # Errors
///
/// Returns `XmlError` if the XML is malformed or deserialization fails.
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    // Skip the declaration and find the root element.
    loop {
        match reader.read_event()? {
            Event::Start(_) => return T::deserialize_xml(&mut reader),
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn element_name(e: &BytesStart<'_>) -> Result<String, XmlError> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_owned)
        .map_err(|err| XmlError::ParseError(err.to_string()))
}

/// Read the text content of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

fn parse_u32(s: &str) -> Result<u32, XmlError> {
    s.parse::<u32>()
        .map_err(|e| XmlError::ParseError(format!("invalid integer '{s}': {e}")))
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// One `<Object>` entry in a bulk delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectIdentifier {
    /// The key to delete.
    pub key: String,
    /// The version to delete, when targeting a specific version.
    pub version_id: Option<String>,
}

/// The `<Delete>` request body of `POST /bucket?delete`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    /// The objects to delete.
    pub objects: Vec<ObjectIdentifier>,
    /// Whether to suppress `<Deleted>` entries in the response.
    pub quiet: bool,
}

/// One `<Part>` of a `CompleteMultipartUpload` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// The part number.
    pub part_number: u32,
    /// The client-supplied ETag for the part.
    pub etag: String,
}

/// The `<CompleteMultipartUpload>` request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompleteUploadRequest {
    /// The parts in client order.
    pub parts: Vec<CompletedPart>,
}

/// The `<VersioningConfiguration>` request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersioningRequest {
    /// `Enabled` or `Suspended`.
    pub status: Option<String>,
    /// `Enabled` or `Disabled`.
    pub mfa_delete: Option<String>,
}

/// The `<Tagging>` request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggingRequest {
    /// The tag set.
    pub tags: Vec<Tag>,
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

impl S3Deserialize for DeleteRequest {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut request = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "Object" => request.objects.push(parse_object_identifier(reader)?),
                    "Quiet" => request.quiet = read_text_content(reader)? == "true",
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in Delete".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        if request.objects.is_empty() {
            return Err(XmlError::MissingElement("Object".to_owned()));
        }
        Ok(request)
    }
}

fn parse_object_identifier(reader: &mut Reader<&[u8]>) -> Result<ObjectIdentifier, XmlError> {
    let mut key = None;
    let mut version_id = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "Key" => key = Some(read_text_content(reader)?),
                "VersionId" => {
                    let v = read_text_content(reader)?;
                    if !v.is_empty() {
                        version_id = Some(v);
                    }
                }
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Object".to_owned(),
                ));
            }
            _ => {}
        }
    }
    Ok(ObjectIdentifier {
        key: key.ok_or_else(|| XmlError::MissingElement("Key".to_owned()))?,
        version_id,
    })
}

impl S3Deserialize for CompleteUploadRequest {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut request = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "Part" => request.parts.push(parse_completed_part(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in CompleteMultipartUpload".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(request)
    }
}

fn parse_completed_part(reader: &mut Reader<&[u8]>) -> Result<CompletedPart, XmlError> {
    let mut part_number = None;
    let mut etag = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "PartNumber" => part_number = Some(parse_u32(&read_text_content(reader)?)?),
                "ETag" => etag = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Part".to_owned(),
                ));
            }
            _ => {}
        }
    }
    Ok(CompletedPart {
        part_number: part_number.ok_or_else(|| XmlError::MissingElement("PartNumber".to_owned()))?,
        etag: etag.ok_or_else(|| XmlError::MissingElement("ETag".to_owned()))?,
    })
}

impl S3Deserialize for VersioningRequest {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut request = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "Status" => request.status = Some(read_text_content(reader)?),
                    "MfaDelete" | "MFADelete" => {
                        request.mfa_delete = Some(read_text_content(reader)?);
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in VersioningConfiguration".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(request)
    }
}

impl S3Deserialize for TaggingRequest {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut request = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "TagSet" => request.tags = parse_tag_set(reader)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in Tagging".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(request)
    }
}

fn parse_tag_set(reader: &mut Reader<&[u8]>) -> Result<Vec<Tag>, XmlError> {
    let mut tags = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "Tag" => tags.push(parse_tag(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in TagSet".to_owned(),
                ));
            }
            _ => {}
        }
    }
    Ok(tags)
}

fn parse_tag(reader: &mut Reader<&[u8]>) -> Result<Tag, XmlError> {
    let mut key = None;
    let mut value = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "Key" => key = Some(read_text_content(reader)?),
                "Value" => value = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Tag".to_owned(),
                ));
            }
            _ => {}
        }
    }
    Ok(Tag {
        key: key.ok_or_else(|| XmlError::MissingElement("Key".to_owned()))?,
        value: value.unwrap_or_default(),
    })
}

impl S3Deserialize for AccessControlPolicy {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut owner = None;
        let mut grants = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "Owner" => owner = Some(parse_owner(reader)?),
                    "AccessControlList" => grants = parse_grant_list(reader)?,
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in AccessControlPolicy".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(Self {
            owner: owner.ok_or_else(|| XmlError::MissingElement("Owner".to_owned()))?,
            grants,
        })
    }
}

fn parse_owner(reader: &mut Reader<&[u8]>) -> Result<Owner, XmlError> {
    let mut id = None;
    let mut display_name = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "ID" => id = Some(read_text_content(reader)?),
                "DisplayName" => display_name = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Owner".to_owned(),
                ));
            }
            _ => {}
        }
    }
    Ok(Owner {
        id: id.ok_or_else(|| XmlError::MissingElement("ID".to_owned()))?,
        display_name: display_name.unwrap_or_default(),
    })
}

fn parse_grant_list(reader: &mut Reader<&[u8]>) -> Result<Vec<Grant>, XmlError> {
    let mut grants = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "Grant" => grants.push(parse_grant(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in AccessControlList".to_owned(),
                ));
            }
            _ => {}
        }
    }
    Ok(grants)
}

fn parse_grant(reader: &mut Reader<&[u8]>) -> Result<Grant, XmlError> {
    let mut grantee = None;
    let mut permission = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "Grantee" => grantee = Some(parse_grantee(reader, &e)?),
                "Permission" => {
                    let text = read_text_content(reader)?;
                    permission = Some(
                        text.parse::<Permission>()
                            .map_err(|err| XmlError::ParseError(err.to_string()))?,
                    );
                }
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Grant".to_owned(),
                ));
            }
            _ => {}
        }
    }
    Ok(Grant {
        grantee: grantee.ok_or_else(|| XmlError::MissingElement("Grantee".to_owned()))?,
        permission: permission.ok_or_else(|| XmlError::MissingElement("Permission".to_owned()))?,
    })
}

fn parse_grantee(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Grantee, XmlError> {
    // The grantee variant comes from the xsi:type attribute.
    let mut grantee_type = String::new();
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref().ends_with(b"type") {
            grantee_type = String::from_utf8_lossy(&attr.value).into_owned();
        }
    }

    let mut id = None;
    let mut display_name = None;
    let mut uri = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "ID" => id = Some(read_text_content(reader)?),
                "DisplayName" => display_name = Some(read_text_content(reader)?),
                "URI" => uri = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Grantee".to_owned(),
                ));
            }
            _ => {}
        }
    }

    match grantee_type.as_str() {
        "Group" => Ok(Grantee::Group {
            uri: uri.ok_or_else(|| XmlError::MissingElement("URI".to_owned()))?,
        }),
        // CanonicalUser is the default when the attribute is absent.
        _ => Ok(Grantee::CanonicalUser {
            id: id.ok_or_else(|| XmlError::MissingElement("ID".to_owned()))?,
            display_name: display_name.unwrap_or_default(),
        }),
    }
}

impl S3Deserialize for LifecycleConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut rules = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "Rule" => rules.push(parse_lifecycle_rule(reader)?),
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in LifecycleConfiguration".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        if rules.is_empty() {
            return Err(XmlError::MissingElement("Rule".to_owned()));
        }
        Ok(Self { rules })
    }
}

fn parse_lifecycle_rule(reader: &mut Reader<&[u8]>) -> Result<LifecycleRule, XmlError> {
    let mut rule = LifecycleRule {
        id: None,
        status: RuleStatus::Disabled,
        prefix: String::new(),
        tags: Vec::new(),
        expiration_days: None,
        noncurrent_days: None,
        newer_noncurrent_versions: None,
        abort_incomplete_days: None,
    };
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "ID" => rule.id = Some(read_text_content(reader)?),
                "Status" => {
                    rule.status = match read_text_content(reader)?.as_str() {
                        "Enabled" => RuleStatus::Enabled,
                        "Disabled" => RuleStatus::Disabled,
                        other => {
                            return Err(XmlError::ParseError(format!(
                                "invalid rule status: {other}"
                            )));
                        }
                    };
                }
                // Legacy top-level prefix and the newer Filter wrapper.
                "Prefix" => rule.prefix = read_text_content(reader)?,
                "Filter" => parse_lifecycle_filter(reader, &mut rule)?,
                "Expiration" => {
                    parse_named_u32(reader, "Days", &mut rule.expiration_days)?;
                }
                "NoncurrentVersionExpiration" => {
                    parse_noncurrent_expiration(reader, &mut rule)?;
                }
                "AbortIncompleteMultipartUpload" => {
                    parse_named_u32(reader, "DaysAfterInitiation", &mut rule.abort_incomplete_days)?;
                }
                _ => skip_element(reader)?,
            },
            Event::Empty(e) => {
                if element_name(&e)? == "Prefix" {
                    rule.prefix = String::new();
                }
            }
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Rule".to_owned(),
                ));
            }
            _ => {}
        }
    }
    Ok(rule)
}

fn parse_lifecycle_filter(
    reader: &mut Reader<&[u8]>,
    rule: &mut LifecycleRule,
) -> Result<(), XmlError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "Prefix" => rule.prefix = read_text_content(reader)?,
                "Tag" => rule.tags.push(parse_tag(reader)?),
                "And" => parse_lifecycle_filter(reader, rule)?,
                _ => skip_element(reader)?,
            },
            Event::Empty(e) => {
                if element_name(&e)? == "Prefix" {
                    rule.prefix = String::new();
                }
            }
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Filter".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

fn parse_named_u32(
    reader: &mut Reader<&[u8]>,
    name: &str,
    slot: &mut Option<u32>,
) -> Result<(), XmlError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if element_name(&e)? == name {
                    *slot = Some(parse_u32(&read_text_content(reader)?)?);
                } else {
                    skip_element(reader)?;
                }
            }
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(format!(
                    "unexpected EOF while reading {name}"
                )));
            }
            _ => {}
        }
    }
}

fn parse_noncurrent_expiration(
    reader: &mut Reader<&[u8]>,
    rule: &mut LifecycleRule,
) -> Result<(), XmlError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "NoncurrentDays" => {
                    rule.noncurrent_days = Some(parse_u32(&read_text_content(reader)?)?);
                }
                "NewerNoncurrentVersions" => {
                    rule.newer_noncurrent_versions = Some(parse_u32(&read_text_content(reader)?)?);
                }
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in NoncurrentVersionExpiration".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

impl S3Deserialize for NotificationConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut config = Self::default();
        loop {
            match reader.read_event()? {
                Event::Start(e) => match element_name(&e)?.as_str() {
                    "TopicConfiguration" => {
                        config.topics.push(parse_notification_target(reader, "Topic")?);
                    }
                    "QueueConfiguration" => {
                        config.queues.push(parse_notification_target(reader, "Queue")?);
                    }
                    "CloudFunctionConfiguration" | "LambdaFunctionConfiguration" => {
                        config
                            .lambda_functions
                            .push(parse_notification_target(reader, "CloudFunction")?);
                    }
                    _ => skip_element(reader)?,
                },
                Event::End(_) => break,
                Event::Eof => {
                    return Err(XmlError::UnexpectedElement(
                        "unexpected EOF in NotificationConfiguration".to_owned(),
                    ));
                }
                _ => {}
            }
        }
        Ok(config)
    }
}

fn parse_notification_target(
    reader: &mut Reader<&[u8]>,
    arn_element: &str,
) -> Result<NotificationTarget, XmlError> {
    let mut target = NotificationTarget::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e)?;
                match name.as_str() {
                    "Id" => target.id = Some(read_text_content(reader)?),
                    "Event" => target.events.push(read_text_content(reader)?),
                    "Filter" => parse_notification_filter(reader, &mut target)?,
                    // Accept the alternate ARN element names too.
                    n if n == arn_element
                        || n == "Topic"
                        || n == "Queue"
                        || n == "CloudFunction" =>
                    {
                        target.arn = read_text_content(reader)?;
                    }
                    _ => skip_element(reader)?,
                }
            }
            Event::End(_) => break,
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in notification configuration".to_owned(),
                ));
            }
            _ => {}
        }
    }
    if target.arn.is_empty() {
        return Err(XmlError::MissingElement(arn_element.to_owned()));
    }
    Ok(target)
}

fn parse_notification_filter(
    reader: &mut Reader<&[u8]>,
    target: &mut NotificationTarget,
) -> Result<(), XmlError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match element_name(&e)?.as_str() {
                "S3Key" => parse_notification_filter(reader, target)?,
                "FilterRule" => {
                    let mut name = String::new();
                    let mut value = String::new();
                    loop {
                        match reader.read_event()? {
                            Event::Start(e) => match element_name(&e)?.as_str() {
                                "Name" => name = read_text_content(reader)?,
                                "Value" => value = read_text_content(reader)?,
                                _ => skip_element(reader)?,
                            },
                            Event::End(_) => break,
                            Event::Eof => {
                                return Err(XmlError::UnexpectedElement(
                                    "unexpected EOF in FilterRule".to_owned(),
                                ));
                            }
                            _ => {}
                        }
                    }
                    match name.to_ascii_lowercase().as_str() {
                        "prefix" => target.filter_prefix = Some(value),
                        "suffix" => target.filter_suffix = Some(value),
                        _ => {}
                    }
                }
                _ => skip_element(reader)?,
            },
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF in Filter".to_owned(),
                ));
            }
            _ => {}
        }
    }
}
