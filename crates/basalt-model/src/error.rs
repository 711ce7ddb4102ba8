//! The S3 error taxonomy.
//!
//! Every component in the workspace raises [`S3Error`]; the HTTP layer
//! translates it into the XML `<Error>` envelope. Each [`S3ErrorCode`]
//! carries its wire code string, a default human-readable message, and the
//! HTTP status it maps to.

use std::fmt;

/// Well-known S3 error codes produced by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum S3ErrorCode {
    /// Access denied by policy, ACL, or default deny.
    #[default]
    AccessDenied,
    /// The Content-MD5 did not match the received bytes.
    BadDigest,
    /// The requested bucket name is taken by another account.
    BucketAlreadyExists,
    /// The bucket already exists and is owned by the caller.
    BucketAlreadyOwnedByYou,
    /// The bucket still holds live object versions or uploads.
    BucketNotEmpty,
    /// The presented security token has expired.
    ExpiredToken,
    /// Fewer bytes arrived than the declared Content-Length.
    IncompleteBody,
    /// Internal server error.
    InternalError,
    /// The access key id does not exist.
    InvalidAccessKeyId,
    /// An argument was malformed.
    InvalidArgument,
    /// The bucket name violates the naming rules.
    InvalidBucketName,
    /// A multipart part was missing or its ETag did not match.
    InvalidPart,
    /// The multipart part list was not in ascending order.
    InvalidPartOrder,
    /// The requested byte range cannot be satisfied.
    InvalidRange,
    /// The request was malformed.
    InvalidRequest,
    /// A non-final multipart part was below the minimum size.
    EntityTooSmall,
    /// The bucket policy document could not be parsed.
    MalformedPolicy,
    /// The XML body was not well-formed.
    MalformedXML,
    /// The HTTP method is not allowed against this resource.
    MethodNotAllowed,
    /// The specified bucket does not exist.
    NoSuchBucket,
    /// The specified bucket has no policy.
    NoSuchBucketPolicy,
    /// The specified key does not exist.
    NoSuchKey,
    /// The specified bucket has no lifecycle configuration.
    NoSuchLifecycleConfiguration,
    /// The specified multipart upload does not exist.
    NoSuchUpload,
    /// The requested functionality is not implemented.
    NotImplemented,
    /// The request signature did not match.
    SignatureDoesNotMatch,
    /// The `x-amz-content-sha256` header did not match the body.
    XAmzContentSHA256Mismatch,
}

impl S3ErrorCode {
    /// Returns the wire code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::BadDigest => "BadDigest",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketAlreadyOwnedByYou => "BucketAlreadyOwnedByYou",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::ExpiredToken => "ExpiredToken",
            Self::IncompleteBody => "IncompleteBody",
            Self::InternalError => "InternalError",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::InvalidRange => "InvalidRange",
            Self::InvalidRequest => "InvalidRequest",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::MalformedPolicy => "MalformedPolicy",
            Self::MalformedXML => "MalformedXML",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchBucketPolicy => "NoSuchBucketPolicy",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchLifecycleConfiguration => "NoSuchLifecycleConfiguration",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::NotImplemented => "NotImplemented",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::XAmzContentSHA256Mismatch => "XAmzContentSHA256Mismatch",
        }
    }

    /// Returns the HTTP status code this error maps to.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::BadDigest
            | Self::IncompleteBody
            | Self::InvalidArgument
            | Self::InvalidBucketName
            | Self::InvalidPart
            | Self::InvalidPartOrder
            | Self::InvalidRequest
            | Self::EntityTooSmall
            | Self::MalformedPolicy
            | Self::MalformedXML
            | Self::XAmzContentSHA256Mismatch => http::StatusCode::BAD_REQUEST,
            Self::AccessDenied
            | Self::ExpiredToken
            | Self::InvalidAccessKeyId
            | Self::SignatureDoesNotMatch => http::StatusCode::FORBIDDEN,
            Self::NoSuchBucket
            | Self::NoSuchBucketPolicy
            | Self::NoSuchKey
            | Self::NoSuchLifecycleConfiguration
            | Self::NoSuchUpload => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::BucketAlreadyExists | Self::BucketAlreadyOwnedByYou | Self::BucketNotEmpty => {
                http::StatusCode::CONFLICT
            }
            Self::InvalidRange => http::StatusCode::RANGE_NOT_SATISFIABLE,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => http::StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Returns the default message for this error.
    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::BadDigest => "The Content-MD5 you specified did not match what we received",
            Self::BucketAlreadyExists => "The requested bucket name is not available",
            Self::BucketAlreadyOwnedByYou => "The bucket is already owned by you",
            Self::BucketNotEmpty => "The bucket you tried to delete is not empty",
            Self::ExpiredToken => "The provided token has expired",
            Self::IncompleteBody => {
                "You did not provide the number of bytes specified by the Content-Length header"
            }
            Self::InternalError => "We encountered an internal error. Please try again.",
            Self::InvalidAccessKeyId => {
                "The AWS access key Id you provided does not exist in our records"
            }
            Self::InvalidArgument => "Invalid Argument",
            Self::InvalidBucketName => "The specified bucket is not valid",
            Self::InvalidPart => "One or more of the specified parts could not be found",
            Self::InvalidPartOrder => "The list of parts was not in ascending order",
            Self::InvalidRange => "The requested range is not satisfiable",
            Self::InvalidRequest => "Invalid Request",
            Self::EntityTooSmall => {
                "Your proposed upload is smaller than the minimum allowed size"
            }
            Self::MalformedPolicy => "Policies must be valid JSON and the first byte must be '{'",
            Self::MalformedXML => "The XML you provided was not well-formed",
            Self::MethodNotAllowed => "The specified method is not allowed against this resource",
            Self::NoSuchBucket => "The specified bucket does not exist",
            Self::NoSuchBucketPolicy => "The specified bucket does not have a bucket policy",
            Self::NoSuchKey => "The specified key does not exist",
            Self::NoSuchLifecycleConfiguration => "The lifecycle configuration does not exist",
            Self::NoSuchUpload => "The specified multipart upload does not exist",
            Self::NotImplemented => "The functionality is not implemented",
            Self::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided"
            }
            Self::XAmzContentSHA256Mismatch => {
                "The provided 'x-amz-content-sha256' header does not match what was computed"
            }
        }
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An S3 error response.
///
/// Carries the code, the message placed in the XML envelope, the resource
/// that triggered the error, and any extra response headers the error needs
/// (e.g. `Content-Range: bytes */<size>` on a 416).
#[derive(Debug)]
pub struct S3Error {
    /// The error code.
    pub code: S3ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The resource that caused the error.
    pub resource: Option<String>,
    /// Extra response headers to attach to the error response.
    pub headers: Vec<(String, String)>,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl S3Error {
    /// Create a new error from a code, using its default message.
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_owned(),
            resource: None,
            headers: Vec::new(),
            status_code: code.status_code(),
            source: None,
        }
    }

    /// Create a new error with a custom message.
    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.status_code(),
            message: message.into(),
            code,
            resource: None,
            headers: Vec::new(),
            source: None,
        }
    }

    /// Set the resource that caused this error.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attach a response header to this error.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a `NoSuchBucket` error for the given bucket.
    #[must_use]
    pub fn no_such_bucket(bucket: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchBucket).with_resource(bucket)
    }

    /// Create a `NoSuchKey` error for the given key.
    #[must_use]
    pub fn no_such_key(key: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchKey).with_resource(key)
    }

    /// Create a `NoSuchUpload` error for the given upload id.
    #[must_use]
    pub fn no_such_upload(upload_id: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchUpload).with_resource(upload_id)
    }

    /// Create an `AccessDenied` error for the given resource.
    #[must_use]
    pub fn access_denied(resource: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::AccessDenied).with_resource(resource)
    }

    /// Create an `InternalError` with a custom message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InternalError, message)
    }

    /// Create an `InvalidArgument` error with a custom message.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InvalidArgument, message)
    }

    /// Create an `InvalidRange` error carrying the mandatory
    /// `Content-Range: bytes */<size>` header.
    #[must_use]
    pub fn invalid_range(object_size: u64) -> Self {
        Self::new(S3ErrorCode::InvalidRange)
            .with_header("Content-Range", format!("bytes */{object_size}"))
    }

    /// Create a `MethodNotAllowed` error for the given method.
    #[must_use]
    pub fn method_not_allowed(method: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::MethodNotAllowed).with_resource(method)
    }

    /// Create a `NotImplemented` error for the given feature.
    #[must_use]
    pub fn not_implemented(detail: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NotImplemented).with_resource(detail)
    }
}

impl From<std::io::Error> for S3Error {
    fn from(err: std::io::Error) -> Self {
        Self::internal("storage I/O failure").with_source(err)
    }
}

/// Create an [`S3Error`] from an error code, optionally with a message.
///
/// # Examples
///
/// ```
/// use basalt_model::s3_error;
/// use basalt_model::error::S3ErrorCode;
///
/// let err = s3_error!(NoSuchBucket);
/// assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
///
/// let err = s3_error!(InvalidArgument, "max-keys must be non-negative");
/// assert_eq!(err.message, "max-keys must be non-negative");
/// ```
#[macro_export]
macro_rules! s3_error {
    ($code:ident) => {
        $crate::error::S3Error::new($crate::error::S3ErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::S3Error::with_message($crate::error::S3ErrorCode::$code, $msg)
    };
}
