//! Server configuration.

use std::path::PathBuf;

use typed_builder::TypedBuilder;

/// Default minimum size of a non-final multipart part: 5 MiB.
pub const DEFAULT_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Runtime configuration for the server.
///
/// Defaults match the CLI surface (`127.0.0.1:8080`, `./data`). Every field
/// can be overridden from `BASALT_*` environment variables via
/// [`ServerConfig::apply_env`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServerConfig {
    /// Bind hostname.
    #[builder(default = String::from("127.0.0.1"))]
    pub hostname: String,

    /// Bind port.
    #[builder(default = 8080)]
    pub port: u16,

    /// Root directory for the blob tree and the metadata database.
    #[builder(default = PathBuf::from("./data"))]
    pub storage_root: PathBuf,

    /// The region reported to clients.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Log level filter when `RUST_LOG` is unset.
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Seconds between lifecycle janitor passes.
    #[builder(default = 3600)]
    pub janitor_interval_secs: u64,

    /// Age in seconds after which idle multipart uploads are aborted.
    #[builder(default = 3600)]
    pub multipart_abort_secs: u64,

    /// Minimum size of every non-final multipart part.
    #[builder(default = DEFAULT_MIN_PART_SIZE)]
    pub min_part_size: u64,

    /// Page-size cap for listings.
    #[builder(default = 1000)]
    pub max_keys: usize,

    /// Optional overall per-request deadline.
    #[builder(default = None)]
    pub request_timeout_secs: Option<u64>,

    /// Honor the test-only principal bypass. MUST stay off in production.
    #[builder(default = false)]
    pub allow_test_principal: bool,

    /// Evaluate anonymous requests to admin-owned buckets as admin. MUST
    /// stay off in production.
    #[builder(default = false)]
    pub admin_fallback_for_anonymous: bool,

    /// Access key seeded for the admin user on first run.
    #[builder(default = String::from("admin"))]
    pub admin_access_key: String,

    /// Secret key seeded for the admin user on first run.
    #[builder(default = String::from("password"))]
    pub admin_secret_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServerConfig {
    /// The socket address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    /// Overlay `BASALT_*` environment variables onto this configuration.
    #[must_use]
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("BASALT_REGION") {
            self.region = v;
        }
        if let Ok(v) = std::env::var("BASALT_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("BASALT_JANITOR_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.janitor_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("BASALT_MULTIPART_ABORT_SECS") {
            if let Ok(n) = v.parse() {
                self.multipart_abort_secs = n;
            }
        }
        if let Ok(v) = std::env::var("BASALT_REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.request_timeout_secs = Some(n);
            }
        }
        if let Ok(v) = std::env::var("BASALT_ALLOW_TEST_PRINCIPAL") {
            self.allow_test_principal = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("BASALT_ADMIN_FALLBACK_FOR_ANONYMOUS") {
            self.admin_fallback_for_anonymous = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("BASALT_ADMIN_ACCESS_KEY") {
            self.admin_access_key = v;
        }
        if let Ok(v) = std::env::var("BASALT_ADMIN_SECRET_KEY") {
            self.admin_secret_key = v;
        }
        self
    }
}

/// Parse a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
