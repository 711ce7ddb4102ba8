//! Shared service state.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use tracing::info;

use basalt_access::EvaluatorConfig;
use basalt_index::{Index, UserRecord};
use basalt_store::DataStore;

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::multipart::MultipartCoordinator;

/// Name of the metadata database file under the storage root.
const METADATA_DB: &str = "metadata.db";

/// Everything a handler needs, shared behind one `Arc`.
#[derive(Debug)]
pub struct ServiceState {
    /// Server configuration.
    pub config: ServerConfig,
    /// The metadata index.
    pub index: Arc<Index>,
    /// The blob store.
    pub store: DataStore,
    /// The metrics registry.
    pub metrics: Metrics,
    /// The multipart coordinator (per-upload serialization).
    pub multipart: MultipartCoordinator,
    /// The seeded admin user.
    pub admin: UserRecord,
    /// Single-flight latch for the janitor.
    pub(crate) janitor_running: AtomicBool,
}

impl ServiceState {
    /// Open the storage root, the metadata database, and seed the admin
    /// user.
    ///
    /// # Errors
    ///
    /// Returns an error when the storage root cannot be prepared or the
    /// schema cannot be initialized.
    pub async fn open(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        tokio::fs::create_dir_all(&config.storage_root)
            .await
            .with_context(|| {
                format!("cannot create storage root {}", config.storage_root.display())
            })?;

        let store = DataStore::open(&config.storage_root)
            .await
            .context("cannot open blob store")?;
        let index = Arc::new(
            Index::open(&config.storage_root.join(METADATA_DB))
                .context("cannot initialize metadata index")?,
        );
        let admin = index
            .ensure_admin(&config.admin_access_key, &config.admin_secret_key)
            .context("cannot seed admin user")?;

        info!(
            storage = %config.storage_root.display(),
            admin = %admin.username,
            "service state ready"
        );

        Ok(Arc::new(Self {
            multipart: MultipartCoordinator::new(),
            metrics: Metrics::default(),
            janitor_running: AtomicBool::new(false),
            config,
            index,
            store,
            admin,
        }))
    }

    /// The evaluator feature gates derived from configuration.
    #[must_use]
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            allow_test_principal: self.config.allow_test_principal,
            admin_fallback_for_anonymous: self.config.admin_fallback_for_anonymous,
        }
    }

    /// The admin principal's canonical id.
    #[must_use]
    pub fn admin_id(&self) -> &str {
        &self.admin.canonical_id
    }
}
