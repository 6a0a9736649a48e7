use std::sync::Arc;

use tracing::{error, info};

use crate::config::SyncConfig;
use crate::handlers::Hook;
use crate::orchestrator::{Orchestrator, RunSummary, SyncOptions};
use crate::s3::{ObjectStore, S3Store, create_s3_client};

/// Entry points a deployment host calls: one per lifecycle event, plus the
/// manual `sync` command.
///
/// The storage client is built on first use from the configuration, unless
/// one was injected with [`SyncPlugin::with_store`].
pub struct SyncPlugin {
    config: SyncConfig,
    store: Option<Arc<dyn ObjectStore>>,
}

impl SyncPlugin {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    pub fn with_store(config: SyncConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            store: Some(store),
        }
    }

    pub async fn dispatch(&self, hook: Hook) -> anyhow::Result<RunSummary> {
        match hook {
            Hook::DeployComplete => self.on_deploy_complete().await,
            Hook::BeforeRemove => self.on_before_remove().await,
            Hook::Sync => {
                self.sync_command(
                    || info!("Sync S3: manual sync requested"),
                    |result| match result {
                        Ok(_) => info!("Sync S3: manual sync done"),
                        Err(e) => error!("Sync S3: manual sync failed: {:#}", e),
                    },
                )
                .await
            }
        }
    }

    pub async fn on_deploy_complete(&self) -> anyhow::Result<RunSummary> {
        self.sync().await
    }

    pub async fn on_before_remove(&self) -> anyhow::Result<RunSummary> {
        let orchestrator = self.orchestrator().await?;
        let summary = orchestrator
            .run_empty(self.config.sync_s3.as_deref())
            .await
            .inspect_err(|e| error!("remove error: {}", e))?;
        Ok(summary)
    }

    /// Manual sync: `before` runs first, `after` sees the outcome before it is
    /// returned.
    pub async fn sync_command<B, A>(&self, before: B, after: A) -> anyhow::Result<RunSummary>
    where
        B: FnOnce(),
        A: FnOnce(&anyhow::Result<RunSummary>),
    {
        before();
        let result = self.sync().await;
        after(&result);
        result
    }

    async fn sync(&self) -> anyhow::Result<RunSummary> {
        let orchestrator = self.orchestrator().await?;
        let summary = orchestrator
            .run_sync(self.config.sync_s3.as_deref())
            .await
            .inspect_err(|e| error!("sync error: {}", e))?;
        Ok(summary)
    }

    async fn orchestrator(&self) -> anyhow::Result<Orchestrator> {
        let store: Arc<dyn ObjectStore> = match &self.store {
            Some(store) => Arc::clone(store),
            None => {
                let client = create_s3_client(&self.config).await.inspect_err(|e| {
                    error!("Failed to create S3 client: {:#}", e);
                })?;
                let store =
                    S3Store::new(client).with_cache_control(self.config.cache_control.clone());
                Arc::new(store)
            }
        };
        Ok(Orchestrator::new(store, SyncOptions::from(&self.config)))
    }
}
