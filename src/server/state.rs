//! Shared request state.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{LiteLlmClient, LlmProvider};
use crate::metrics::MetricsCollector;
use crate::storage::{Bucket, Database, DatabaseError, FileStore, Sweeper};

/// State handed to every tool router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<Database>,
    pub transfer: Arc<FileStore>,
    pub gigafile: Arc<FileStore>,
    /// Proofreading reviewer; `None` runs the rule engine alone.
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub metrics: MetricsCollector,
}

impl AppState {
    /// Builds state around an already migrated database.
    pub fn new(config: AppConfig, db: Arc<Database>) -> Self {
        let store = |bucket: Bucket| {
            let info = bucket.tool().info();
            Arc::new(FileStore::new(
                bucket,
                config.tool_dir(bucket.tool()),
                db.clone(),
                config.retention,
                info.max_upload.unwrap_or(u64::MAX),
            ))
        };

        let transfer = store(Bucket::Transfer);
        let gigafile = store(Bucket::Gigafile);

        Self {
            config: Arc::new(config),
            db,
            transfer,
            gigafile,
            llm: None,
            metrics: MetricsCollector::new(),
        }
    }

    /// Connects the database, runs migrations and wires the LLM client when
    /// one is configured.
    pub async fn connect(config: AppConfig) -> Result<Self, DatabaseError> {
        if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
            tracing::warn!(path = %config.data_dir.display(), error = %e, "Could not create data dir");
        }

        let db = Arc::new(Database::connect(&config.database_url()).await?);
        db.run_migrations().await?;

        let llm: Option<Arc<dyn LlmProvider>> = if config.llm_enabled() {
            match LiteLlmClient::from_config(&config) {
                Ok(client) => {
                    tracing::info!(
                        api_base = client.api_base(),
                        model = client.default_model(),
                        authenticated = client.has_api_key(),
                        "LLM reviewer enabled"
                    );
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "LLM reviewer disabled");
                    None
                }
            }
        } else {
            None
        };

        let mut state = Self::new(config, db);
        state.llm = llm;
        Ok(state)
    }

    /// Replaces the LLM provider.
    pub fn with_llm(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(provider);
        self
    }

    pub fn store(&self, bucket: Bucket) -> &Arc<FileStore> {
        match bucket {
            Bucket::Transfer => &self.transfer,
            Bucket::Gigafile => &self.gigafile,
        }
    }

    /// Background sweeper over both buckets.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            vec![self.transfer.clone(), self.gigafile.clone()],
            self.db.clone(),
            self.config.retention,
            self.config.sweep_interval,
        )
    }
}
