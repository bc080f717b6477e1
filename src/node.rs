//! A single asset trail node wired from local collaborators

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AssetTrailConfig;
use crate::events::{DispatchStats, EventDispatcher, EventFailure};
use crate::instances::AssetInstanceService;
use crate::ledger::LoopbackLedger;
use crate::logging;
use crate::repository::{LocalInstanceRepository, MemoryDefinitionSource};
use crate::schema::JsonSchemaValidator;
use crate::storage::{LocalContentStore, LocalDocumentExchange};

pub struct AssetTrailNode {
    config: AssetTrailConfig,
    service: Arc<AssetInstanceService>,
    definitions: Arc<MemoryDefinitionSource>,
    repository: Arc<LocalInstanceRepository>,
    ledger: Arc<LoopbackLedger>,
    dispatcher: Arc<EventDispatcher>,
    dispatch: JoinHandle<DispatchStats>,
    failures: mpsc::UnboundedReceiver<EventFailure>,
}

impl AssetTrailNode {
    /// Open the stores under `config.data_dir` and start reconciling
    /// confirmations from the loopback ledger.
    pub async fn open(config: AssetTrailConfig) -> anyhow::Result<Self> {
        logging::init(&config.log_level);

        let storage = config.storage();
        let public_store = Arc::new(
            LocalContentStore::new(&storage.content_dir)
                .await
                .with_context(|| format!("opening content store {}", storage.content_dir.display()))?,
        );
        let exchange = Arc::new(
            LocalDocumentExchange::new(&storage.exchange_dir)
                .await
                .with_context(|| format!("opening exchange {}", storage.exchange_dir.display()))?,
        );
        let repository = if config.persist_instances {
            let dir = config.instances_dir();
            Arc::new(
                LocalInstanceRepository::open(&dir)
                    .await
                    .with_context(|| format!("loading instances from {}", dir.display()))?,
            )
        } else {
            Arc::new(LocalInstanceRepository::in_memory())
        };
        let definitions = Arc::new(MemoryDefinitionSource::new());
        let (ledger, events) = LoopbackLedger::channel(config.event_buffer);
        let ledger = Arc::new(ledger);

        let service = Arc::new(AssetInstanceService::new(
            definitions.clone(),
            repository.clone(),
            Arc::new(JsonSchemaValidator),
            public_store,
            exchange,
            ledger.clone(),
        ));

        let (escalation_tx, failures) = mpsc::unbounded_channel();
        let dispatcher = EventDispatcher::with_escalation(service.clone(), escalation_tx);
        let dispatch = dispatcher.start(events);

        log::info!(
            "Asset trail node open at {} ({} instances)",
            config.data_dir.display(),
            repository.len().await
        );

        Ok(Self {
            config,
            service,
            definitions,
            repository,
            ledger,
            dispatcher,
            dispatch,
            failures,
        })
    }

    pub fn config(&self) -> &AssetTrailConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<AssetInstanceService> {
        &self.service
    }

    pub fn definitions(&self) -> &Arc<MemoryDefinitionSource> {
        &self.definitions
    }

    pub fn repository(&self) -> &Arc<LocalInstanceRepository> {
        &self.repository
    }

    pub fn ledger(&self) -> &Arc<LoopbackLedger> {
        &self.ledger
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Confirmations that failed to reconcile, in the order they failed
    pub fn failures(&mut self) -> &mut mpsc::UnboundedReceiver<EventFailure> {
        &mut self.failures
    }

    /// Stop the dispatcher. Confirmations still queued are left unreconciled.
    pub async fn shutdown(self) -> anyhow::Result<DispatchStats> {
        self.dispatcher.stop();
        let stats = self.dispatch.await.context("event dispatcher task failed")?;
        log::info!(
            "Asset trail node stopped: {} reconciled, {} failed",
            stats.reconciled,
            stats.failed
        );
        Ok(stats)
    }
}
