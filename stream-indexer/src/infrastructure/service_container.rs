//! Service container for dependency injection

use crate::adapters::chain::{AdminDirectory, StacksNodeClient, UnconfiguredChain};
use crate::adapters::fanout::{BroadcastPublisher, FanOut, MultiPublisher, RedisPublisher, StoreNotificationSink};
use crate::adapters::storage::{MemoryStore, PostgresStore, Projection};
use crate::api::{ApiState, PayloadGate};
use crate::config::{IndexerConfig, StorageBackend};
use crate::core::{ChainReader, Domain, IndexerResult, OwnershipView, ProjectionStore, RealtimePublisher};
use crate::domain::processors::{
    AccessControlProcessor, DomainProcessor, MarketplaceProcessor, NftProcessor, PaymentProcessor,
    StreamProcessor, TreasuryProcessor,
};
use crate::metrics::Metrics;
use crate::pipeline::{BatchIngest, IngestPipeline};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Externally connected pieces the container is assembled from
pub struct Backends {
    pub store: Arc<dyn ProjectionStore>,
    pub chain: Arc<dyn ChainReader>,
    /// Extra real-time publishers besides the in-process websocket feed
    pub publishers: Vec<Arc<dyn RealtimePublisher>>,
}

impl Backends {
    /// Connect everything the configuration names
    pub async fn connect(config: &IndexerConfig) -> IndexerResult<Self> {
        let store: Arc<dyn ProjectionStore> = match config.storage.backend {
            StorageBackend::Postgres => {
                let store = PostgresStore::connect(&config.storage.url, config.storage.max_connections).await?;
                store.ensure_schema().await?;
                info!("Postgres projection store ready");
                Arc::new(store)
            }
            StorageBackend::Memory => {
                warn!("using in-memory projection store, state is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let chain: Arc<dyn ChainReader> = if config.chain.treasury_contract.is_empty() {
            warn!("no treasury contract configured, using fallback admins and threshold");
            Arc::new(UnconfiguredChain)
        } else {
            Arc::new(StacksNodeClient::new(&config.chain)?)
        };

        let mut publishers: Vec<Arc<dyn RealtimePublisher>> = Vec::new();
        if let Some(url) = &config.realtime.redis_url {
            let redis = RedisPublisher::connect(url, config.realtime.channel_prefix.clone()).await?;
            info!("Redis real-time publisher connected");
            publishers.push(Arc::new(redis));
        }

        Ok(Self {
            store,
            chain,
            publishers,
        })
    }
}

/// Service container managing all dependencies
pub struct ServiceContainer {
    pub config: IndexerConfig,
    pub metrics: Metrics,
    pub projection: Projection,
    pub realtime: BroadcastPublisher,
    pub admins: Arc<AdminDirectory>,
    pub pipelines: HashMap<Domain, Arc<dyn BatchIngest>>,
    pub payments: Arc<PaymentProcessor>,
    pub gate: Arc<PayloadGate>,
}

impl ServiceContainer {
    /// Initialize the service container with all dependencies
    pub async fn new(config: IndexerConfig) -> IndexerResult<Self> {
        info!("Initializing service container");
        let backends = Backends::connect(&config).await?;
        Self::assemble(config, backends)
    }

    /// Wire processors, pipelines and the gate over already connected backends
    pub fn assemble(config: IndexerConfig, backends: Backends) -> IndexerResult<Self> {
        let metrics = Metrics::new()?;
        let projection = Projection::new(backends.store);

        let realtime = BroadcastPublisher::new(config.realtime.broadcast_capacity);
        let mut publishers: Vec<Arc<dyn RealtimePublisher>> = vec![Arc::new(realtime.clone())];
        publishers.extend(backends.publishers);
        let fanout = FanOut::new(
            Arc::new(StoreNotificationSink::new(projection.clone())),
            Arc::new(MultiPublisher::new(publishers)),
        )
        .with_metrics(metrics.clone());

        let admins = Arc::new(AdminDirectory::new(
            backends.chain.clone(),
            Duration::from_secs(config.chain.admin_cache_ttl_secs),
            config.chain.fallback_admins.clone(),
        ));
        let ownership: Arc<dyn OwnershipView> = Arc::new(projection.clone());

        let wire = Wiring {
            projection: &projection,
            journal_depth: config.indexer.journal_depth,
            metrics: &metrics,
        };
        let pipelines = HashMap::from([
            wire.pipeline(StreamProcessor::new(projection.clone(), fanout.clone())),
            wire.pipeline(MarketplaceProcessor::new(
                projection.clone(),
                ownership.clone(),
                fanout.clone(),
            )),
            wire.pipeline(NftProcessor::new(projection.clone(), ownership, fanout.clone())),
            wire.pipeline(TreasuryProcessor::new(
                projection.clone(),
                fanout.clone(),
                admins.clone(),
                backends.chain,
                config.chain.fallback_threshold,
            )),
            wire.pipeline(AccessControlProcessor::new(
                projection.clone(),
                fanout.clone(),
                admins.clone(),
            )),
        ]);
        info!(domains = pipelines.len(), "Domain pipelines initialized");

        let payments = Arc::new(PaymentProcessor::new(projection.clone(), fanout));
        let gate = Arc::new(
            PayloadGate::new(
                &config.rate_limit,
                config.auth.chainhook_token.clone(),
                config.auth.payment_secret.clone(),
            )
            .with_metrics(metrics.clone()),
        );

        Ok(Self {
            config,
            metrics,
            projection,
            realtime,
            admins,
            pipelines,
            payments,
            gate,
        })
    }

    /// State handed to the HTTP router
    pub fn api_state(&self) -> ApiState {
        ApiState {
            pipelines: Arc::new(self.pipelines.clone()),
            payments: self.payments.clone(),
            gate: self.gate.clone(),
            realtime: self.realtime.clone(),
            projection: self.projection.clone(),
        }
    }

    /// Perform health check on all services
    pub async fn health_check(&self) -> IndexerResult<()> {
        self.projection.store().health_check().await?;
        info!("All services healthy");
        Ok(())
    }
}

struct Wiring<'a> {
    projection: &'a Projection,
    journal_depth: u64,
    metrics: &'a Metrics,
}

impl Wiring<'_> {
    fn pipeline<P: DomainProcessor>(&self, processor: P) -> (Domain, Arc<dyn BatchIngest>) {
        let pipeline = IngestPipeline::new(Arc::new(processor), self.projection.clone(), self.journal_depth)
            .with_metrics(self.metrics.clone());
        (pipeline.domain(), Arc::new(pipeline))
    }
}
