// ABOUTME: DockerClient, the resilient facade every agent subsystem queries.
// ABOUTME: Gates calls on a live connection, bounds them by deadline and routes through caches.

use super::cache::TtlCache;
use super::deadline::{CallError, DeadlineGuard};
use super::discovery::ContainerIdProvider;
use super::error::{ClientError, InitError, TransportError};
use super::init::{GateStatus, InitGate, RetryPolicy};
use super::inspect::{ContainerInspection, InspectKey};
use super::resolver::ImageResolver;
use super::storage::{StorageStats, parse_storage_stats};
use super::transport::{ContainerListOptions, Connector, DockerTransport, filter};
use crate::types::ContainerId;
use bollard::models::{ContainerStatsResponse, ContainerSummary, ImageSummary, VolumeListResponse};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Construction-time options. Fixed for the client's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Budget for each daemon call.
    pub query_timeout: Duration,
    pub inspect_cache_ttl: Duration,
    /// Most inspection records held at once.
    pub inspect_cache_capacity: usize,
    pub collect_network: bool,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
            inspect_cache_ttl: Duration::from_secs(10),
            inspect_cache_capacity: 4096,
            collect_network: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Settings frozen by the first successful bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub collect_network: bool,
    #[serde(with = "humantime_serde")]
    pub inspect_cache_ttl: Duration,
}

/// Volume totals split by whether any container references them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VolumeCounts {
    pub attached: usize,
    pub dangling: usize,
}

struct Connection {
    transport: Arc<dyn DockerTransport>,
    settings: Settings,
}

/// Resilient Docker daemon client.
///
/// Construct one per agent and share it behind an `Arc`. The connection is
/// established lazily by the first operation; until it succeeds every
/// operation fails with `ClientError::Init`.
pub struct DockerClient {
    connector: Arc<dyn Connector>,
    id_provider: Arc<dyn ContainerIdProvider>,
    options: ClientOptions,
    guard: DeadlineGuard,
    gate: InitGate<Arc<Connection>>,
    resolver: ImageResolver,
    inspect_cache: TtlCache<InspectKey, ContainerInspection>,
    last_invalidate: RwLock<DateTime<Utc>>,
}

impl DockerClient {
    pub fn new(
        connector: Arc<dyn Connector>,
        id_provider: Arc<dyn ContainerIdProvider>,
        options: ClientOptions,
    ) -> Self {
        Self {
            connector,
            id_provider,
            guard: DeadlineGuard::new(options.query_timeout),
            gate: InitGate::new(options.retry),
            resolver: ImageResolver::new(),
            inspect_cache: TtlCache::with_capacity(options.inspect_cache_capacity),
            last_invalidate: RwLock::new(Utc::now()),
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Bootstrap state of the daemon connection.
    pub fn status(&self) -> GateStatus {
        self.gate.status()
    }

    /// Settings in effect, once the connection is up.
    pub fn settings(&self) -> Option<Settings> {
        self.gate.get().map(|connection| connection.settings)
    }

    /// Make sure the daemon connection is established and verified.
    pub async fn ensure_ready(&self, ctx: &CancellationToken) -> Result<(), ClientError> {
        self.connection(ctx).await.map(|_| ())
    }

    async fn connection(&self, ctx: &CancellationToken) -> Result<Arc<Connection>, ClientError> {
        if let Some(connection) = self.gate.get() {
            return Ok(connection);
        }

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                return Err(ClientError::Cancelled {
                    operation: "connect",
                    target: "daemon".to_string(),
                });
            }
            outcome = self.gate.get_or_init(|| self.bootstrap()) => outcome,
        };

        outcome.map_err(|source| {
            match &source {
                InitError::Failed { .. } => tracing::warn!("{}", source),
                _ => tracing::debug!("{}", source),
            }
            ClientError::Init { source }
        })
    }

    /// Connect, then prove the daemon answers before declaring success.
    ///
    /// Runs on its own token: a caller giving up must not poison the attempt
    /// other callers are waiting on.
    async fn bootstrap(&self) -> Result<Arc<Connection>, ClientError> {
        let ctx = CancellationToken::new();

        let transport = self
            .guard
            .run(&ctx, self.connector.connect())
            .await
            .map_err(|e| e.into_client_error("connect", "daemon"))?;

        let info = self
            .guard
            .run(&ctx, transport.info())
            .await
            .map_err(|e| e.into_client_error("info", "daemon"))?;

        let settings = Settings {
            collect_network: self.options.collect_network,
            inspect_cache_ttl: self.options.inspect_cache_ttl,
        };
        tracing::info!(
            "Connected to docker daemon {} (server {})",
            info.name.as_deref().unwrap_or("unknown"),
            info.server_version.as_deref().unwrap_or("unknown")
        );

        Ok(Arc::new(Connection {
            transport,
            settings,
        }))
    }

    // =========================================================================
    // Daemon facade
    // =========================================================================

    /// Image summaries; `all` includes intermediate layers.
    pub async fn images(
        &self,
        ctx: &CancellationToken,
        all: bool,
    ) -> Result<Vec<ImageSummary>, ClientError> {
        let connection = self.connection(ctx).await?;
        self.guard
            .run(ctx, connection.transport.list_images(all))
            .await
            .map_err(|e| e.into_client_error("list images", "daemon"))
    }

    /// Attached and dangling volume counts, fetched under one deadline.
    pub async fn count_volumes(&self, ctx: &CancellationToken) -> Result<VolumeCounts, ClientError> {
        let connection = self.connection(ctx).await?;
        let transport = &connection.transport;

        let (attached, dangling) = self
            .guard
            .run(ctx, async {
                let attached = transport.list_volumes(filter("dangling", "false")).await?;
                let dangling = transport.list_volumes(filter("dangling", "true")).await?;
                Ok::<_, TransportError>((attached, dangling))
            })
            .await
            .map_err(|e| e.into_client_error("list volumes", "daemon"))?;

        Ok(VolumeCounts {
            attached: volume_count(&attached),
            dangling: volume_count(&dangling),
        })
    }

    pub async fn raw_container_list(
        &self,
        ctx: &CancellationToken,
        options: &ContainerListOptions,
    ) -> Result<Vec<ContainerSummary>, ClientError> {
        let connection = self.connection(ctx).await?;
        self.guard
            .run(ctx, connection.transport.list_containers(options))
            .await
            .map_err(|e| e.into_client_error("list containers", "daemon"))
    }

    /// The daemon host's name.
    pub async fn hostname(&self, ctx: &CancellationToken) -> Result<String, ClientError> {
        let connection = self.connection(ctx).await?;
        let info = self
            .guard
            .run(ctx, connection.transport.info())
            .await
            .map_err(|e| e.into_client_error("info", "daemon"))?;

        Ok(info.name.unwrap_or_default())
    }

    pub async fn storage_stats(
        &self,
        ctx: &CancellationToken,
    ) -> Result<Vec<StorageStats>, ClientError> {
        let connection = self.connection(ctx).await?;
        let info = self
            .guard
            .run(ctx, connection.transport.info())
            .await
            .map_err(|e| e.into_client_error("info", "daemon"))?;

        parse_storage_stats(&info).map_err(|source| ClientError::StorageStats { source })
    }

    /// One non-streaming stats sample.
    pub async fn container_stats(
        &self,
        ctx: &CancellationToken,
        id: &ContainerId,
    ) -> Result<ContainerStatsResponse, ClientError> {
        let connection = self.connection(ctx).await?;
        self.guard
            .run(ctx, connection.transport.container_stats(id))
            .await
            .map_err(|e| e.into_client_error("container stats", id.as_str()))
    }

    /// Labels of every running container, keyed by container ID.
    pub async fn all_container_labels(
        &self,
        ctx: &CancellationToken,
    ) -> Result<HashMap<ContainerId, HashMap<String, String>>, ClientError> {
        let containers = self
            .raw_container_list(ctx, &ContainerListOptions::default())
            .await?;

        Ok(containers
            .into_iter()
            .filter_map(|summary| {
                let id = summary.id.filter(|id| !id.is_empty())?;
                Some((ContainerId::new(id), summary.labels.unwrap_or_default()))
            })
            .collect())
    }

    // =========================================================================
    // Image names
    // =========================================================================

    /// Human-readable name for an image reference. Digest forms are looked
    /// up once and remembered; anything else is returned as is.
    pub async fn resolve_image_name(
        &self,
        ctx: &CancellationToken,
        reference: &str,
    ) -> Result<String, ClientError> {
        let connection = self.connection(ctx).await?;
        self.resolver
            .resolve(connection.transport.as_ref(), &self.guard, ctx, reference)
            .await
    }

    pub async fn resolve_image_name_from_container(
        &self,
        ctx: &CancellationToken,
        container: &ContainerInspection,
    ) -> Result<String, ClientError> {
        let connection = self.connection(ctx).await?;
        self.resolver
            .resolve_from_container(connection.transport.as_ref(), &self.guard, ctx, container)
            .await
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Inspect a container, served from the inspect cache when possible.
    ///
    /// A cached sized record also answers an unsized request.
    pub async fn inspect(
        &self,
        ctx: &CancellationToken,
        id: &ContainerId,
        with_size: bool,
    ) -> Result<ContainerInspection, ClientError> {
        let connection = self.connection(ctx).await?;

        for key in InspectKey::lookup_order(id, with_size) {
            if let Some(record) = self.inspect_cache.get(&key) {
                tracing::debug!("inspect cache hit for {} (size: {})", id.short(), key.with_size);
                return Ok(record);
            }
        }
        tracing::debug!("inspect cache miss for {} (size: {})", id.short(), with_size);

        let record = self.inspect_no_cache(ctx, id, with_size).await?;
        let key = InspectKey::new(id, with_size);
        if let Err(e) =
            self.inspect_cache
                .set(key, record.clone(), connection.settings.inspect_cache_ttl)
        {
            tracing::warn!("Failed to cache inspection of {}: {}", id.short(), e);
        }
        Ok(record)
    }

    /// Inspect a container straight from the daemon.
    pub async fn inspect_no_cache(
        &self,
        ctx: &CancellationToken,
        id: &ContainerId,
        with_size: bool,
    ) -> Result<ContainerInspection, ClientError> {
        let connection = self.connection(ctx).await?;

        let raw = match self
            .guard
            .run(ctx, connection.transport.inspect_container(id, with_size))
            .await
        {
            Ok(raw) => raw,
            Err(CallError::Transport(e)) if e.is_not_found() => {
                return Err(ClientError::ContainerNotFound { id: id.clone() });
            }
            Err(e) => return Err(e.into_client_error("inspect container", id.as_str())),
        };

        ContainerInspection::from_response(raw, with_size).map_err(|source| {
            ClientError::InvalidInspectData {
                id: id.clone(),
                source,
            }
        })
    }

    /// Inspect the container this agent runs in.
    pub async fn inspect_self(
        &self,
        ctx: &CancellationToken,
    ) -> Result<ContainerInspection, ClientError> {
        let id = self
            .id_provider
            .agent_container_id()
            .map_err(|source| ClientError::Discovery { source })?;
        self.inspect(ctx, &id, false).await
    }

    // =========================================================================
    // Cache bookkeeping
    // =========================================================================

    /// Drop every cached image name and inspection record.
    pub fn invalidate_caches(&self) {
        self.resolver.clear();
        self.inspect_cache.clear();
        *self.last_invalidate.write() = Utc::now();
        tracing::debug!("docker client caches invalidated");
    }

    /// When the caches were last invalidated (client creation if never).
    pub fn last_invalidate(&self) -> DateTime<Utc> {
        *self.last_invalidate.read()
    }

    /// Reclaim expired inspect cache entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.inspect_cache.purge_expired()
    }
}

fn volume_count(response: &VolumeListResponse) -> usize {
    response.volumes.as_ref().map_or(0, Vec::len)
}
