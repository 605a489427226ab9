// ABOUTME: Test support utilities.
// ABOUTME: Scripted in-memory daemon transport and connector that count every call.

// Each test binary only uses some of these helpers, so allow dead_code.
#![allow(dead_code)]

use async_trait::async_trait;
use bollard::models::{
    ContainerConfig, ContainerInspectResponse, ContainerState, ContainerStatsResponse,
    ContainerSummary, ImageInspect, ImageSummary, SystemInfo, Volume, VolumeListResponse,
};
use dockutil::docker::{
    ClientOptions, Connector, ContainerListOptions, DockerClient, DockerTransport, Filters,
    RetryPolicy, StaticIdProvider, TransportError,
};
use dockutil::types::ContainerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("dockutil=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const SELF_ID: &str = "5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f5e1f";

/// An in-memory daemon. Responses are scripted per method; unknown images
/// and containers answer `NotFound`.
pub struct MockTransport {
    info: Mutex<Result<SystemInfo, TransportError>>,
    images: Mutex<HashMap<String, Result<ImageInspect, TransportError>>>,
    containers: Mutex<HashMap<String, ContainerInspectResponse>>,
    summaries: Mutex<Vec<ContainerSummary>>,
    volumes: Mutex<(usize, usize)>,
    delay: Mutex<Duration>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            info: Mutex::new(Ok(SystemInfo {
                name: Some("docker-host".to_string()),
                server_version: Some("27.0.1".to_string()),
                ..Default::default()
            })),
            images: Mutex::new(HashMap::new()),
            containers: Mutex::new(HashMap::new()),
            summaries: Mutex::new(Vec::new()),
            volumes: Mutex::new((0, 0)),
            delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// How many times `method` was called.
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    pub fn set_info(&self, info: Result<SystemInfo, TransportError>) {
        *self.info.lock() = info;
    }

    pub fn set_image(&self, reference: &str, image: Result<ImageInspect, TransportError>) {
        self.images.lock().insert(reference.to_string(), image);
    }

    pub fn set_container(&self, id: &str, response: ContainerInspectResponse) {
        self.containers.lock().insert(id.to_string(), response);
    }

    pub fn set_summaries(&self, summaries: Vec<ContainerSummary>) {
        *self.summaries.lock() = summaries;
    }

    pub fn set_volumes(&self, attached: usize, dangling: usize) {
        *self.volumes.lock() = (attached, dangling);
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    async fn record(&self, method: &'static str) {
        *self.calls.lock().entry(method).or_default() += 1;
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DockerTransport for MockTransport {
    async fn info(&self) -> Result<SystemInfo, TransportError> {
        self.record("info").await;
        self.info.lock().clone()
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageSummary>, TransportError> {
        self.record("list_images").await;
        let count = if all { 3 } else { 1 };
        Ok((0..count)
            .map(|i| ImageSummary {
                id: format!("sha256:{i:064}"),
                ..Default::default()
            })
            .collect())
    }

    async fn list_volumes(&self, filters: Filters) -> Result<VolumeListResponse, TransportError> {
        self.record("list_volumes").await;
        let (attached, dangling) = *self.volumes.lock();
        let dangling_only = filters
            .get("dangling")
            .is_some_and(|values| values.iter().any(|v| v == "true"));
        let count = if dangling_only { dangling } else { attached };
        Ok(VolumeListResponse {
            volumes: Some(vec![Volume::default(); count]),
            ..Default::default()
        })
    }

    async fn list_containers(
        &self,
        _options: &ContainerListOptions,
    ) -> Result<Vec<ContainerSummary>, TransportError> {
        self.record("list_containers").await;
        Ok(self.summaries.lock().clone())
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect, TransportError> {
        self.record("inspect_image").await;
        self.images
            .lock()
            .get(reference)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::NotFound(format!("No such image: {reference}"))))
    }

    async fn inspect_container(
        &self,
        id: &ContainerId,
        with_size: bool,
    ) -> Result<ContainerInspectResponse, TransportError> {
        self.record("inspect_container").await;
        let mut response = self
            .containers
            .lock()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| TransportError::NotFound(format!("No such container: {id}")))?;
        if with_size {
            response.size_rw = Some(1024);
            response.size_root_fs = Some(4096);
        }
        Ok(response)
    }

    async fn container_stats(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerStatsResponse, TransportError> {
        self.record("container_stats").await;
        if !self.containers.lock().contains_key(id.as_str()) {
            return Err(TransportError::NotFound(format!("No such container: {id}")));
        }
        Ok(ContainerStatsResponse::default())
    }
}

/// Hands out one shared `MockTransport`, or refuses while `fail` is set.
pub struct MockConnector {
    transport: Arc<MockTransport>,
    fail: AtomicBool,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(transport: Arc<MockTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            fail: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Arc<dyn DockerTransport>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("connection refused".to_string()));
        }
        Ok(self.transport.clone())
    }
}

/// Options with a short, bounded retry policy.
pub fn options() -> ClientOptions {
    ClientOptions {
        query_timeout: Duration::from_secs(5),
        inspect_cache_ttl: Duration::from_secs(10),
        inspect_cache_capacity: 64,
        collect_network: true,
        retry: RetryPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            max_attempts: None,
        },
    }
}

/// A client over `transport` whose own container is `SELF_ID`.
pub fn client_with(
    transport: Arc<MockTransport>,
    options: ClientOptions,
) -> (Arc<DockerClient>, Arc<MockConnector>) {
    init_tracing();
    let connector = MockConnector::new(transport);
    let client = DockerClient::new(
        connector.clone(),
        Arc::new(StaticIdProvider::new(SELF_ID)),
        options,
    );
    (Arc::new(client), connector)
}

pub fn client(transport: Arc<MockTransport>) -> (Arc<DockerClient>, Arc<MockConnector>) {
    client_with(transport, options())
}

/// A well-formed inspect response for a running container.
pub fn container(id: &str, config_image: &str, image_id: &str) -> ContainerInspectResponse {
    ContainerInspectResponse {
        id: Some(id.to_string()),
        name: Some(format!("/{id}")),
        image: Some(image_id.to_string()),
        state: Some(ContainerState {
            running: Some(true),
            ..Default::default()
        }),
        config: Some(ContainerConfig {
            image: Some(config_image.to_string()),
            labels: Some(HashMap::from([("app".to_string(), id.to_string())])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn image(tags: &[&str], digests: &[&str]) -> ImageInspect {
    ImageInspect {
        repo_tags: Some(tags.iter().map(|t| t.to_string()).collect()),
        repo_digests: Some(digests.iter().map(|d| d.to_string()).collect()),
        ..Default::default()
    }
}
