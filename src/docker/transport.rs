// ABOUTME: The narrow daemon interface the resilient client is built on.
// ABOUTME: DockerTransport issues raw API calls; Connector produces a negotiated transport.

use super::error::TransportError;
use crate::types::ContainerId;
use async_trait::async_trait;
use bollard::models::{
    ContainerInspectResponse, ContainerStatsResponse, ContainerSummary, ImageInspect,
    ImageSummary, SystemInfo, VolumeListResponse,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Query filters in the daemon's `{"key": ["value", ...]}` shape.
pub type Filters = HashMap<String, Vec<String>>;

/// Build a single-key filter set.
pub fn filter(key: &str, value: &str) -> Filters {
    HashMap::from([(key.to_string(), vec![value.to_string()])])
}

/// Options for listing containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerListOptions {
    /// Include stopped containers.
    pub all: bool,
    /// Ask the daemon to compute `SizeRw`/`SizeRootFs`.
    pub size: bool,
    /// Return at most this many of the most recently created containers.
    pub limit: Option<i32>,
    pub filters: Filters,
}

/// Raw daemon operations.
///
/// Implementations perform exactly one API round-trip per call and never
/// retry; deadlines and caching are layered on top by `DockerClient`.
#[async_trait]
pub trait DockerTransport: Send + Sync {
    /// Daemon-wide information (`GET /info`).
    async fn info(&self) -> Result<SystemInfo, TransportError>;

    async fn list_images(&self, all: bool) -> Result<Vec<ImageSummary>, TransportError>;

    async fn list_volumes(&self, filters: Filters) -> Result<VolumeListResponse, TransportError>;

    async fn list_containers(
        &self,
        options: &ContainerListOptions,
    ) -> Result<Vec<ContainerSummary>, TransportError>;

    /// Inspect an image by ID, digest or name. Absent images yield `TransportError::NotFound`.
    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect, TransportError>;

    /// Inspect a container. Absent containers yield `TransportError::NotFound`.
    async fn inspect_container(
        &self,
        id: &ContainerId,
        with_size: bool,
    ) -> Result<ContainerInspectResponse, TransportError>;

    /// A single, non-streaming stats sample.
    async fn container_stats(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerStatsResponse, TransportError>;
}

/// Establishes a transport: reads connection settings, negotiates the API
/// version and hands back a shareable handle.
///
/// Connecting does not have to prove the daemon is reachable; the init gate
/// follows every successful connect with a liveness round-trip.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn DockerTransport>, TransportError>;
}
