// ABOUTME: Bollard-backed DockerTransport and Connector.
// ABOUTME: Connects from DOCKER_HOST (or an explicit host), negotiating the API version.

use super::error::TransportError;
use super::transport::{ContainerListOptions, Connector, DockerTransport, Filters};
use crate::types::ContainerId;
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerInspectResponse, ContainerStatsResponse, ContainerSummary, ImageInspect,
    ImageSummary, SystemInfo, VolumeListResponse,
};
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptions, ListImagesOptions, ListVolumesOptions,
    StatsOptions,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_bollard_error(e: bollard::errors::Error) -> TransportError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if status_code == 404 => TransportError::NotFound(message),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => TransportError::Api {
            status: status_code,
            message,
        },
        e @ (bollard::errors::Error::JsonDataError { .. }
        | bollard::errors::Error::JsonSerdeError { .. }) => TransportError::Decode(e.to_string()),
        e => TransportError::Connection(e.to_string()),
    }
}

fn map_connect_error(e: bollard::errors::Error) -> TransportError {
    TransportError::Connection(e.to_string())
}

// =============================================================================
// BollardTransport
// =============================================================================

/// Transport over a bollard `Docker` client.
pub struct BollardTransport {
    client: Docker,
}

impl BollardTransport {
    /// Wrap an already-configured client.
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Docker {
        &self.client
    }
}

#[async_trait]
impl DockerTransport for BollardTransport {
    async fn info(&self) -> Result<SystemInfo, TransportError> {
        self.client.info().await.map_err(map_bollard_error)
    }

    async fn list_images(&self, all: bool) -> Result<Vec<ImageSummary>, TransportError> {
        let opts = ListImagesOptions {
            all,
            ..Default::default()
        };

        self.client
            .list_images(Some(opts))
            .await
            .map_err(map_bollard_error)
    }

    async fn list_volumes(&self, filters: Filters) -> Result<VolumeListResponse, TransportError> {
        let opts = ListVolumesOptions {
            filters: Some(filters),
            ..Default::default()
        };

        self.client
            .list_volumes(Some(opts))
            .await
            .map_err(map_bollard_error)
    }

    async fn list_containers(
        &self,
        options: &ContainerListOptions,
    ) -> Result<Vec<ContainerSummary>, TransportError> {
        let opts = ListContainersOptions {
            all: options.all,
            size: options.size,
            limit: options.limit,
            filters: if options.filters.is_empty() {
                None
            } else {
                Some(options.filters.clone())
            },
            ..Default::default()
        };

        self.client
            .list_containers(Some(opts))
            .await
            .map_err(map_bollard_error)
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect, TransportError> {
        self.client
            .inspect_image(reference)
            .await
            .map_err(map_bollard_error)
    }

    async fn inspect_container(
        &self,
        id: &ContainerId,
        with_size: bool,
    ) -> Result<ContainerInspectResponse, TransportError> {
        let opts = InspectContainerOptions {
            size: with_size,
            ..Default::default()
        };

        self.client
            .inspect_container(id.as_str(), Some(opts))
            .await
            .map_err(map_bollard_error)
    }

    async fn container_stats(
        &self,
        id: &ContainerId,
    ) -> Result<ContainerStatsResponse, TransportError> {
        let opts = StatsOptions {
            stream: false,
            one_shot: false,
            ..Default::default()
        };

        let mut stream = std::pin::pin!(self.client.stats(id.as_str(), Some(opts)));
        match stream.next().await {
            Some(sample) => sample.map_err(map_bollard_error),
            None => Err(TransportError::Decode(format!(
                "daemon returned no stats sample for {}",
                id
            ))),
        }
    }
}

// =============================================================================
// BollardConnector
// =============================================================================

/// Builds a `BollardTransport`.
///
/// Without an explicit host the standard `DOCKER_HOST` environment handling
/// applies, falling back to the local socket.
#[derive(Debug, Clone)]
pub struct BollardConnector {
    docker_host: Option<String>,
    request_timeout: Duration,
}

impl BollardConnector {
    pub fn new(docker_host: Option<String>, request_timeout: Duration) -> Self {
        Self {
            docker_host,
            request_timeout,
        }
    }

    /// Connect using only the environment.
    pub fn from_env(request_timeout: Duration) -> Self {
        Self::new(None, request_timeout)
    }

    fn client(&self) -> Result<Docker, TransportError> {
        // bollard takes whole seconds; never hand it zero
        let timeout = self.request_timeout.as_secs().max(1);

        let Some(host) = self.docker_host.as_deref() else {
            return Docker::connect_with_defaults().map_err(map_connect_error);
        };

        if host.starts_with("unix://") || host.starts_with('/') {
            Docker::connect_with_unix(host, timeout, bollard::API_DEFAULT_VERSION)
                .map_err(map_connect_error)
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(host, timeout, bollard::API_DEFAULT_VERSION)
                .map_err(map_connect_error)
        } else {
            Err(TransportError::Connection(format!(
                "unsupported docker host: {}",
                host
            )))
        }
    }
}

#[async_trait]
impl Connector for BollardConnector {
    async fn connect(&self) -> Result<Arc<dyn DockerTransport>, TransportError> {
        let client = self.client()?;
        let client = client
            .negotiate_version()
            .await
            .map_err(map_bollard_error)?;
        tracing::debug!(host = ?self.docker_host, "negotiated docker API version");

        Ok(Arc::new(BollardTransport::new(client)))
    }
}
