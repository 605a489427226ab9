// ABOUTME: Validated container inspection records and inspect-cache keys.
// ABOUTME: Rejects daemon responses missing the base section; orders with/without-size lookups.

use crate::types::{ContainerId, ImageId};
use bollard::models::{ContainerInspectResponse, ContainerState};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Why an inspect response was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InspectShapeError {
    #[error("missing container id")]
    MissingId,

    #[error("missing container state")]
    MissingState,

    #[error("missing image id")]
    MissingImage,
}

/// A full container inspection whose base section (id, state, image) is
/// known to be present.
///
/// Cheap to clone: the daemon response is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerInspection {
    details: Arc<ContainerInspectResponse>,
    with_size: bool,
}

impl ContainerInspection {
    /// Validate a raw daemon response.
    pub fn from_response(
        details: ContainerInspectResponse,
        with_size: bool,
    ) -> Result<Self, InspectShapeError> {
        if details.id.as_deref().is_none_or(str::is_empty) {
            return Err(InspectShapeError::MissingId);
        }
        if details.state.is_none() {
            return Err(InspectShapeError::MissingState);
        }
        if details.image.as_deref().is_none_or(str::is_empty) {
            return Err(InspectShapeError::MissingImage);
        }

        Ok(Self {
            details: Arc::new(details),
            with_size,
        })
    }

    pub fn id(&self) -> ContainerId {
        ContainerId::new(self.details.id.clone().unwrap_or_default())
    }

    /// Container name without the leading `/`.
    pub fn name(&self) -> &str {
        self.details
            .name
            .as_deref()
            .unwrap_or_default()
            .trim_start_matches('/')
    }

    /// The image ID the container actually runs (`sha256:...`).
    pub fn image_id(&self) -> ImageId {
        ImageId::new(self.details.image.clone().unwrap_or_default())
    }

    /// The image name the container was created from, as the user wrote it.
    pub fn config_image(&self) -> Option<&str> {
        self.details
            .config
            .as_ref()
            .and_then(|config| config.image.as_deref())
            .filter(|image| !image.is_empty())
    }

    pub fn labels(&self) -> HashMap<String, String> {
        self.details
            .config
            .as_ref()
            .and_then(|config| config.labels.clone())
            .unwrap_or_default()
    }

    /// Always present on a validated record.
    pub fn state(&self) -> Option<&ContainerState> {
        self.details.state.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state()
            .and_then(|state| state.running)
            .unwrap_or(false)
    }

    /// Whether the daemon was asked for size information.
    pub fn has_size(&self) -> bool {
        self.with_size
    }

    /// Bytes written to the container's writable layer (sized inspections only).
    pub fn size_rw(&self) -> Option<i64> {
        self.details.size_rw
    }

    /// Total size of the container's filesystem (sized inspections only).
    pub fn size_root_fs(&self) -> Option<i64> {
        self.details.size_root_fs
    }

    /// The complete daemon response.
    pub fn details(&self) -> &ContainerInspectResponse {
        &self.details
    }
}

impl Serialize for ContainerInspection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.details.serialize(serializer)
    }
}

/// Inspect cache key: one entry per container per size variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InspectKey {
    pub id: ContainerId,
    pub with_size: bool,
}

impl InspectKey {
    pub fn new(id: &ContainerId, with_size: bool) -> Self {
        Self {
            id: id.clone(),
            with_size,
        }
    }

    /// Keys able to answer a request, most specific first.
    ///
    /// A sized record is a superset of an unsized one, so an unsized request
    /// may fall back to it; the reverse never holds.
    pub fn lookup_order(id: &ContainerId, with_size: bool) -> Vec<InspectKey> {
        if with_size {
            vec![InspectKey::new(id, true)]
        } else {
            vec![InspectKey::new(id, false), InspectKey::new(id, true)]
        }
    }
}
