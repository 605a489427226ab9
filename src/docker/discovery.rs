// ABOUTME: Discovery of the container the agent itself runs in.
// ABOUTME: Reads the 64-hex container ID out of /proc/self/cgroup or mountinfo.

use crate::types::ContainerId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("agent does not appear to run inside a container")]
    NotInContainer,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Source of the agent's own container ID.
pub trait ContainerIdProvider: Send + Sync {
    fn agent_container_id(&self) -> Result<ContainerId, DiscoveryError>;
}

/// Always answers with the same ID. Useful when the ID is injected through
/// configuration or the environment.
#[derive(Debug, Clone)]
pub struct StaticIdProvider(ContainerId);

impl StaticIdProvider {
    pub fn new(id: impl Into<ContainerId>) -> Self {
        Self(id.into())
    }
}

impl ContainerIdProvider for StaticIdProvider {
    fn agent_container_id(&self) -> Result<ContainerId, DiscoveryError> {
        Ok(self.0.clone())
    }
}

/// Finds the container ID in procfs.
///
/// cgroup v1 paths embed the ID (`/docker/<id>`, `docker-<id>.scope`). Under
/// cgroup v2 with a private namespace the cgroup file only reads `0::/`, so
/// mountinfo (`/var/lib/docker/containers/<id>/hostname`) is checked next.
#[derive(Debug, Clone)]
pub struct CgroupIdProvider {
    sources: Vec<PathBuf>,
}

impl CgroupIdProvider {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self { sources }
    }
}

impl Default for CgroupIdProvider {
    fn default() -> Self {
        Self::new(vec![
            PathBuf::from("/proc/self/cgroup"),
            PathBuf::from("/proc/self/mountinfo"),
        ])
    }
}

impl ContainerIdProvider for CgroupIdProvider {
    fn agent_container_id(&self) -> Result<ContainerId, DiscoveryError> {
        for path in &self.sources {
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(DiscoveryError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            };
            if let Some(id) = find_container_id(&content) {
                return Ok(ContainerId::new(id));
            }
        }
        Err(DiscoveryError::NotInContainer)
    }
}

/// First 64-character lowercase hex token in `content`.
pub fn find_container_id(content: &str) -> Option<&str> {
    content
        .lines()
        .flat_map(|line| line.split(|c: char| !c.is_ascii_alphanumeric()))
        .find(|token| token.len() == 64 && token.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')))
}
