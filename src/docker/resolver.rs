// ABOUTME: Maps digest-form image references to human-readable repository names.
// ABOUTME: Results are memoized per reference; concurrent misses on one reference share a lookup.

use super::deadline::{CallError, DeadlineGuard};
use super::error::ClientError;
use super::inspect::ContainerInspection;
use super::transport::DockerTransport;
use crate::types::{is_digest_form, strip_digest};
use bollard::models::ImageInspect;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// Image identity resolver.
///
/// Each reference owns a cell. The map lock only guards finding the cell;
/// the daemon round-trip runs inside the cell, so concurrent misses on one
/// reference issue a single inspect call while hits and lookups of other
/// references proceed. A failed lookup leaves its cell empty. Entries never
/// expire; `clear` drops them all at once.
#[derive(Default)]
pub struct ImageResolver {
    names: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl ImageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &self,
        transport: &dyn DockerTransport,
        guard: &DeadlineGuard,
        ctx: &CancellationToken,
        reference: &str,
    ) -> Result<String, ClientError> {
        if !is_digest_form(reference) {
            return Ok(reference.to_string());
        }

        let cell = self
            .names
            .lock()
            .entry(reference.to_string())
            .or_default()
            .clone();
        if let Some(name) = cell.get() {
            tracing::debug!(reference, name = %name, "image name cache hit");
            return Ok(name.clone());
        }

        let result = cell
            .get_or_try_init(|| async {
                match guard.run(ctx, transport.inspect_image(reference)).await {
                    Ok(image) => Ok(display_name(&image).unwrap_or_else(|| {
                        tracing::debug!(reference, "image has no tags or digests, keeping reference");
                        reference.to_string()
                    })),
                    Err(CallError::Transport(e)) if e.is_not_found() => {
                        tracing::debug!(reference, "image not found, keeping reference");
                        Ok(reference.to_string())
                    }
                    Err(e) => Err(e.into_client_error("inspect image", reference)),
                }
            })
            .await;

        match result {
            Ok(name) => Ok(name.clone()),
            Err(e) => {
                self.forget_empty(reference, &cell);
                Err(e)
            }
        }
    }

    /// Prefer the container's configured image name; fall back to resolving
    /// the image ID it runs.
    pub async fn resolve_from_container(
        &self,
        transport: &dyn DockerTransport,
        guard: &DeadlineGuard,
        ctx: &CancellationToken,
        container: &ContainerInspection,
    ) -> Result<String, ClientError> {
        if let Some(image) = container.config_image()
            && !is_digest_form(image)
        {
            return Ok(image.to_string());
        }
        self.resolve(transport, guard, ctx, container.image_id().as_str())
            .await
    }

    pub fn clear(&self) {
        self.names.lock().clear();
    }

    /// Number of references with a memoized name.
    pub fn len(&self) -> usize {
        self.names
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget_empty(&self, reference: &str, cell: &Arc<OnceCell<String>>) {
        let mut names = self.names.lock();
        let stale = names
            .get(reference)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            names.remove(reference);
        }
    }
}

/// Smallest repo tag, else the repository of the smallest repo digest.
pub fn display_name(image: &ImageInspect) -> Option<String> {
    if let Some(tag) = image.repo_tags.iter().flatten().min() {
        return Some(tag.clone());
    }
    image
        .repo_digests
        .iter()
        .flatten()
        .min()
        .map(|digest| strip_digest(digest).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tags: &[&str], digests: &[&str]) -> ImageInspect {
        ImageInspect {
            repo_tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            repo_digests: Some(digests.iter().map(|d| d.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn smallest_tag_wins() {
        assert_eq!(
            display_name(&image(&["b:1", "a:1"], &["x@sha256:00"])),
            Some("a:1".to_string())
        );
    }

    #[test]
    fn digest_repository_when_untagged() {
        assert_eq!(
            display_name(&image(&[], &["quay.io/x@sha256:deadbeef"])),
            Some("quay.io/x".to_string())
        );
        assert_eq!(
            display_name(&image(&[], &["z@sha256:01", "a/b@sha256:02"])),
            Some("a/b".to_string())
        );
    }

    #[test]
    fn nothing_to_show() {
        assert_eq!(display_name(&image(&[], &[])), None);
        assert_eq!(display_name(&ImageInspect::default()), None);
    }
}
