// ABOUTME: Helpers for telling digest-form image references from tagged names.
// ABOUTME: Digest forms are `sha256:...` image IDs and `repo@sha256:...` repo digests.

const SHA256_PREFIX: &str = "sha256:";
const REPO_DIGEST_MARKER: &str = "@sha256:";

/// True for `sha256:<hex>` image IDs and `repo@sha256:<hex>` repo digests.
///
/// These carry no human-readable name and have to be resolved through the
/// daemon before they are useful as a label.
pub fn is_digest_form(reference: &str) -> bool {
    reference.starts_with(SHA256_PREFIX) || reference.contains(REPO_DIGEST_MARKER)
}

/// Repository part of a repo digest: `quay.io/foo/bar@sha256:abc` -> `quay.io/foo/bar`.
///
/// References without an `@` are returned unchanged.
pub fn strip_digest(reference: &str) -> &str {
    reference
        .split_once('@')
        .map(|(repository, _)| repository)
        .unwrap_or(reference)
}
