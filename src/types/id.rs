// ABOUTME: Type-safe ID wrappers for daemon objects using phantom types.
// ABOUTME: Prevents mixing up container and image IDs at compile time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Length of the abbreviated form shown by `docker ps`.
const SHORT_LEN: usize = 12;

/// Marker type for container IDs.
pub enum ContainerMarker {}

/// Marker type for image IDs.
pub enum ImageMarker {}

/// A type-safe ID wrapper that prevents mixing different ID types.
#[must_use = "IDs reference daemon objects and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// First twelve characters, the form the docker CLI prints.
    pub fn short(&self) -> &str {
        let value = self.value.strip_prefix("sha256:").unwrap_or(&self.value);
        value.get(..SHORT_LEN).unwrap_or(value)
    }
}

// Manual trait implementations that don't require T to implement the trait.

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Id").field("value", &self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// A container ID as reported by the daemon (full 64-char hex, or a name/prefix
/// the daemon accepts in its place).
pub type ContainerId = Id<ContainerMarker>;

/// A content-addressed image ID (`sha256:...`).
pub type ImageId = Id<ImageMarker>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;
    use std::collections::HashMap;

    #[test]
    fn short_truncates_long_ids() {
        let id = ContainerId::new("0123456789abcdef0123456789abcdef");
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn short_strips_digest_algorithm() {
        let id = ImageId::new("sha256:feedfacecafebeef00112233");
        assert_eq!(id.short(), "feedfacecafe");
    }

    #[test]
    fn short_keeps_short_names() {
        let id = ContainerId::new("web");
        assert_eq!(id.short(), "web");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ContainerId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn deserializes_from_plain_string() {
        let id: ImageId = serde_json::from_str("\"sha256:00\"").unwrap();
        assert_eq!(id.as_str(), "sha256:00");
    }

    #[test]
    fn container_and_image_ids_are_distinct_types() {
        assert_ne!(TypeId::of::<ContainerId>(), TypeId::of::<ImageId>());
    }

    #[test]
    fn ids_work_as_map_keys() {
        let mut labels = HashMap::new();
        labels.insert(ContainerId::new("aaa"), 1);
        assert_eq!(labels.get(&ContainerId::from("aaa")), Some(&1));
    }

    #[test]
    fn debug_shows_value() {
        let id = ImageId::new("sha256:00");
        assert_eq!(format!("{id:?}"), "Id { value: \"sha256:00\" }");
    }
}
