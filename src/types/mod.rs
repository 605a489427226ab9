// ABOUTME: Daemon identifier types and image reference helpers.
// ABOUTME: Phantom-typed IDs prevent container/image ID confusion at compile time.

mod id;
mod image_name;

pub use id::{ContainerId, ContainerMarker, Id, ImageId, ImageMarker};
pub use image_name::{is_digest_form, strip_digest};
