// ABOUTME: Resilient Docker daemon access: init gate, deadlines and caches.
// ABOUTME: DockerClient is the entry point; transports plug in through Connector.

mod bollard;
mod cache;
mod client;
mod deadline;
mod discovery;
mod error;
mod init;
mod inspect;
mod resolver;
mod storage;
mod transport;

pub use self::bollard::{BollardConnector, BollardTransport};
pub use cache::{CacheError, TtlCache};
pub use client::{ClientOptions, DockerClient, Settings, VolumeCounts};
pub use deadline::{CallError, DeadlineGuard};
pub use discovery::{
    CgroupIdProvider, ContainerIdProvider, DiscoveryError, StaticIdProvider, find_container_id,
};
pub use error::{ClientError, ClientErrorKind, InitError, TransportError};
pub use init::{GateStatus, InitGate, RetryPolicy};
pub use inspect::{ContainerInspection, InspectKey, InspectShapeError};
pub use resolver::{ImageResolver, display_name};
pub use storage::{StorageStats, StorageStatsError, parse_disk_quantity, parse_storage_stats};
pub use transport::{ContainerListOptions, Connector, DockerTransport, Filters, filter};
