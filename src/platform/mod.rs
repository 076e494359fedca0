// SPDX-License-Identifier: GPL-3.0-only
pub mod asset_cache;
pub mod events;
pub mod http_host;
pub mod hub;
pub mod messages;
pub mod permissions;
pub mod probe;
pub mod reloader;
pub mod traits;

pub use asset_cache::AssetCache;
pub use events::{ConnectivityState, ContainerEvent, WorkerState, WorkerVersion};
pub use http_host::HttpWorkerHost;
pub use hub::EventHub;
pub use messages::WorkerMessage;
pub use permissions::ConfiguredPermissions;
pub use probe::ReachabilityProbe;
pub use reloader::SessionReloader;
pub use traits::{
    ConnectivitySource, NotificationPermissions, PageReloader, PermissionState,
    RegisterOptions, RegistrationHandle, UpdateViaCache, WorkerContainer,
};
