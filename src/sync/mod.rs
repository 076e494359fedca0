// SPDX-License-Identifier: GPL-3.0-only
pub mod traits;
pub mod backend;
pub mod flusher;
pub mod pending;
pub mod dispatcher;

pub use traits::Uploader;
pub use backend::HttpUploader;
pub use flusher::OutboxFlusher;
pub use pending::PendingSyncTracker;
pub use dispatcher::{RetryPolicy, SyncDispatcher};
