// SPDX-License-Identifier: GPL-3.0-only
pub mod notice;
pub mod status;

pub use notice::{ConnectivityBanner, UpdateNotice};
pub use status::StatusSnapshot;
