// SPDX-License-Identifier: GPL-3.0-only
pub mod monitor;

pub use monitor::ConnectivityMonitor;
