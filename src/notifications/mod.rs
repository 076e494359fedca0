// SPDX-License-Identifier: GPL-3.0-only
pub mod gate;

pub use gate::NotificationGate;
