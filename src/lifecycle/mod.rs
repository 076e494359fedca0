// SPDX-License-Identifier: GPL-3.0-only
pub mod controller;
pub mod state;

pub use controller::{LifecycleController, LifecycleSession, LifecycleSettings};
pub use state::{LifecycleState, UpdatePrompt};
