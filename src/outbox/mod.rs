// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod traits;
pub mod sqlite;

pub use models::{MealLogDraft, QueuedMealLog};
pub use traits::Outbox;
pub use sqlite::SqliteOutbox;
