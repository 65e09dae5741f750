#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Shared utilities used across architecture layers.

mod color;
pub mod error_codes;
mod sync;
pub mod telemetry;

pub use color::Colors;
pub use color::Tint;
pub use color::init as color_init;
pub use color::is_disabled as color_is_disabled;
pub use color::tint;
pub use sync::mutex_lock_or_recover;
pub use sync::poison_recovery_count;
pub use sync::rwlock_read_or_recover;
pub use sync::rwlock_write_or_recover;
