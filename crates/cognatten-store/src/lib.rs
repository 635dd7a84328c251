//! SQLite persistence for students, attendance, and admins.
//!
//! Three tables behind a single async [`Store`] handle: `students` (the
//! roster), `attendance` (timestamped marks, deduplicated over a 12-hour
//! window), and `admins` (login credentials). Face photos live next to the
//! database in a directory keyed by student id.

pub mod backend;
pub mod db;
pub mod export;
pub mod models;
pub mod photos;
pub mod store;

mod error;

pub use backend::DbBackend;
pub use error::StoreError;
pub use models::{AttendanceRecord, NewMark, Student};
pub use photos::PhotoStore;
pub use store::Store;

/// Seconds a student stays deduplicated after a successful mark.
pub const DEDUP_WINDOW_SECS: i64 = 12 * 60 * 60;

/// Storage format for the attendance `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Storage format for the attendance `time` column.
pub const TIME_FORMAT: &str = "%H:%M:%S";
