//! Reconciliation of external guest lists with local check-ins.
//!
//! The [`Engine`] owns one view per event and keeps it fresh; the
//! [`AttendanceStore`] is the source of truth for check-ins;
//! [`VerificationService`] and [`GuestDirectory`] are the write and read
//! sides the HTTP layer talks to.

pub mod attendance;
pub mod engine;
pub mod error;
pub mod search;
pub mod verify;

pub use attendance::{AttendanceStore, MemoryAttendanceStore, SqliteAttendanceStore};
pub use engine::{Engine, EngineConfig, GuestSnapshot, ReconciledView, RefreshFailure};
pub use error::{StoreError, SyncError, VerifyError};
pub use search::{GuestDirectory, MAX_SEARCH_RESULTS};
pub use verify::{Verification, VerificationService, VerificationStatus, resolve_day};
