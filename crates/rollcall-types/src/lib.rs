pub mod api;
pub mod events;
pub mod models;

pub use models::{Guest, UNKNOWN, VerificationRecord, normalize_email, today_key};
