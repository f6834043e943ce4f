//! Parley Database Layer
//!
//! SQLite storage for per-user preferences: the selected model and a custom
//! system prompt. [`PreferenceDb`] implements
//! [`parley_core::users::PreferenceStore`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use parley_db::PreferenceDb;
//!
//! let db = PreferenceDb::open("path/to/parley.db").await?;
//! ```

pub mod connection;
pub mod error;
pub mod queries;
mod store;

pub use connection::PreferenceDb;
pub use error::{DbError, DbResult};
pub use queries::UserRow;
