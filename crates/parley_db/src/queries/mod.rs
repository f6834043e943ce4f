//! Database query functions.

mod users;

pub use users::*;
