//! Domain types shared by the storage layer and the HTTP application.
pub mod types;

pub use types::{Activity, NewActivity};
