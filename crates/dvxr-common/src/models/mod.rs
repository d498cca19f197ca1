//! Domain models shared across all dvxr crates.
//!
//! Wire-facing types keep the remote service's field names via serde renames;
//! the Rust side uses snake_case throughout.

pub mod auth;
pub mod computer;
pub mod ids;
pub mod surface;

pub use auth::*;
pub use computer::*;
pub use surface::*;
