//! HTTP surface of the volbench bridge.
//!
//! The browser frontend polls this API; everything here is a thin
//! translation layer between JSON bodies and the run registry. No run
//! state lives in this crate.

pub mod api;
pub mod disks;
pub mod server;
pub mod types;

pub use api::{create_router, AppState};
pub use disks::SystemVolumes;
pub use server::serve;
