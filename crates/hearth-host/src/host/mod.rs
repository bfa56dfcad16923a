//! The application host.
//!
//! Decomposed into focused modules:
//!
//! - `core`: the [`AppHost`] itself: owned state, pipeline hooks, request
//!   dispatch, disposal, and the process-wide singleton slot
//! - `init`: the [`HostApp`] contract and the ordered initialization
//!   sequence (`init` / `on_after_init`)

pub mod core;
pub mod init;

pub use self::core::AppHost;
pub use self::init::HostApp;
