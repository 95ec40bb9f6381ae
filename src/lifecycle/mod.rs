//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Start audit worker → Start monitor sweep
//!     → Build gateway → Start admin API
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → admin stops, sweep exits,
//!     audit worker drains its queue and performs a final flush
//! ```
//!
//! # Design Decisions
//! - Background tasks subscribe before they are spawned
//! - The audit worker is awaited last so no record is lost on a clean exit

pub mod shutdown;

pub use shutdown::Shutdown;
