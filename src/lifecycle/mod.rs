//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (service.rs):
//!     Load config → Connect chains → Build signers → Spawn workers → Serve HTTP
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Stop accepting batches → Close queue
//!         → Workers finish in-flight jobs → Close signers → Exit
//! ```

pub mod service;
pub mod shutdown;
pub mod signals;

pub use service::PayoutService;
pub use shutdown::Shutdown;
