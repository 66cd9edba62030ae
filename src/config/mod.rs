//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (incl. chain table)
//!     → loader.rs (optional TOML file, then environment overrides)
//!     → validation.rs (semantic checks, all errors at once)
//!     → PayoutConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; chains are fixed for the process lifetime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{ChainConfig, ChainType, PayoutConfig, SignerProvider};
