//! Inbound HTTP API.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (request id, tracing, timeout, body limit)
//!     → auth.rs (bearer secret on /v1/*)
//!     → handlers.rs (decode JSON, call intake, map errors to status codes)
//! ```
//!
//! | Route                    | Success | Errors                  |
//! |--------------------------|---------|-------------------------|
//! | `POST /v1/payouts/batch` | 202     | 400 invalid, 503 queue  |
//! | `GET /v1/chains`         | 200     | 401 without secret      |
//! | `GET /health`            | 200     |                         |

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
