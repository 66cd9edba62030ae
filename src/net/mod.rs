//! Network layer.
//!
//! Plain TCP is served by `axum::serve`; when certificate and key paths are
//! configured the listener terminates TLS through `axum-server` + rustls.

pub mod tls;

pub use tls::load_tls_config;
