//! Outbound plumbing shared by every hubkit connector adapter.
//!
//! - **[`RestClient`]**: base-URL resolution, JSON bodies, status
//!   classification into [`Error`].
//! - **[`Credentials`]**: embedded basic-auth or bearer tokens obtained
//!   from an external [`TokenIssuer`].
//! - **[`TransportConfig`]**: TLS and bounded per-call timeouts.

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;

pub use auth::{AuthStrategy, Credentials, TokenIssuer};
pub use client::{AuthorizedClient, RestClient};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
