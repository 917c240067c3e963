//! `villadmin-client` — authorized access to the village administration API.
//!
//! The [`ApiClient`] gateway is the single choke point for outbound calls.
//! Resource-specific wrappers (articles, transactions, ...) are expected to
//! sit on top of it and unwrap their own response envelopes.

pub mod auth_api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod request;
pub mod transport;

pub use auth_api::{AuthApi, LoginRequest};
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use gateway::ApiClient;
pub use request::{FormPart, MultipartForm, RequestBody, RequestOptions};
pub use transport::{ApiRequest, HttpTransport, ReqwestTransport, TransportResponse};
