//! Identity layer: bearer-token credentials, vault-backed secrets,
//! shared-access-signature tokens and the HTTP client constructor used by
//! every outbound service client.

mod error;
pub mod credential;
pub mod http;
pub mod sas;
pub mod secrets;

pub use credential::{AccessToken, ManagedIdentityCredential, StaticTokenCredential, TokenCredential};
pub use error::IdentityError;
pub use http::http_client;
pub use sas::build_sas_token;
pub use secrets::{EnvSecrets, KeyVaultSecrets, SecretSource, StaticSecrets};
