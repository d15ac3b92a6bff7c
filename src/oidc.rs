//! OIDC issuer discovery and signing key resolution
//!
//! Everything in here talks to the identity provider. The token verifier only
//! sees the [`KeyResolver`] trait.

pub mod types;
pub mod discovery;
pub mod keys;

pub use types::*;
pub use discovery::*;
pub use keys::*;
