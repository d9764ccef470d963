//! Credential selection.
//!
//! One function, [`select_credential`], turns configuration into a single
//! [`CredentialProvider`] used for every bearer-token authenticated call
//! (blob storage without an account key, resource manager).

mod provider;
mod types;

pub use provider::{has_service_principal, select_credential, CredentialProvider};
pub use types::*;
