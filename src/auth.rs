//! Request signing.
//!
//! Every outbound request passes through a [`SignRequest`] strategy before it
//! is sent. Closures of the right shape are signers too.

use crate::config::WorkerConfig;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

/// Adds authentication to an outbound request.
pub trait SignRequest: Send + Sync {
    fn sign(&self, request: RequestBuilder) -> RequestBuilder;
}

impl<F> SignRequest for F
where
    F: Fn(RequestBuilder) -> RequestBuilder + Send + Sync,
{
    fn sign(&self, request: RequestBuilder) -> RequestBuilder {
        self(request)
    }
}

/// Leaves requests untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

impl SignRequest for NoAuth {
    fn sign(&self, request: RequestBuilder) -> RequestBuilder {
        request
    }
}

/// Sends the shared secret as a bearer token.
pub struct BearerSecret {
    secret: SecretString,
}

impl BearerSecret {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }
}

impl std::fmt::Debug for BearerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerSecret").finish_non_exhaustive()
    }
}

impl SignRequest for BearerSecret {
    fn sign(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.secret.expose_secret())
    }
}

/// Default signer for a config: bearer auth when a secret is set.
pub fn signer_for(config: &WorkerConfig) -> Arc<dyn SignRequest> {
    match &config.secret {
        Some(secret) if !secret.expose_secret().is_empty() => Arc::new(BearerSecret::new(
            SecretString::from(secret.expose_secret().to_owned()),
        )),
        _ => Arc::new(NoAuth),
    }
}
