//! Credential provider passed into the pipeline instead of ambient auth state.

use async_trait::async_trait;

/// Supplies a bearer credential on demand.
///
/// Called once per item per authenticated stage; callers do not cache the
/// returned token.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> anyhow::Result<String>;
}

/// Fixed token, typically read from the environment.
#[derive(Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials").finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn bearer_token(&self) -> anyhow::Result<String> {
        if self.token.is_empty() {
            return Err(anyhow::anyhow!("No API token configured"));
        }
        Ok(self.token.clone())
    }
}
