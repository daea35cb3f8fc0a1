//! IAM token issuance for Aurora DSQL.
//!
//! [`AwsDsqlTokenIssuer`] exchanges the ambient AWS identity (environment,
//! profile, instance or task role) for a SigV4-presigned connection token.
//! Shared SDK configuration is loaded once per region; the credentials
//! provider inside it refreshes on its own, so each signing call sees current
//! credentials without reloading.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dsql::auth_token::{AuthTokenGenerator, Config as TokenConfig};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::ports::{AuthToken, TOKEN_TTL, TokenIssuer, TokenIssuerError, TokenRequest};

/// Token issuer backed by the AWS SDK's DSQL signer.
#[derive(Default)]
pub struct AwsDsqlTokenIssuer {
    configs: Mutex<HashMap<String, SdkConfig>>,
}

impl AwsDsqlTokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sdk_config(&self, region: &str) -> Result<SdkConfig, TokenIssuerError> {
        let mut configs = self.configs.lock().await;
        if let Some(config) = configs.get(region) {
            return Ok(config.clone());
        }

        debug!(region, "loading AWS configuration");
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .load()
            .await;
        if config.credentials_provider().is_none() {
            return Err(TokenIssuerError::credential_load(
                "no AWS credentials provider is configured",
            ));
        }

        configs.insert(region.to_owned(), config.clone());
        Ok(config)
    }
}

#[async_trait]
impl TokenIssuer for AwsDsqlTokenIssuer {
    async fn issue_token(&self, request: &TokenRequest) -> Result<AuthToken, TokenIssuerError> {
        let sdk_config = self.sdk_config(&request.region).await?;

        let signer_config = TokenConfig::builder()
            .hostname(request.hostname.as_str())
            .region(Region::new(request.region.clone()))
            .expires_in(TOKEN_TTL.as_secs())
            .build()
            .map_err(|err| TokenIssuerError::generation(err.to_string()))?;
        let signer = AuthTokenGenerator::new(signer_config);

        let token = if request.role.is_admin() {
            signer.db_connect_admin_auth_token(&sdk_config).await
        } else {
            signer.db_connect_auth_token(&sdk_config).await
        }
        .map_err(|err| TokenIssuerError::generation(err.to_string()))?;

        Ok(AuthToken::new(token.as_str()))
    }
}
