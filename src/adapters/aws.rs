//! Shared AWS SDK configuration.
//!
//! Every AWS-backed adapter (bus, queue, schema service) builds its client
//! from the `SdkConfig` produced here so region, endpoint override and
//! credentials are applied the same way everywhere.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata};
use secrecy::ExposeSecret;

use crate::config::AwsConfig;

const CREDENTIALS_PROVIDER: &str = "eventbridge-client";

/// Loads SDK configuration, optionally overriding the region.
///
/// Static credentials from `config` replace the default provider chain when
/// both the key id and the secret are set.
pub async fn load_sdk_config(config: &AwsConfig, region: Option<&str>) -> SdkConfig {
    let region = region.unwrap_or(&config.region).to_string();
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));

    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key)
    {
        let credentials = aws_sdk_sqs::config::Credentials::new(
            access_key_id,
            secret.expose_secret(),
            config
                .session_token
                .as_ref()
                .map(|token| token.expose_secret().clone()),
            None,
            CREDENTIALS_PROVIDER,
        );
        loader = loader.credentials_provider(credentials);
    }

    loader.load().await
}

/// Error code reported by the service, if any.
pub(crate) fn error_code<E: ProvideErrorMetadata>(err: &E) -> Option<&str> {
    err.code()
}

/// Full error chain as one line.
pub(crate) fn error_chain<E: std::error::Error>(err: &E) -> String {
    DisplayErrorContext(err).to_string()
}
