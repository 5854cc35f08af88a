//! Completion gateway implementations for chatrelay.
//!
//! All providers implement the `chatrelay_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use chatrelay_config::AppConfig;
use chatrelay_core::error::ProviderError;

/// Build the configured provider.
///
/// Fails with [`ProviderError::NotConfigured`] when no API key is set or the
/// HTTP client cannot be created.
pub fn build_from_config(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    let api_key = config
        .require_api_key()
        .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;

    OpenAiCompatProvider::new(
        "openai",
        &config.provider.base_url,
        api_key,
        std::time::Duration::from_secs(config.provider.request_timeout_secs),
    )
}
