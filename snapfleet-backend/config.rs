use std::path::PathBuf;
use std::time::Duration;

/// Which snapshot provider backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBackend {
    /// In-memory deterministic provider. Default for local runs and tests.
    Mock,
    /// vSphere REST gateway over HTTP.
    Vsphere,
}

impl ProviderBackend {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("vsphere") => ProviderBackend::Vsphere,
            Some("mock") | None => ProviderBackend::Mock,
            Some(other) => {
                tracing::warn!(backend = %other, "unknown provider backend, falling back to mock");
                ProviderBackend::Mock
            }
        }
    }
}

/// Server configuration loaded from environment variables.
pub struct Config {
    pub port: u16,
    pub sentry_dsn: Option<String>,
    pub environment: String,
    pub provider: ProviderBackend,
    pub vsphere_api_url: Option<String>,
    pub vsphere_api_token: Option<String>,
    /// Deadline for a single provider call. The per-host lock is released
    /// when this expires and the caller gets a retryable timeout error.
    pub provider_timeout: Duration,
    /// Overrides the default `~/.snapfleet` data directory.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_raw_values(
            std::env::var("PORT").ok().as_deref(),
            std::env::var("SENTRY_DSN").ok().as_deref(),
            std::env::var("ENVIRONMENT").ok().as_deref(),
            std::env::var("SNAPFLEET_PROVIDER").ok().as_deref(),
            std::env::var("VSPHERE_API_URL").ok().as_deref(),
            std::env::var("VSPHERE_API_TOKEN").ok().as_deref(),
            std::env::var("PROVIDER_TIMEOUT_SECS").ok().as_deref(),
            std::env::var("SNAPFLEET_DATA_DIR").ok().as_deref(),
        )
    }

    /// Build a Config from raw string values (as they would come from env vars).
    /// Used directly in tests to avoid mutating process-global environment.
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw_values(
        port: Option<&str>,
        sentry_dsn: Option<&str>,
        environment: Option<&str>,
        provider: Option<&str>,
        vsphere_api_url: Option<&str>,
        vsphere_api_token: Option<&str>,
        provider_timeout_secs: Option<&str>,
        data_dir: Option<&str>,
    ) -> Self {
        let port = port.and_then(|v| v.parse().ok()).unwrap_or(8086);

        let sentry_dsn = sentry_dsn.filter(|s| !s.is_empty()).map(String::from);

        let environment = environment
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| "local".to_string());

        let provider = ProviderBackend::parse(provider.filter(|s| !s.is_empty()));

        let vsphere_api_url = vsphere_api_url.filter(|s| !s.is_empty()).map(String::from);
        let vsphere_api_token = vsphere_api_token.filter(|s| !s.is_empty()).map(String::from);

        let provider_timeout = provider_timeout_secs
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let data_dir = data_dir.filter(|s| !s.is_empty()).map(PathBuf::from);

        Config {
            port,
            sentry_dsn,
            environment,
            provider,
            vsphere_api_url,
            vsphere_api_token,
            provider_timeout,
            data_dir,
        }
    }
}
