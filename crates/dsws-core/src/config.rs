use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::time::Duration;

/// Base URL for the production service. Only override if directed to.
pub const DEFAULT_BASE_URL: &str = "https://product.datastream.com";

/// Operation path for the user-created-items service.
pub const USER_DATA_SERVICE_PATH: &str = "/DSWSClient/V1/DSUserDataService.svc/rest/";

/// Operation path for the economic filter and change-feed service.
pub const ECONOMIC_FILTER_SERVICE_PATH: &str = "/DSWSClient/V1/DSEconomicsFilterService.svc/rest/";

/// Default per-call deadline for user-created-item operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default per-call deadline for filter management and change-feed operations.
pub const FILTER_SERVICE_TIMEOUT: Duration = Duration::from_secs(180);

/// Injected, read-only client settings.
///
/// Credentials, proxy, certificate bundle and timeout are supplied here once;
/// parsing them out of a configuration file is the embedding application's
/// concern.
#[derive(Clone)]
pub struct ClientConfig {
    pub username: String,
    pub password: String,
    pub base_url: String,
    /// Overrides the per-service default deadline when set.
    pub timeout: Option<Duration>,
    /// Proxy URL applied to every call, e.g. `http://proxy.internal:8080`.
    pub proxy: Option<String>,
    /// Path to a PEM bundle of additional trusted root certificates.
    pub ssl_ca_bundle: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: String::from(DEFAULT_BASE_URL),
            timeout: None,
            proxy: None,
            ssl_ca_bundle: None,
        }
    }

    /// Only HTTPS is supported on the API; a plain `http:` scheme is upgraded.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut url = base_url.into().trim().to_owned();
        if let Some(rest) = url.strip_prefix("http:") {
            url = format!("https:{rest}");
        }
        self.base_url = url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_ssl_ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca_bundle = Some(path.into());
        self
    }

    pub fn user_data_url(&self) -> String {
        format!(
            "{}{USER_DATA_SERVICE_PATH}",
            self.base_url.trim_end_matches('/')
        )
    }

    pub fn economic_filter_url(&self) -> String {
        format!(
            "{}{ECONOMIC_FILTER_SERVICE_PATH}",
            self.base_url.trim_end_matches('/')
        )
    }

    pub fn effective_timeout(&self, service_default: Duration) -> Duration {
        self.timeout.unwrap_or(service_default)
    }
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("proxy", &self.proxy)
            .field("ssl_ca_bundle", &self.ssl_ca_bundle)
            .finish()
    }
}
