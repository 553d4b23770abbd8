use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
});

/// Shared client for all model API calls. Per-request timeouts override the
/// default where a generation call is expected to run long.
pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
