//! Construction of the outbound HTTP clients.

use std::time::Duration;

use tracing::warn;

/// A client whose requests time out after `timeout`.
///
/// Should the builder fail, the default client is used and the lost timeout
/// is logged.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    or_untimed(reqwest::Client::builder().timeout(timeout).build(), timeout)
}

fn or_untimed(built: Result<reqwest::Client, reqwest::Error>, timeout: Duration) -> reqwest::Client {
    match built {
        Ok(client) => client,
        Err(e) => {
            warn!(
                error = %e,
                timeout_secs = timeout.as_secs(),
                "HTTP client build failed, requests will run without a timeout"
            );
            reqwest::Client::default()
        }
    }
}
