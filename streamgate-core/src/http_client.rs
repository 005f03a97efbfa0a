//! Shared outbound HTTP client

use std::time::Duration;

use reqwest::Client;

use crate::{Error, Result};

/// Build the pooled client used for every upstream call.
///
/// Both timeouts are mandatory so no upstream call can hang a request.
/// Redirects are not followed, which keeps requests on the configured host.
pub fn build_http_client(connect_timeout: Duration, request_timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .pool_max_idle_per_host(10)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))
}
