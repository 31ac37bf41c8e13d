//! Bounded request execution shared by the exchange client, the
//! authenticated client and the session endpoint backend.

use crate::error::{AuthError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Executes `request` with a hard deadline.
///
/// The deadline is passed to the host client and also enforced here, so a
/// host that ignores `HttpRequest::timeout` still cannot hang the caller.
/// Elapsed deadlines surface as [`AuthError::Network`], never as 401.
pub(crate) async fn execute_bounded(
    http: &dyn HttpClient,
    request: HttpRequest,
    timeout: Duration,
) -> Result<HttpResponse> {
    let method = request.method;
    let request = request.timeout(timeout);

    match tokio::time::timeout(timeout, http.execute(request)).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            debug!(%method, ?timeout, "Request deadline elapsed");
            Err(AuthError::Network(format!(
                "request timed out after {}s",
                timeout.as_secs()
            )))
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Backend error message from a JSON `{"message": ...}` body, if any.
pub(crate) fn error_message(response: &HttpResponse) -> Option<String> {
    if !response.is_json() {
        return None;
    }
    serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty())
}
