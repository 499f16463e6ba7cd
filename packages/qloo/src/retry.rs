//! Retrying HTTP sends for Qloo requests.
//!
//! Every Qloo call goes through [`send_json`]. Timeouts, connection
//! failures, truncated bodies, HTTP 429, and HTTP 5xx get one retry after
//! a two second pause. Any other 4xx is returned immediately.

use std::time::Duration;

use crate::QlooError;

/// Retries after the first attempt.
const MAX_RETRIES: u32 = 1;

/// Pause before each retry.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Maximum length of the body preview included in error messages.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends the request built by `build_request` and parses the body as JSON.
///
/// `build_request` is called once per attempt since builders are consumed
/// by `send()`.
///
/// # Errors
///
/// Returns [`QlooError`] if every attempt fails, the server returns a
/// permanent error status, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, QlooError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES, RETRY_DELAY).await?;
    let url = response.url().to_string();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!("Qloo returned invalid JSON from {url}: {e}\n  body preview: {preview}");
        QlooError::Json(e)
    })
}

#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
    delay: Duration,
) -> Result<reqwest::Response, QlooError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<QlooError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            log::warn!("  Qloo retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(QlooError::Http(e));
                    continue;
                }
                return Err(QlooError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status} from Qloo");
                        last_error = Some(QlooError::Api {
                            status: status.as_u16(),
                            message: format!("HTTP {status}"),
                        });
                        continue;
                    }
                    return Err(QlooError::Api {
                        status: status.as_u16(),
                        message: format!("HTTP {status} after {max_retries} retries"),
                    });
                }

                if status.is_client_error() {
                    let body = response.text().await.unwrap_or_default();
                    let preview: String = body.chars().take(BODY_PREVIEW_LEN).collect();
                    return Err(QlooError::Api {
                        status: status.as_u16(),
                        message: preview,
                    });
                }

                return Ok(response);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| QlooError::Api {
        status: 0,
        message: "request failed after all retries".to_string(),
    }))
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves `statuses` in order, one per connection, repeating the last
    /// one. Returns the base URL and the request counter.
    async fn serve(statuses: &'static [u16]) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses[n.min(statuses.len() - 1)];

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let read = socket.read(&mut buf).await.unwrap();
                    if read == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..read]);
                }

                let body = if status == 200 { "{\"ok\":true}" } else { "nope" };
                let response = format!(
                    "HTTP/1.1 {status} X\r\n\
                     Content-Type: application/json\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("http://{addr}"), hits)
    }

    async fn fetch(url: &str) -> Result<reqwest::Response, QlooError> {
        let client = reqwest::Client::new();
        send_inner(&|| client.get(url), MAX_RETRIES, Duration::ZERO).await
    }

    #[tokio::test]
    async fn server_errors_are_retried_once() {
        let (url, hits) = serve(&[503, 200]).await;

        let response = fetch(&url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (url, hits) = serve(&[404, 200]).await;

        let err = fetch(&url).await.unwrap_err();
        assert!(matches!(err, QlooError::Api { status: 404, ref message } if message == "nope"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_the_retry_budget() {
        let (url, hits) = serve(&[503]).await;

        let err = fetch(&url).await.unwrap_err();
        assert!(matches!(err, QlooError::Api { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1 + MAX_RETRIES as usize);
    }

    #[tokio::test]
    async fn connection_failures_are_retried_then_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = fetch(&url).await.unwrap_err();
        assert!(matches!(err, QlooError::Http(ref e) if e.is_connect()));
    }
}
