use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::{Result, ViewerError};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where strip pages come from. Failures are logged by the implementation
/// and handed back so the caller can show the reason.
pub trait PageSource {
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Raw bytes for a URL, used to fill the image cache.
pub trait ByteSource {
    fn fetch_bytes(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(ViewerError::Client)?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ViewerError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ViewerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn page_text(&self, url: &str) -> Result<String> {
        let text = self
            .get(url)
            .await?
            .text()
            .await
            .map_err(|source| ViewerError::Network {
                url: url.to_string(),
                source,
            })?;
        if text.is_empty() {
            return Err(ViewerError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(text)
    }
}

impl PageSource for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let result = self.page_text(url).await;
        match &result {
            Ok(html) => debug!(url, bytes = html.len(), "fetched strip page"),
            Err(err) => warn!(url, "error fetching page: {err}"),
        }
        result
    }
}

impl ByteSource for HttpFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|source| ViewerError::Network {
                url: url.to_string(),
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Answers a single connection with `response` and hands back the raw
    /// request it received.
    async fn serve_once(response: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = oneshot::channel();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => request.extend_from_slice(&buf[..read]),
                }
            }
            let _ = request_tx.send(String::from_utf8_lossy(&request).into_owned());
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        (format!("http://{addr}/comics/strip/2024/01/01"), request_rx)
    }

    fn fetcher(timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(DEFAULT_USER_AGENT, timeout).unwrap()
    }

    #[tokio::test]
    async fn fetch_page_returns_body_and_sends_browser_user_agent() {
        let (url, request_rx) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 13\r\nConnection: close\r\n\r\n<p>strip</p>\n",
        )
        .await;

        let html = fetcher(DEFAULT_TIMEOUT).fetch_page(&url).await.unwrap();
        assert_eq!(html, "<p>strip</p>\n");

        let request = request_rx.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /comics/strip/2024/01/01 "));
        assert!(request.contains("user-agent: mozilla/5.0 (windows nt 10.0; win64; x64)"));
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_its_code() {
        let (url, _request_rx) = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found",
        )
        .await;
        let err = fetcher(DEFAULT_TIMEOUT).fetch_page(&url).await.unwrap_err();
        assert!(matches!(err, ViewerError::HttpStatus { status: 404, .. }));
        assert!(err.to_string().ends_with("answered with http 404"));
    }

    #[tokio::test]
    async fn empty_body_is_a_failed_fetch() {
        let (url, _request_rx) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let err = fetcher(DEFAULT_TIMEOUT).fetch_page(&url).await.unwrap_err();
        assert!(matches!(err, ViewerError::EmptyBody { .. }));
    }

    #[tokio::test]
    async fn status_error_carries_code() {
        let (url, _request_rx) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let err = fetcher(DEFAULT_TIMEOUT).fetch_bytes(&url).await.unwrap_err();
        assert!(matches!(err, ViewerError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn slow_server_times_out_without_panicking() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(socket);
            }
        });

        let url = format!("http://{addr}/slow");
        let err = fetcher(Duration::from_millis(300)).fetch_page(&url).await.unwrap_err();
        assert!(matches!(err, ViewerError::Network { .. }));
    }
}
