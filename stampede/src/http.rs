use crate::metrics::{BuiltinMetrics, Counter, Rate, Trend};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
#[allow(unused)]
use tracing::{debug, trace, warn};

/// HTTP client handed to scripts.
///
/// Requests never fail from the caller's point of view: transport errors come back as a
/// response with `status == 0` and `error` set, and every request is recorded in
/// `http_reqs`, `http_req_duration` and `http_req_failed`.
#[derive(Debug, Clone)]
pub struct Http {
    client: Client,
    reqs: Counter,
    duration: Trend,
    failed: Rate,
}

impl Http {
    pub(crate) fn new(timeout: Duration, builtins: &BuiltinMetrics) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            reqs: builtins.http_reqs.clone(),
            duration: builtins.http_req_duration.clone(),
            failed: builtins.http_req_failed.clone(),
        })
    }

    pub async fn get(&self, url: &str) -> HttpResponse {
        self.send(url, self.client.get(url)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> HttpResponse {
        self.send(url, self.client.post(url).json(body)).await
    }

    /// Send an arbitrary request built from the underlying client.
    pub async fn request(
        &self,
        url: &str,
        build: impl FnOnce(&Client) -> RequestBuilder,
    ) -> HttpResponse {
        self.send(url, build(&self.client)).await
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> HttpResponse {
        let start = Instant::now();
        let result = async {
            let res = request.send().await?;
            let status = res.status();
            let body = res.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        }
        .await;
        let duration = start.elapsed();

        let response = match result {
            Ok((status, body)) => HttpResponse {
                url: url.to_string(),
                status: status.as_u16(),
                duration,
                body,
                error: None,
            },
            Err(err) => {
                debug!("Request to {url} failed: {err}");
                HttpResponse {
                    url: url.to_string(),
                    status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                    duration,
                    body: String::new(),
                    error: Some(err.to_string()),
                }
            }
        };

        trace!(
            "{url} -> {} in {}",
            response.status,
            humantime::format_duration(duration)
        );

        self.reqs.increment(1);
        self.duration.add_duration(duration);
        self.failed.add(response.is_failed());

        response
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    /// `0` when no response was received.
    pub status: u16,
    /// Time from sending the request until the body was fully read.
    pub duration: Duration,
    pub body: String,
    pub error: Option<String>,
}

impl HttpResponse {
    /// A request counts as failed when it received no response or a status outside
    /// `200..=399`.
    pub fn is_failed(&self) -> bool {
        self.error.is_some() || !(200..400).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
