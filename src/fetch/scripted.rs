//! In-process [`HttpClient`] that replays canned responses per route and
//! records every request it sees.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::BodyExt;
use reqwest::{Method, Request, Response};

use super::HttpClient;

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Vec<u8>>,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(self.body.as_deref().unwrap_or(b"null")).unwrap()
    }

    /// Body as text; multipart uploads are recorded in wire form.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.body.as_deref().unwrap_or_default()).into_owned()
    }
}

struct Route {
    method: Method,
    path: String,
    replies: VecDeque<(u16, String)>,
}

/// Routes match on method and URL path (query ignored). Replies queued on a
/// route are consumed in order; the last one repeats. Unknown routes get 404.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    routes: Mutex<Vec<Route>>,
    log: Mutex<Vec<Recorded>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request waits `latency` before it is answered.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Most requests ever outstanding at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn on(self, method: Method, path: &str, status: u16, body: impl Into<String>) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            let reply = (status, body.into());
            match routes
                .iter_mut()
                .find(|r| r.method == method && r.path == path)
            {
                Some(route) => route.replies.push_back(reply),
                None => routes.push(Route {
                    method,
                    path: path.to_string(),
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    pub fn calls(&self, method: &Method, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && r.path == path)
            .count()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: &Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| &r.method == method && r.path == path)
            .collect()
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let (parts, body) = http::Request::<reqwest::Body>::try_from(req)?.into_parts();
        let body = body.collect().await?.to_bytes();
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let recorded = Recorded {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            authorization: header("authorization"),
            content_type: header("content-type"),
            body: (!body.is_empty()).then(|| body.to_vec()),
        };

        let (status, body) = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|r| r.method == recorded.method && r.path == recorded.path)
                .map(|route| {
                    if route.replies.len() > 1 {
                        route.replies.pop_front().unwrap()
                    } else {
                        route.replies.front().cloned().unwrap()
                    }
                })
                .unwrap_or((404, "{}".to_string()))
        };
        self.log.lock().unwrap().push(recorded);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let resp = http::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        Ok(Response::from(resp))
    }
}
