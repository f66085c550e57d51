// crates/tablegate-provider/tests/common/mod.rs
// ============================================================================
// Module: Provider Test Helpers
// Description: Recording stub server for REST provider tests.
// Purpose: Capture outbound requests and replay scripted responses.
// Dependencies: tiny_http, tablegate-provider
// ============================================================================

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

use std::io::Read;
use std::sync::mpsc;
use std::thread;

use reqwest::Url;
use tablegate_provider::RestProvider;
use tablegate_provider::RestProviderConfig;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Request captured by the stub server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Raw path and query.
    pub url: String,
    /// Authorization header value.
    pub authorization: Option<String>,
    /// Request body text.
    pub body: String,
}

impl RecordedRequest {
    /// Returns the percent-decoded path.
    pub fn path(&self) -> String {
        self.parsed().path().to_string()
    }

    /// Returns the decoded query pairs in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.parsed().query_pairs().map(|(key, value)| (key.into_owned(), value.into_owned())).collect()
    }

    /// Returns the body parsed as JSON.
    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }

    fn parsed(&self) -> Url {
        Url::parse(&format!("http://stub{}", self.url)).unwrap()
    }
}

/// Running stub server.
pub struct StubServer {
    /// Base address, e.g. `http://127.0.0.1:4321`.
    pub base: String,
    /// Requests in arrival order.
    pub requests: mpsc::Receiver<RecordedRequest>,
    /// Server thread.
    pub handle: thread::JoinHandle<()>,
}

impl StubServer {
    /// Waits for the server thread and returns the recorded requests.
    pub fn finish(self) -> Vec<RecordedRequest> {
        self.handle.join().unwrap();
        self.requests.try_iter().collect()
    }
}

/// Spawns a stub answering each request with the next scripted response.
pub fn spawn_stub(responses: Vec<(u16, String)>) -> StubServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (sender, requests) = mpsc::channel();
    let handle = thread::spawn(move || {
        for (status, body) in responses {
            let Ok(mut request) = server.recv() else {
                return;
            };
            let authorization = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            let mut text = String::new();
            let _ = request.as_reader().read_to_string(&mut text);
            let _ = sender.send(RecordedRequest {
                method: request.method().as_str().to_string(),
                url: request.url().to_string(),
                authorization,
                body: text,
            });
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response =
                Response::from_string(body).with_status_code(status).with_header(content_type);
            let _ = request.respond(response);
        }
    });
    StubServer {
        base: format!("http://{addr}"),
        requests,
        handle,
    }
}

/// Provider pointed at a stub server.
pub fn provider_for(base: &str) -> RestProvider {
    RestProvider::new(config_for(base)).unwrap()
}

/// Provider configuration pointed at a stub server.
pub fn config_for(base: &str) -> RestProviderConfig {
    RestProviderConfig {
        api_base_url: format!("{base}/v0"),
        meta_base_url: format!("{base}/v0/meta"),
        api_key: "key-test".to_string(),
        timeout_ms: 5_000,
        allow_http: true,
        ..RestProviderConfig::default()
    }
}
