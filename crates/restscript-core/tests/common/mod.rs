//! Shared test helpers for restscript-core integration tests.
//!
//! Provides a programmable mock HTTP client and a pass-through resolver so
//! scripts can run without network access.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use restscript_core::ast::Script;
use restscript_core::error::{HttpError, ResolutionError};
use restscript_core::executor::{ExecutionContext, ScriptExecutor, SessionSnapshot};
use restscript_core::http::{HttpClient, HttpRequest, HttpResponse};
use restscript_core::parser;
use restscript_core::resolver::{EndpointResolver, ResolvedEndpoint};
use restscript_core::suite::{RunUnit, ScriptEntry};
use restscript_core::transform::BuiltinTransforms;
use restscript_core::value::Value;

pub const MOCK_BASE: &str = "http://mock.test/";

// ---------------------------------------------------------------------------
// Programmable mock HTTP client
// ---------------------------------------------------------------------------

/// Describes how the mock client answers requests for one URL.
#[derive(Clone)]
pub enum MockBehavior {
    /// Reply with the given status and JSON body.
    Respond(u16, serde_json::Value),
    /// Sleep for `Duration`, then reply.
    Delay(Duration, u16, serde_json::Value),
    /// Fail with a network error.
    Fail(String),
}

/// Mock client routing by full URL. Unrouted URLs answer 404.
#[derive(Default)]
pub struct MockHttpClient {
    routes: HashMap<String, MockBehavior>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `endpoint` as written in a script (resolved by [`MockResolver`]).
    pub fn route(mut self, endpoint: &str, behavior: MockBehavior) -> Self {
        self.routes.insert(format!("{}{}", MOCK_BASE, endpoint), behavior);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let behavior = self.routes.get(&request.url).cloned();
        self.requests.lock().unwrap().push(request);

        let (status, body) = match behavior {
            Some(MockBehavior::Respond(status, body)) => (status, body),
            Some(MockBehavior::Delay(duration, status, body)) => {
                tokio::time::sleep(duration).await;
                (status, body)
            }
            Some(MockBehavior::Fail(message)) => return Err(HttpError::Network(message)),
            None => (404, serde_json::json!({"error": "not found"})),
        };
        Ok(HttpResponse {
            status,
            headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
            body: Value::from(body),
            elapsed_ms: 1,
        })
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolves every endpoint to `MOCK_BASE + endpoint`, rejecting `missing:*`.
pub struct MockResolver;

impl EndpointResolver for MockResolver {
    fn resolve(
        &self,
        endpoint: &str,
        _params: &HashMap<String, String>,
    ) -> Result<ResolvedEndpoint, ResolutionError> {
        if endpoint.starts_with("missing") {
            return Err(ResolutionError::UnknownService(endpoint.to_string()));
        }
        Ok(ResolvedEndpoint {
            url: format!("{}{}", MOCK_BASE, endpoint),
            headers: BTreeMap::from([("x-env".to_string(), "test".to_string())]),
        })
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn context(client: Arc<MockHttpClient>) -> ExecutionContext {
    ExecutionContext::new(
        Arc::new(MockResolver),
        client,
        Arc::new(BuiltinTransforms::new()),
    )
    .with_timeout(1_000)
}

pub fn executor(client: Arc<MockHttpClient>) -> ScriptExecutor {
    ScriptExecutor::new(Arc::new(context(client)))
}

pub fn executor_with_transforms(client: Arc<MockHttpClient>, transforms: BuiltinTransforms) -> ScriptExecutor {
    let context = ExecutionContext::new(Arc::new(MockResolver), client, Arc::new(transforms)).with_timeout(1_000);
    ScriptExecutor::new(Arc::new(context))
}

pub fn executor_with_session(client: Arc<MockHttpClient>, session: SessionSnapshot) -> ScriptExecutor {
    ScriptExecutor::new(Arc::new(context(client).with_session(session)))
}

pub fn script(source: &str) -> Script {
    parser::parse(source).expect("test script should parse")
}

pub fn entry(id: &str, source: &str) -> Arc<ScriptEntry> {
    Arc::new(ScriptEntry {
        id: id.to_string(),
        path: format!("/virtual/{}.req", id).into(),
        script: script(source),
    })
}

pub fn single(id: &str, source: &str) -> RunUnit {
    RunUnit::Single(entry(id, source))
}

pub fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
