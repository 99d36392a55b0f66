//! Script execution.
//!
//! The [`ScriptExecutor`] interprets one parsed [`Script`] against a fresh
//! [`VariableStore`], dispatching requests through the shared
//! [`ExecutionContext`]. Statements run strictly in order; the first failed
//! assertion or fault stops the script.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use restscript_core::config::Config;
//! use restscript_core::executor::{ExecutionContext, ScriptExecutor};
//! use restscript_core::parser;
//!
//! #[tokio::main]
//! async fn main() {
//!     let context = ExecutionContext::from_config(Config::load()).expect("http client");
//!     let executor = ScriptExecutor::new(Arc::new(context));
//!
//!     let script = parser::parse("GET users | length\nassert $data > 0").unwrap();
//!     let result = executor.run("smoke", &script, &BTreeMap::new()).await;
//!     println!("{}", result.status);
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::ast::*;
use crate::config::Config;
use crate::error::{EvalError, HttpError, ResolutionError, TransformError};
use crate::http::{merge_headers, HttpClient, HttpRequest, ReqwestClient};
use crate::resolver::{EndpointResolver, ServiceResolver};
use crate::result::{ScriptResult, ScriptStatus};
use crate::runtime::{compare, VariableStore};
use crate::transform::{BuiltinTransforms, Transforms};
use crate::value::Value;

/// Read-only session state shared by every script in a run.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Sent with every request, overriding configured headers.
    pub headers: BTreeMap<String, String>,
}

impl SessionSnapshot {
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Collaborators shared by all script executions.
///
/// Everything here is immutable or internally reentrant, so one context
/// can back many concurrently running scripts.
pub struct ExecutionContext {
    pub resolver: Arc<dyn EndpointResolver>,
    pub client: Arc<dyn HttpClient>,
    pub transforms: Arc<dyn Transforms>,
    pub session: SessionSnapshot,
    pub timeout_ms: u64,
}

impl ExecutionContext {
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        client: Arc<dyn HttpClient>,
        transforms: Arc<dyn Transforms>,
    ) -> Self {
        Self {
            resolver,
            client,
            transforms,
            session: SessionSnapshot::default(),
            timeout_ms: crate::config::DEFAULT_TIMEOUT_MS,
        }
    }

    /// Default adapters: config-backed resolver, reqwest client and the
    /// built-in transforms.
    pub fn from_config(config: Config) -> Result<Self, HttpError> {
        let transforms = BuiltinTransforms::from_config(&config);
        let timeout_ms = config.timeout_ms;
        let client = ReqwestClient::new()?;
        Ok(Self::new(
            Arc::new(ServiceResolver::new(config)),
            Arc::new(client),
            Arc::new(transforms),
        )
        .with_timeout(timeout_ms))
    }

    pub fn with_session(mut self, session: SessionSnapshot) -> Self {
        self.session = session;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Faults that stop a script with an `Error` status.
#[derive(Error, Debug)]
enum StepError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Why a script stopped before its last statement.
enum Halt {
    Fail(String),
    Error(String),
}

impl From<StepError> for Halt {
    fn from(e: StepError) -> Self {
        Halt::Error(e.to_string())
    }
}

impl From<EvalError> for Halt {
    fn from(e: EvalError) -> Self {
        Halt::Error(e.to_string())
    }
}

/// Runs scripts against a shared [`ExecutionContext`].
#[derive(Clone)]
pub struct ScriptExecutor {
    context: Arc<ExecutionContext>,
}

impl ScriptExecutor {
    pub fn new(context: Arc<ExecutionContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }

    /// Runs one script with its own variable store, seeded from `params`.
    ///
    /// Never returns an error: every fault is folded into the result.
    pub async fn run(
        &self,
        script_id: &str,
        script: &Script,
        params: &BTreeMap<String, Value>,
    ) -> ScriptResult {
        let span = info_span!("script", id = %script_id);
        self.run_inner(script_id, script, params).instrument(span).await
    }

    async fn run_inner(
        &self,
        script_id: &str,
        script: &Script,
        params: &BTreeMap<String, Value>,
    ) -> ScriptResult {
        let start = Instant::now();
        let mut store = VariableStore::with_params(params);
        let resolver_params: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        let mut output = Vec::new();

        for stmt in &script.statements {
            debug!(line = stmt.line, source = stmt.source.trim(), "executing statement");
            let outcome = self
                .execute_statement(stmt, &mut store, &resolver_params, &mut output)
                .await;
            let Err(halt) = outcome else { continue };

            let (status, message) = match halt {
                Halt::Fail(message) => (ScriptStatus::Fail, message),
                Halt::Error(message) => (ScriptStatus::Error, message),
            };
            let duration_ms = start.elapsed().as_millis() as u64;
            warn!(line = stmt.line, %status, message = %message, "script stopped");
            return ScriptResult {
                script_id: script_id.to_string(),
                status,
                failed_at: Some(stmt.line),
                message: Some(message),
                duration_ms,
                output,
            };
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(duration_ms, "script passed");
        ScriptResult::pass(script_id, output, duration_ms)
    }

    async fn execute_statement(
        &self,
        stmt: &Statement,
        store: &mut VariableStore,
        params: &HashMap<String, String>,
        output: &mut Vec<String>,
    ) -> Result<(), Halt> {
        match &stmt.kind {
            StatementKind::Assignment { target, expr } => {
                let value = store.eval(expr)?;
                store.set_path(target, value);
                Ok(())
            }
            StatementKind::Request {
                method,
                endpoint,
                body,
                pipeline,
            } => {
                self.execute_request(*method, endpoint, body.as_ref(), pipeline.as_ref(), store, params)
                    .await?;
                Ok(())
            }
            StatementKind::Assertion { left, comparison } => {
                let left_val = store.eval(left)?;
                let (passed, description) = match comparison {
                    Some((op, right)) => {
                        let right_val = store.eval(right)?;
                        (
                            compare(&left_val, *op, &right_val)?,
                            format!("{} {} {}", left, op, right),
                        )
                    }
                    None => (left_val.is_truthy(), left.to_string()),
                };
                if passed {
                    Ok(())
                } else {
                    Err(Halt::Fail(format!("{} failed, got {}", description, left_val)))
                }
            }
            StatementKind::Output { kind, expr } => {
                let value = store.eval(expr)?;
                let rendered = match kind {
                    OutputKind::Echo => value.to_string(),
                    OutputKind::Print => value.to_pretty(),
                };
                output.push(rendered);
                Ok(())
            }
            StatementKind::ControlMarker { kind, raw } => {
                debug!(?kind, raw = raw.as_str(), "skipping control marker");
                Ok(())
            }
        }
    }

    async fn execute_request(
        &self,
        method: HttpMethod,
        endpoint: &Expression,
        body: Option<&Expression>,
        pipeline: Option<&Pipeline>,
        store: &mut VariableStore,
        params: &HashMap<String, String>,
    ) -> Result<(), StepError> {
        let endpoint = store.eval(endpoint)?.to_string();
        let resolved = self.context.resolver.resolve(&endpoint, params)?;

        let mut headers = resolved.headers;
        merge_headers(&mut headers, self.context.session.headers.clone());

        let body = match body {
            Some(Expression::Template(segments)) => {
                let text = store.render(segments)?;
                Some(match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(json) => Value::from(json),
                    Err(_) => Value::String(text),
                })
            }
            Some(expr) => Some(store.eval(expr)?),
            None => None,
        };

        let url = resolved.url;
        let response = self
            .context
            .client
            .execute(HttpRequest {
                method,
                url: url.clone(),
                headers,
                body,
                timeout_ms: self.context.timeout_ms,
            })
            .await?;
        info!(
            method = method.as_str(),
            url = %url,
            status = response.status,
            elapsed_ms = response.elapsed_ms,
            "request completed"
        );

        store.set("response".to_string(), response.to_value());
        let data = match pipeline {
            None => response.body,
            Some(pipeline) => self.apply_pipeline(&response.body, pipeline)?,
        };
        store.set("data".to_string(), data);
        Ok(())
    }

    fn apply_pipeline(&self, data: &Value, pipeline: &Pipeline) -> Result<Value, TransformError> {
        let transforms = &self.context.transforms;
        match pipeline {
            Pipeline::Filter(expr) => transforms.filter(data, expr),
            Pipeline::NamedFilter(name) => {
                let expr = transforms
                    .named_filter(name)
                    .ok_or_else(|| TransformError::FilterNotFound(name.clone()))?;
                transforms.filter(data, &expr)
            }
            Pipeline::Projection(name) => transforms.project(data, name),
        }
    }
}
