//! Error types for each layer of the engine.
//!
//! Parse and plan errors surface before any request is sent. Everything
//! raised while a script runs is folded into the script's
//! [`ScriptResult`](crate::result::ScriptResult) by the executor and never
//! escapes the suite runner.

use std::path::PathBuf;

use thiserror::Error;

/// A malformed script line.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error at line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(line: usize, reason: impl Into<String>) -> Self {
        Self { line, reason: reason.into() }
    }
}

/// Failures while evaluating expressions or assertions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined variable: ${0}")]
    UndefinedVariable(String),

    #[error("Invalid path '{path}': {message}")]
    Path { path: String, message: String },

    #[error("Cannot compare {left} {op} {right}")]
    Incomparable {
        left: String,
        op: &'static str,
        right: String,
    },
}

/// The endpoint resolver could not produce a URL.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("Service not specified and no default service set")]
    NoService,

    #[error("Environment not specified and no default environment set")]
    NoEnvironment,

    #[error("Service not found: {0}")]
    UnknownService(String),

    #[error("Environment '{environment}' not found for service '{service}'")]
    UnknownEnvironment { service: String, environment: String },

    #[error("Missing path parameter '{param}' for '{endpoint}'")]
    MissingParameter { endpoint: String, param: String },
}

/// Transport-level HTTP failures. Non-2xx statuses are not errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Filter and projection failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Unknown filter: {0}")]
    FilterNotFound(String),

    #[error("Unknown projection: {0}")]
    ProjectionNotFound(String),

    #[error("Unsupported filter expression '{expr}': {message}")]
    InvalidFilter { expr: String, message: String },
}

/// Configuration file problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config '{path}': {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Suite planning failures. All of these happen before any script runs.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Cannot read suite '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid suite '{path}': {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Suite defines no scripts, parallel_groups or steps")]
    Empty,

    #[error("Step '{0}' names neither a script nor scripts")]
    EmptyStep(String),

    #[error("Unresolved scripts: {}", .0.join(", "))]
    UnresolvedScripts(Vec<String>),

    #[error("Cannot read script '{path}': {source}")]
    ScriptIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("In script '{script}': {source}")]
    Parse {
        script: String,
        #[source]
        source: ParseError,
    },
}
