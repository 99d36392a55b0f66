//! # restscript-core
//!
//! Script execution and orchestration engine for REST request testing.
//!
//! Scripts are small line-oriented programs that issue HTTP requests against
//! configured services, bind results to variables, and assert on them:
//!
//! ```text
//! GET users | length
//! $count = $data
//! assert $count > 0
//! ```
//!
//! ## Modules
//!
//! - [`parser`] - Line parser producing [`ast::Script`]s
//! - [`runtime`] - Per-run variable store and comparison semantics
//! - [`executor`] - Runs one script and produces a [`result::ScriptResult`]
//! - [`suite`] - Plans YAML suites into sequential and parallel run units
//! - [`runner`] - Runs planned suites into a [`result::SuiteReport`]
//! - [`resolver`] - `service.env@alias:param` endpoint resolution
//! - [`http`] - HTTP client trait and the reqwest implementation
//! - [`transform`] - jq-style filters and field projections
//! - [`config`] - `~/.restscript/config.yaml` loading
//!
//! ## Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use restscript_core::config::Config;
//! use restscript_core::executor::{ExecutionContext, ScriptExecutor};
//! use restscript_core::runner::SuiteRunner;
//! use restscript_core::suite;
//!
//! #[tokio::main]
//! async fn main() {
//!     let context = ExecutionContext::from_config(Config::load()).expect("http client");
//!     let runner = SuiteRunner::new(ScriptExecutor::new(Arc::new(context)));
//!
//!     let plan = suite::plan_file(Path::new("nightly.yaml")).expect("valid suite");
//!     let report = runner.run(&plan, &BTreeMap::new()).await;
//!     println!("{} passed, {} failed", report.passed, report.failed);
//! }
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod parser;
pub mod resolver;
pub mod result;
pub mod runner;
pub mod runtime;
pub mod suite;
pub mod transform;
pub mod value;
