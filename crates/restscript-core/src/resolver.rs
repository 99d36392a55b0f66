//! Endpoint resolution: `service.env@alias:param?query` to a full URL.
//!
//! The grammar is `[service][.env]@[alias-or-path][:param][?query]`:
//!
//! - `users` uses the default service and environment
//! - `user-service.qa@orders` names both
//! - `user-service@user:123` fills the first `{placeholder}` of the `user` alias
//! - `user-service@search?q=john` appends a query string
//!
//! Absolute `http://` and `https://` URLs pass through unchanged.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::config::Config;
use crate::error::ResolutionError;
use crate::http::merge_headers;

/// A resolved URL plus the headers configured for its environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

/// Maps an endpoint expression plus run parameters to a URL.
///
/// Implementations must be safe to call from concurrently running scripts.
pub trait EndpointResolver: Send + Sync {
    fn resolve(
        &self,
        endpoint: &str,
        params: &HashMap<String, String>,
    ) -> Result<ResolvedEndpoint, ResolutionError>;
}

/// Config-backed resolver.
pub struct ServiceResolver {
    config: Config,
}

impl ServiceResolver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Overrides the default environment, e.g. from `--env`.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.config.default_environment = environment.into();
        self
    }
}

/// The parts of an endpoint expression before config lookup.
#[derive(Debug, PartialEq)]
struct EndpointSpec<'a> {
    service: Option<&'a str>,
    environment: Option<&'a str>,
    alias: &'a str,
    inline_param: Option<&'a str>,
    query: Option<&'a str>,
}

fn split_endpoint(endpoint: &str) -> Result<EndpointSpec<'_>, ResolutionError> {
    let invalid = || ResolutionError::InvalidEndpoint(endpoint.to_string());
    let trimmed = endpoint.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (target, query) = match trimmed.split_once('?') {
        Some((t, q)) => (t, Some(q).filter(|q| !q.is_empty())),
        None => (trimmed, None),
    };

    let (service_part, path_part) = match target.split_once('@') {
        Some((s, p)) => (Some(s), p),
        None => (None, target),
    };

    let (service, environment) = match service_part {
        Some(s) => match s.split_once('.') {
            Some((svc, env)) => (Some(svc), Some(env)),
            None => (Some(s), None),
        },
        None => (None, None),
    };
    let is_name = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    };
    if service.is_some_and(|s| !s.is_empty() && !is_name(s))
        || environment.is_some_and(|e| !is_name(e))
    {
        return Err(invalid());
    }

    let (alias, inline_param) = match path_part.split_once(':') {
        Some((a, p)) => (a, Some(p).filter(|p| !p.is_empty())),
        None => (path_part, None),
    };
    if alias.is_empty() {
        return Err(invalid());
    }

    Ok(EndpointSpec {
        service: service.filter(|s| !s.is_empty()),
        environment,
        alias,
        inline_param,
        query,
    })
}

/// Names of `{placeholder}`s in declaration order.
fn placeholders(path: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else { break };
        let name = &after[..end];
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
        rest = &after[end + 1..];
    }
    names
}

impl EndpointResolver for ServiceResolver {
    fn resolve(
        &self,
        endpoint: &str,
        params: &HashMap<String, String>,
    ) -> Result<ResolvedEndpoint, ResolutionError> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(ResolvedEndpoint {
                url: endpoint.to_string(),
                headers: BTreeMap::new(),
            });
        }

        let spec = split_endpoint(endpoint)?;
        let service_name = spec
            .service
            .or(self.config.default_service.as_deref())
            .ok_or(ResolutionError::NoService)?;
        let environment = spec
            .environment
            .or(Some(self.config.default_environment.as_str()).filter(|e| !e.is_empty()))
            .ok_or(ResolutionError::NoEnvironment)?;

        let service = self
            .config
            .service(service_name)
            .ok_or_else(|| ResolutionError::UnknownService(service_name.to_string()))?;
        let env = service.environments.get(environment).ok_or_else(|| {
            ResolutionError::UnknownEnvironment {
                service: service_name.to_string(),
                environment: environment.to_string(),
            }
        })?;

        let mut path = service
            .aliases
            .get(spec.alias)
            .cloned()
            .unwrap_or_else(|| spec.alias.to_string());

        let names: Vec<String> = placeholders(&path).into_iter().map(String::from).collect();
        if let Some(value) = spec.inline_param {
            let name = names.first().map(String::as_str).unwrap_or("id");
            path = path.replace(&format!("{{{}}}", name), value);
        }
        for name in &names {
            let placeholder = format!("{{{}}}", name);
            if !path.contains(&placeholder) {
                continue;
            }
            match params.get(name) {
                Some(value) => path = path.replace(&placeholder, value),
                None => {
                    return Err(ResolutionError::MissingParameter {
                        endpoint: endpoint.to_string(),
                        param: name.clone(),
                    })
                }
            }
        }

        let base = env.base_url.trim_end_matches('/');
        let mut url = if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        if let Some(query) = spec.query {
            url.push('?');
            url.push_str(query);
        }

        let mut headers = self.config.environment_headers(environment);
        merge_headers(&mut headers, env.headers.clone());

        debug!(endpoint, url = %url, "resolved endpoint");
        Ok(ResolvedEndpoint { url, headers })
    }
}
