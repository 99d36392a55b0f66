//! Suite planning: YAML suite descriptions to ordered run units.
//!
//! Three shapes are accepted:
//!
//! ```yaml
//! # flat list, run in order
//! scripts: [login.req, users.req]
//!
//! # groups, run in order; members of a parallel group run concurrently
//! parallel_groups:
//!   - name: reads
//!     parallel: true
//!     scripts: [users.req, orders.req]
//!
//! # mixed steps
//! steps:
//!   - name: setup
//!     script: login.req
//!   - name: checks
//!     parallel: true
//!     scripts: [users.req, orders.req]
//! options:
//!   stop_on_error: false
//! ```
//!
//! When a file names more than one shape, `scripts` wins over
//! `parallel_groups`, which wins over `steps`.
//!
//! Every referenced script is located and parsed while planning, so a bad
//! suite fails before any request is sent.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::Script;
use crate::config::scripts_dir;
use crate::error::PlanError;
use crate::parser;
use crate::value::Value;

const SCRIPT_EXTENSION: &str = "req";
const ADHOC_SUITE_NAME: &str = "ad-hoc";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SuiteDescription {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scripts: Option<Vec<String>>,
    #[serde(default)]
    pub parallel_groups: Option<Vec<GroupSpec>>,
    #[serde(default)]
    pub steps: Option<Vec<StepSpec>>,
    #[serde(default)]
    pub options: SuiteOptions,
    /// Parameters seeded into every script of the suite.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GroupSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub scripts: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StepSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub scripts: Option<Vec<String>>,
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SuiteOptions {
    #[serde(default = "default_stop_on_error")]
    pub stop_on_error: bool,
}

fn default_stop_on_error() -> bool {
    true
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self { stop_on_error: true }
    }
}

impl SuiteDescription {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Suite over scripts named on the command line: one concurrent group
    /// when `parallel`, otherwise one unit per script in order.
    pub fn adhoc(scripts: Vec<String>, parallel: bool, stop_on_error: bool) -> Self {
        let mut description = Self {
            name: Some(ADHOC_SUITE_NAME.to_string()),
            options: SuiteOptions { stop_on_error },
            ..Self::default()
        };
        if parallel {
            description.parallel_groups = Some(vec![GroupSpec {
                name: Some(ADHOC_SUITE_NAME.to_string()),
                parallel: true,
                scripts,
            }]);
        } else {
            description.scripts = Some(scripts);
        }
        description
    }
}

/// A located and parsed script.
#[derive(Debug)]
pub struct ScriptEntry {
    /// The id as written in the suite.
    pub id: String,
    pub path: PathBuf,
    pub script: Script,
}

/// The runner's scheduling granule.
#[derive(Debug, Clone)]
pub enum RunUnit {
    Single(Arc<ScriptEntry>),
    /// Members run concurrently; the unit ends when all have finished.
    Group {
        label: String,
        members: Vec<Arc<ScriptEntry>>,
    },
}

impl RunUnit {
    pub fn script_ids(&self) -> Vec<&str> {
        match self {
            RunUnit::Single(entry) => vec![entry.id.as_str()],
            RunUnit::Group { members, .. } => members.iter().map(|m| m.id.as_str()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuitePlan {
    pub name: String,
    pub units: Vec<RunUnit>,
    pub options: SuiteOptions,
    pub params: BTreeMap<String, Value>,
}

/// Finds script files by id.
///
/// Lookup order: absolute path, then each search directory in order
/// (suite directory, working directory, user scripts directory). Each
/// candidate is also tried with a `.req` extension.
#[derive(Debug, Clone)]
pub struct ScriptLocator {
    search_dirs: Vec<PathBuf>,
}

impl ScriptLocator {
    /// Locator searching `base_dir` (if any), the working directory and the
    /// user scripts directory.
    pub fn new(base_dir: Option<&Path>) -> Self {
        let mut search_dirs = Vec::new();
        if let Some(dir) = base_dir {
            search_dirs.push(dir.to_path_buf());
        }
        if let Ok(cwd) = std::env::current_dir() {
            search_dirs.push(cwd);
        }
        search_dirs.push(scripts_dir());
        Self { search_dirs }
    }

    pub fn with_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    pub fn locate(&self, id: &str) -> Option<PathBuf> {
        let path = Path::new(id);
        if path.is_absolute() {
            return candidates(path).into_iter().find(|p| p.is_file());
        }
        self.search_dirs
            .iter()
            .flat_map(|dir| candidates(&dir.join(path)))
            .find(|p| p.is_file())
    }
}

fn candidates(path: &Path) -> Vec<PathBuf> {
    let mut with_ext = path.as_os_str().to_owned();
    with_ext.push(".");
    with_ext.push(SCRIPT_EXTENSION);
    vec![path.to_path_buf(), PathBuf::from(with_ext)]
}

/// Reads and parses one script file.
pub fn load_script(id: &str, path: &Path) -> Result<Script, PlanError> {
    let source = std::fs::read_to_string(path).map_err(|source| PlanError::ScriptIo {
        path: path.to_path_buf(),
        source,
    })?;
    parser::parse(&source).map_err(|source| PlanError::Parse {
        script: id.to_string(),
        source,
    })
}

/// Unit layout before scripts are located.
enum UnitSpec {
    Single(String),
    Group { label: String, ids: Vec<String> },
}

fn unit_specs(description: &SuiteDescription) -> Result<Vec<UnitSpec>, PlanError> {
    let mut specs = Vec::new();

    if let Some(scripts) = &description.scripts {
        specs.extend(scripts.iter().cloned().map(UnitSpec::Single));
    } else if let Some(groups) = &description.parallel_groups {
        for (index, group) in groups.iter().enumerate() {
            let label = group
                .name
                .clone()
                .unwrap_or_else(|| format!("group {}", index + 1));
            push_scripts(&mut specs, label, group.parallel, &group.scripts);
        }
    } else if let Some(steps) = &description.steps {
        for (index, step) in steps.iter().enumerate() {
            let label = step
                .name
                .clone()
                .unwrap_or_else(|| format!("step {}", index + 1));
            match (&step.script, &step.scripts) {
                (Some(script), _) => specs.push(UnitSpec::Single(script.clone())),
                (None, Some(scripts)) => push_scripts(&mut specs, label, step.parallel, scripts),
                (None, None) => return Err(PlanError::EmptyStep(label)),
            }
        }
    } else {
        return Err(PlanError::Empty);
    }

    if specs.is_empty() {
        return Err(PlanError::Empty);
    }
    Ok(specs)
}

fn push_scripts(specs: &mut Vec<UnitSpec>, label: String, parallel: bool, scripts: &[String]) {
    if scripts.is_empty() {
        return;
    }
    if parallel {
        specs.push(UnitSpec::Group {
            label,
            ids: scripts.to_vec(),
        });
    } else {
        specs.extend(scripts.iter().cloned().map(UnitSpec::Single));
    }
}

/// Normalizes a suite description into run units.
pub fn plan(description: &SuiteDescription, locator: &ScriptLocator) -> Result<SuitePlan, PlanError> {
    let specs = unit_specs(description)?;

    let mut ids: Vec<&str> = Vec::new();
    for spec in &specs {
        match spec {
            UnitSpec::Single(id) => ids.push(id),
            UnitSpec::Group { ids: members, .. } => ids.extend(members.iter().map(String::as_str)),
        }
    }

    let mut located: HashMap<&str, PathBuf> = HashMap::new();
    let mut unresolved: Vec<String> = Vec::new();
    for id in ids {
        if located.contains_key(id) || unresolved.iter().any(|u| u == id) {
            continue;
        }
        match locator.locate(id) {
            Some(path) => {
                located.insert(id, path);
            }
            None => unresolved.push(id.to_string()),
        }
    }
    if !unresolved.is_empty() {
        return Err(PlanError::UnresolvedScripts(unresolved));
    }

    let mut entries: HashMap<String, Arc<ScriptEntry>> = HashMap::new();
    let mut entry_for = |id: &str| -> Result<Arc<ScriptEntry>, PlanError> {
        if let Some(entry) = entries.get(id) {
            return Ok(Arc::clone(entry));
        }
        let path = located[id].clone();
        let script = load_script(id, &path)?;
        debug!(script = id, path = %path.display(), statements = script.statements.len(), "planned script");
        let entry = Arc::new(ScriptEntry {
            id: id.to_string(),
            path,
            script,
        });
        entries.insert(id.to_string(), Arc::clone(&entry));
        Ok(entry)
    };

    let mut units = Vec::with_capacity(specs.len());
    for spec in &specs {
        units.push(match spec {
            UnitSpec::Single(id) => RunUnit::Single(entry_for(id.as_str())?),
            UnitSpec::Group { label, ids } => RunUnit::Group {
                label: label.clone(),
                members: ids
                    .iter()
                    .map(|id| entry_for(id.as_str()))
                    .collect::<Result<_, _>>()?,
            },
        });
    }

    Ok(SuitePlan {
        name: description
            .name
            .clone()
            .unwrap_or_else(|| "Unnamed Suite".to_string()),
        units,
        options: description.options,
        params: description.params.clone(),
    })
}

/// Loads a suite file and plans it, resolving scripts relative to the
/// suite's directory first.
pub fn plan_file(path: &Path) -> Result<SuitePlan, PlanError> {
    let text = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut description = SuiteDescription::from_yaml(&text).map_err(|source| PlanError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    if description.name.is_none() {
        description.name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
    }
    let locator = ScriptLocator::new(path.parent());
    plan(&description, &locator)
}
