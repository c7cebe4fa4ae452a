//! Script specification: the YAML file describing one replayable script.
//!
//! ```yaml
//! inputs:
//!   - file1: data1            # local path: datastore path
//! outputs:
//!   - result.csv: results/result.csv
//! script: scripts/run.py      # relative to the spec's directory
//! python dependencies:
//!   - roman==2.0.0
//! options:
//!   - uses database
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{ReplayError, Result};

pub const DEFAULT_INTERPRETER: &str = "python";

/// Option flag enabling the ephemeral database.
pub const OPTION_USES_DATABASE: &str = "uses database";
/// Older spelling of [`OPTION_USES_DATABASE`].
pub const OPTION_USES_PSQL: &str = "uses psql";
pub const OPTION_DEBUG: &str = "debug";
pub const OPTION_KEEP_DATABASE: &str = "keep database";

/// Keys [`RawSpec`] understands. Anything else is ignored with a warning.
const KNOWN_KEYS: &[&str] = &[
    "inputs",
    "outputs",
    "script",
    "interpreter",
    "arguments",
    "python dependencies",
    "dependencies",
    "options",
];

/// Raw YAML shape. Every key is optional and `key:` with no value means empty.
#[derive(Deserialize, Debug, Default)]
struct RawSpec {
    #[serde(default)]
    inputs: Option<Vec<BTreeMap<String, String>>>,
    #[serde(default)]
    outputs: Option<Vec<BTreeMap<String, String>>>,
    #[serde(default)]
    script: Option<String>,
    #[serde(default)]
    interpreter: Option<String>,
    #[serde(default)]
    arguments: Option<Vec<String>>,
    #[serde(default, rename = "python dependencies", alias = "dependencies")]
    python_dependencies: Option<Vec<String>>,
    #[serde(default)]
    options: Option<Vec<String>>,
}

/// One file transfer between the workspace and the datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    /// Path relative to the script's working directory
    pub local: PathBuf,
    /// Slash-separated logical datastore path
    pub store: String,
}

/// Parsed, validated description of one script. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    name: String,
    dir: PathBuf,
    inputs: Vec<FileMapping>,
    outputs: Vec<FileMapping>,
    entry: Option<String>,
    interpreter: String,
    arguments: Vec<String>,
    python_dependencies: Vec<String>,
    options: BTreeSet<String>,
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("script name regex is valid"))
}

/// Top-level string keys of `content` outside [`KNOWN_KEYS`].
fn unknown_keys(content: &str) -> Vec<String> {
    let Ok(Some(mapping)) = serde_yaml::from_str::<Option<serde_yaml::Mapping>>(content) else {
        return Vec::new();
    };
    mapping
        .keys()
        .filter_map(|k| k.as_str())
        .filter(|k| !KNOWN_KEYS.contains(k))
        .map(str::to_string)
        .collect()
}

/// Check a logical script name: letters, digits and `_`, not starting with a digit.
pub fn validate_script_name(name: &str) -> Result<()> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ReplayError::InvalidScriptName(name.to_string()))
    }
}

impl ScriptSpec {
    /// Load a spec file. The script name is the file stem, the script directory
    /// is the file's parent.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(ReplayError::io(format!("Read script spec {}", path.display())))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ReplayError::InvalidScriptSpec {
                path: path.to_path_buf(),
                reason: "cannot derive a script name from the file name".to_string(),
            })?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let dir = dir
            .canonicalize()
            .map_err(ReplayError::io(format!("Resolve script directory {}", dir.display())))?;
        Self::parse(&dir, name, &content).map_err(|e| match e {
            ReplayError::InvalidScriptSpec { reason, .. } => ReplayError::InvalidScriptSpec {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse YAML `content` for the script `name` living in `dir`.
    pub fn parse(dir: &Path, name: &str, content: &str) -> Result<Self> {
        validate_script_name(name)?;
        let invalid = |reason: String| ReplayError::InvalidScriptSpec {
            path: dir.join(name),
            reason,
        };

        let raw: RawSpec = if content.trim().is_empty() {
            RawSpec::default()
        } else {
            serde_yaml::from_str::<Option<RawSpec>>(content)
                .map_err(|e| invalid(format!("malformed YAML: {e}")))?
                .unwrap_or_default()
        };

        for key in unknown_keys(content) {
            tracing::warn!(script = %name, key = %key, "Ignoring unknown key in script spec");
        }

        let inputs = file_mappings(raw.inputs.unwrap_or_default(), "inputs").map_err(invalid)?;
        let outputs = file_mappings(raw.outputs.unwrap_or_default(), "outputs").map_err(invalid)?;

        let entry = raw
            .script
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let interpreter = raw
            .interpreter
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string());

        let python_dependencies: Vec<String> = raw
            .python_dependencies
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.trim().to_string())
            .collect();
        if python_dependencies.iter().any(|d| d.is_empty()) {
            return Err(invalid("empty entry in python dependencies".to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            inputs,
            outputs,
            entry,
            interpreter,
            arguments: raw.arguments.unwrap_or_default(),
            python_dependencies,
            options: raw.options.unwrap_or_default().into_iter().collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the spec; entry files are resolved against it.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn inputs(&self) -> &[FileMapping] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[FileMapping] {
        &self.outputs
    }

    /// Entry file as written in the spec, if any.
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// Absolute path of the entry file.
    pub fn entry_path(&self) -> Option<PathBuf> {
        self.entry.as_ref().map(|e| self.dir.join(e))
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Dependencies in declaration order (the install order).
    pub fn python_dependencies(&self) -> &[String] {
        &self.python_dependencies
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.contains(option)
    }

    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(String::as_str)
    }
}

fn file_mappings(raw: Vec<BTreeMap<String, String>>, section: &str) -> std::result::Result<Vec<FileMapping>, String> {
    raw.into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let count = entry.len();
            let mut pairs = entry.into_iter();
            let (local, store) = match (pairs.next(), pairs.next()) {
                (Some(pair), None) => pair,
                _ => {
                    return Err(format!(
                        "{section}[{i}] must map exactly one local path to one datastore path, found {count} entries"
                    ))
                }
            };
            if local.trim().is_empty() || store.trim().is_empty() {
                return Err(format!("{section}[{i}] has an empty path"));
            }
            Ok(FileMapping {
                local: PathBuf::from(local),
                store,
            })
        })
        .collect()
}
