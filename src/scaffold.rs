//! Project scaffolding.
//!
//! # Responsibilities
//! - Validate a new project's name
//! - Derive type names from it (`my-svc` → `MySvcService`, `MySvcConfig`)
//! - Render the embedded templates into a fresh directory
//!
//! # Design Decisions
//! - Templates are compiled into the binary; no runtime template files
//! - Placeholders are plain `{{key}}` substitutions, no template engine
//! - Never writes into an existing directory
//! - The generated crate depends on runwright by path, since it is not
//!   published to a registry

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static NAME_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9\-]+$"));

const TEMPLATES: &[(&str, &str)] = &[
    ("Cargo.toml", include_str!("../templates/Cargo.toml.tmpl")),
    ("src/main.rs", include_str!("../templates/main.rs.tmpl")),
    ("src/config.rs", include_str!("../templates/config.rs.tmpl")),
    ("src/service.rs", include_str!("../templates/service.rs.tmpl")),
    ("config.yaml", include_str!("../templates/config.yaml.tmpl")),
];

/// Errors raised while generating a project.
#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("invalid project name '{0}': only alphanumeric characters and dashes allowed, first character must be a letter")]
    InvalidName(String),

    #[error("project name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("could not write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Names substituted into the templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectNames {
    /// The project name as given, also the crate name.
    pub name: String,
    pub service_name: String,
    pub config_name: String,
    /// Directory of the runwright crate the project depends on.
    pub runwright_path: PathBuf,
}

impl ProjectNames {
    pub fn new(name: &str, runwright_path: &Path) -> Result<Self, ScaffoldError> {
        validate_name(name)?;
        let pascal = pascalize(name);
        Ok(Self {
            name: name.to_string(),
            service_name: format!("{}Service", pascal),
            config_name: format!("{}Config", pascal),
            runwright_path: runwright_path.to_path_buf(),
        })
    }
}

/// The runwright crate this binary was built from.
pub fn default_runwright_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn validate_name(name: &str) -> Result<(), ScaffoldError> {
    let pattern = NAME_RE.as_ref().map_err(|e| ScaffoldError::Pattern(e.clone()))?;
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(ScaffoldError::InvalidName(name.to_string()))
    }
}

/// `my-cool-svc` → `MyCoolSvc`. Existing capitals are kept.
pub fn pascalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut word_start = true;
    for c in name.chars() {
        if c == '-' {
            word_start = true;
            continue;
        }
        if word_start {
            out.push(c.to_ascii_uppercase());
            word_start = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Replace every `{{key}}` placeholder. `{{runwright_path}}` renders as a
/// quoted TOML string.
pub fn render(template: &str, names: &ProjectNames) -> String {
    let runwright_path =
        toml::Value::String(names.runwright_path.to_string_lossy().into_owned()).to_string();
    template
        .replace("{{name}}", &names.name)
        .replace("{{service_name}}", &names.service_name)
        .replace("{{config_name}}", &names.config_name)
        .replace("{{runwright_path}}", &runwright_path)
}

/// Generate project `name` under `parent`, depending on the runwright crate
/// at `runwright_path`. Returns the project directory.
pub fn generate(parent: &Path, name: &str, runwright_path: &Path) -> Result<PathBuf, ScaffoldError> {
    let names = ProjectNames::new(name, runwright_path)?;
    let root = parent.join(&names.name);

    if root.exists() {
        return Err(ScaffoldError::AlreadyExists(root));
    }
    create_dir(&root)?;

    for (file, template) in TEMPLATES {
        let path = root.join(file);
        if let Some(dir) = path.parent() {
            create_dir(dir)?;
        }
        fs::write(&path, render(template, &names))
            .map_err(|source| ScaffoldError::Write { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), "File written");
    }

    Ok(root)
}

fn create_dir(path: &Path) -> Result<(), ScaffoldError> {
    fs::create_dir_all(path).map_err(|source| ScaffoldError::Write {
        path: path.to_path_buf(),
        source,
    })
}
