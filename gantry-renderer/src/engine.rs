//! Tera scaffolding engine.
//!
//! # Path mapping
//!
//! | Kind   | Output path(s), relative to the component directory |
//! |--------|-----------------------------------------------------|
//! | Job    | `config.yml`, `overrides.yml`, `main.py`            |
//! | Module | `<name>/__init__.py`                                |
//!
//! Templates under a user template directory (`<project>/.gantry/templates`)
//! replace the embedded defaults of the same name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use gantry_core::layout::{JOB_CONFIG_FILE, JOB_OVERRIDES_FILE, JOB_SCRIPT_FILE};
use gantry_core::types::ComponentKind;

use crate::context::ScaffoldContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates — baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("job/config.yml.tera", include_str!("templates/job_config.yml.tera")),
    ("job/overrides.yml.tera", include_str!("templates/job_overrides.yml.tera")),
    ("job/main.py.tera", include_str!("templates/job_main.py.tera")),
    ("module/__init__.py.tera", include_str!("templates/module_init.py.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    // Scaffolded files are YAML and Python, not HTML.
    tera.autoescape_on(vec![]);
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

/// Template names for a component kind, paired with the relative output path.
fn scaffold_files(kind: ComponentKind, name: &str) -> Vec<(&'static str, PathBuf)> {
    match kind {
        ComponentKind::Job => vec![
            ("job/config.yml.tera", PathBuf::from(JOB_CONFIG_FILE)),
            ("job/overrides.yml.tera", PathBuf::from(JOB_OVERRIDES_FILE)),
            ("job/main.py.tera", PathBuf::from(JOB_SCRIPT_FILE)),
        ],
        ComponentKind::Module => vec![(
            "module/__init__.py.tera",
            PathBuf::from(name).join("__init__.py"),
        )],
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering templates with optional user overrides.
///
/// Template names are normalised to lowercase and relative paths.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Load the embedded templates plus any overrides found in
    /// `user_template_dir`.
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Render every scaffolding file for `ctx.kind`.
    ///
    /// Returns `Vec<(relative_output_path, rendered_content)>`; paths are
    /// relative to the new component's directory.
    pub fn render(&self, ctx: &ScaffoldContext) -> Result<Vec<(PathBuf, String)>, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let files = scaffold_files(ctx.kind, &ctx.name);
        let mut results = Vec::with_capacity(files.len());
        for (template, path) in files {
            let content = self.tera.render(template, &tera_ctx)?;
            results.push((path, content.replace("\r\n", "\n")));
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// ScaffoldRenderer
// ---------------------------------------------------------------------------

/// Renderer for `gantry new`. Create once and reuse.
pub struct ScaffoldRenderer {
    engine: TemplateEngine,
}

impl ScaffoldRenderer {
    /// Embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Ok(ScaffoldRenderer { engine: TemplateEngine::new(None)? })
    }

    /// Embedded templates, overridden by any `.tera` files in `dir`.
    pub fn with_user_templates(dir: &Path) -> Result<Self, RenderError> {
        Ok(ScaffoldRenderer { engine: TemplateEngine::new(Some(dir))? })
    }

    pub fn render(&self, ctx: &ScaffoldContext) -> Result<Vec<(PathBuf, String)>, RenderError> {
        self.engine.render(ctx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
