//! Job override expansion.
//!
//! A job has one base `job_config` and an ordered list of override fragments.
//! Each fragment yields one deployment document:
//!
//! 1. deep copy of the base;
//! 2. top-level keys of the fragment replace the base keys;
//! 3. `DefaultArguments` is merged key by key, fragment keys winning, so a
//!    partial override keeps unrelated arguments;
//! 4. computed fields are injected last (script location, extra files).
//!
//! With no fragments the base alone yields exactly one document.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::RenderError;

pub const DEFAULT_ARGUMENTS: &str = "DefaultArguments";
pub const COMMAND: &str = "Command";
pub const SCRIPT_LOCATION: &str = "ScriptLocation";
pub const NAME: &str = "Name";
pub const EXTRA_PY_FILES: &str = "--extra-py-files";
pub const EXTRA_JARS: &str = "--extra-jars";

/// Values the engine computes for every deployment document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputedFields {
    /// Remote URI of the job's entry script.
    pub script_location: String,
    /// Remote URIs of the job's own python files followed by the package
    /// artifacts of every referenced module at its pinned version.
    pub extra_py_files: Vec<String>,
    /// Remote URIs of the job's jar files.
    pub extra_jars: Vec<String>,
}

/// Merge one override fragment over `base`.
///
/// Both values must be JSON objects.
pub fn merge_override(base: &Value, fragment: &Value) -> Result<Value, RenderError> {
    merge_at(base, fragment, None)
}

/// Expand `base` and `overrides` into fully-resolved deployment documents.
pub fn expand(
    base: &Value,
    overrides: &[Value],
    computed: &ComputedFields,
) -> Result<Vec<Value>, RenderError> {
    as_object(base, None)?;

    let mut documents = Vec::with_capacity(overrides.len().max(1));
    if overrides.is_empty() {
        documents.push((None, base.clone()));
    } else {
        for (index, fragment) in overrides.iter().enumerate() {
            documents.push((Some(index), merge_at(base, fragment, Some(index))?));
        }
    }

    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(documents.len());
    for (target, mut document) in documents {
        inject_computed(&mut document, computed, target)?;
        let name = document_name(&document, target)?;
        if !seen.insert(name.to_string()) {
            return Err(RenderError::DuplicateJobName(name.to_string()));
        }
        resolved.push(document);
    }
    Ok(resolved)
}

/// The `Name` of a deployment document.
pub fn document_name(document: &Value, target: Option<usize>) -> Result<&str, RenderError> {
    match document.get(NAME) {
        Some(Value::String(name)) if !name.trim().is_empty() => Ok(name),
        Some(_) => Err(invalid(target, "Name must be a non-empty string")),
        None => Err(invalid(target, "Name is required")),
    }
}

fn merge_at(base: &Value, fragment: &Value, target: Option<usize>) -> Result<Value, RenderError> {
    let mut merged = as_object(base, None)?.clone();
    let fragment = as_object(fragment, target)?;

    for (key, value) in fragment {
        if key == DEFAULT_ARGUMENTS {
            if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (merged.get_mut(key), value)
            {
                for (arg, arg_value) in incoming {
                    existing.insert(arg.clone(), arg_value.clone());
                }
                continue;
            }
        }
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(merged))
}

fn inject_computed(
    document: &mut Value,
    computed: &ComputedFields,
    target: Option<usize>,
) -> Result<(), RenderError> {
    let doc = document
        .as_object_mut()
        .ok_or_else(|| invalid(target, "document must be a mapping"))?;

    let command = child_object(doc, COMMAND, target)?;
    command.insert(
        SCRIPT_LOCATION.to_string(),
        Value::String(computed.script_location.clone()),
    );

    let arguments = child_object(doc, DEFAULT_ARGUMENTS, target)?;
    append_paths(arguments, EXTRA_PY_FILES, &computed.extra_py_files, target)?;
    append_paths(arguments, EXTRA_JARS, &computed.extra_jars, target)?;
    Ok(())
}

/// Join user-declared comma lists with computed paths. Spaces are not allowed
/// inside these argument values.
fn append_paths(
    arguments: &mut Map<String, Value>,
    key: &str,
    paths: &[String],
    target: Option<usize>,
) -> Result<(), RenderError> {
    if paths.is_empty() {
        return Ok(());
    }
    let mut parts: Vec<String> = match arguments.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(existing)) => existing
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        Some(_) => return Err(invalid(target, &format!("{key} must be a string"))),
    };
    for path in paths {
        let path = path.replace(' ', "");
        if !parts.contains(&path) {
            parts.push(path);
        }
    }
    arguments.insert(key.to_string(), Value::String(parts.join(",")));
    Ok(())
}

fn child_object<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
    target: Option<usize>,
) -> Result<&'a mut Map<String, Value>, RenderError> {
    let entry = parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if entry.is_null() {
        *entry = Value::Object(Map::new());
    }
    entry
        .as_object_mut()
        .ok_or_else(|| invalid(target, &format!("{key} must be a mapping")))
}

fn as_object(value: &Value, target: Option<usize>) -> Result<&Map<String, Value>, RenderError> {
    value
        .as_object()
        .ok_or_else(|| invalid(target, "expected a mapping"))
}

fn invalid(target: Option<usize>, reason: &str) -> RenderError {
    RenderError::InvalidDocument {
        target,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn computed() -> ComputedFields {
        ComputedFields {
            script_location: "s3://lake/gantry/gantry_job/etl/version=2/etl/main.py".to_string(),
            extra_py_files: vec![],
            extra_jars: vec![],
        }
    }

    #[test]
    fn partial_default_arguments_override_keeps_other_keys() {
        let base = json!({"DefaultArguments": {"--a": "1", "--b": "2"}});
        let merged = merge_override(&base, &json!({"DefaultArguments": {"--b": "9"}})).unwrap();
        assert_eq!(merged["DefaultArguments"], json!({"--a": "1", "--b": "9"}));
    }

    #[test]
    fn other_top_level_keys_are_replaced_wholesale() {
        let base = json!({
            "Command": {"Name": "glueetl", "PythonVersion": "3"},
            "NumberOfWorkers": 2
        });
        let merged = merge_override(&base, &json!({"Command": {"Name": "pythonshell"}})).unwrap();
        assert_eq!(merged["Command"], json!({"Name": "pythonshell"}));
        assert_eq!(merged["NumberOfWorkers"], json!(2));
    }

    #[test]
    fn merge_does_not_touch_base() {
        let base = json!({"DefaultArguments": {"--a": "1"}});
        let _ = merge_override(&base, &json!({"DefaultArguments": {"--a": "2"}})).unwrap();
        assert_eq!(base["DefaultArguments"]["--a"], json!("1"));
    }

    #[test]
    fn no_overrides_yields_exactly_the_base() {
        let base = json!({"Name": "etl", "DefaultArguments": {"--a": "1"}});
        let docs = expand(&base, &[], &computed()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["Name"], json!("etl"));
        assert_eq!(docs[0]["DefaultArguments"], json!({"--a": "1"}));
        assert_eq!(
            docs[0]["Command"]["ScriptLocation"],
            json!(computed().script_location)
        );
    }

    #[test]
    fn one_document_per_override_in_order() {
        let base = json!({"Name": "etl", "DefaultArguments": {"--env": "dev"}});
        let overrides = vec![
            json!({"Name": "etl_eu", "DefaultArguments": {"--region": "eu"}}),
            json!({"Name": "etl_us", "DefaultArguments": {"--region": "us"}}),
        ];
        let docs = expand(&base, &overrides, &computed()).unwrap();
        let names: Vec<_> = docs.iter().map(|d| d["Name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["etl_eu", "etl_us"]);
        assert_eq!(docs[1]["DefaultArguments"]["--env"], json!("dev"));
        assert_eq!(docs[1]["DefaultArguments"]["--region"], json!("us"));
    }

    #[test]
    fn computed_paths_extend_user_declared_values() {
        let base = json!({
            "Name": "etl",
            "DefaultArguments": {"--extra-py-files": "s3://other/lib.zip"}
        });
        let fields = ComputedFields {
            extra_py_files: vec!["s3://lake/a.py".to_string(), "s3://lake/utils.zip".to_string()],
            extra_jars: vec!["s3://lake/x.jar".to_string()],
            ..computed()
        };
        let docs = expand(&base, &[], &fields).unwrap();
        assert_eq!(
            docs[0]["DefaultArguments"]["--extra-py-files"],
            json!("s3://other/lib.zip,s3://lake/a.py,s3://lake/utils.zip")
        );
        assert_eq!(docs[0]["DefaultArguments"]["--extra-jars"], json!("s3://lake/x.jar"));
    }

    #[test]
    fn override_cannot_drop_computed_extra_files() {
        let base = json!({"Name": "etl", "DefaultArguments": {}});
        let overrides = vec![json!({
            "Name": "etl_2",
            "DefaultArguments": {"--extra-py-files": ""}
        })];
        let fields = ComputedFields {
            extra_py_files: vec!["s3://lake/utils.zip".to_string()],
            ..computed()
        };
        let docs = expand(&base, &overrides, &fields).unwrap();
        assert_eq!(
            docs[0]["DefaultArguments"]["--extra-py-files"],
            json!("s3://lake/utils.zip")
        );
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = expand(&json!({"DefaultArguments": {}}), &[], &computed()).unwrap_err();
        assert!(err.to_string().contains("Name is required"), "got: {err}");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let base = json!({"Name": "etl"});
        let overrides = vec![json!({"NumberOfWorkers": 4}), json!({"NumberOfWorkers": 8})];
        let err = expand(&base, &overrides, &computed()).unwrap_err();
        assert!(matches!(err, RenderError::DuplicateJobName(ref n) if n == "etl"));
    }

    #[test]
    fn non_mapping_override_reports_its_position() {
        let err = expand(
            &json!({"Name": "etl"}),
            &[json!({"Name": "a"}), json!("oops")],
            &computed(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("override #2"), "got: {err}");
    }
}
