//! Variable substitution in step fields
//!
//! Supported forms:
//!
//! - `$(params.<name>)` and, as a whole argument, `$(params.<name>[*])`
//! - `$(workspaces.<name>.path)`
//! - `$(results.<name>.path)`
//! - `$(context.taskRun.name)` and `$(context.pipelineRun.name)`
//!
//! Anything else (for example `$(tasks.build.results.digest)`) is left as written.

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::{Error, Result};
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tektonic_resources::types::{Param, ParamSpec, ParamValue};

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\((params|workspaces|results|context)\.([A-Za-z0-9_.-]+?)(\[\*\])?\)")
        .expect("static regex is valid")
});

/// Values available for substitution within one resource
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    params: HashMap<String, ParamValue>,
    workspaces: HashMap<String, String>,
    results: HashMap<String, String>,
    context: HashMap<String, String>,
}

impl Substitutions {
    /// Create an empty substitution table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from resolved param values
    #[must_use]
    pub fn with_params(params: HashMap<String, ParamValue>) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Set the mount path reported for a workspace
    pub fn set_workspace_path(&mut self, name: &str, path: impl Into<String>) {
        self.workspaces.insert(name.to_string(), path.into());
    }

    /// Set the file path reported for a result
    pub fn set_result_path(&mut self, name: &str, path: impl Into<String>) {
        self.results.insert(name.to_string(), path.into());
    }

    /// Set a `context.*` value, e.g. `taskRun.name`
    pub fn set_context(&mut self, key: &str, value: impl Into<String>) {
        self.context.insert(key.to_string(), value.into());
    }

    /// Substitute every variable in `input`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a reference to an unknown param,
    /// workspace or result, or for an array param used inside a string.
    pub fn apply(&self, input: &str) -> Result<String> {
        let mut output = String::with_capacity(input.len());
        let mut last = 0;
        for caps in VARIABLE.captures_iter(input) {
            let Some(whole) = caps.get(0) else { continue };
            output.push_str(&input[last..whole.start()]);
            match self.lookup(&caps)? {
                Some(value) => output.push_str(&value),
                None => output.push_str(whole.as_str()),
            }
            last = whole.end();
        }
        output.push_str(&input[last..]);
        Ok(output)
    }

    /// Substitute into an argument list, expanding whole-argument
    /// `$(params.<name>[*])` references to one argument per array item.
    ///
    /// # Errors
    ///
    /// See [`Substitutions::apply`].
    pub fn expand_args(&self, args: &[String]) -> Result<Vec<String>> {
        let mut expanded = Vec::with_capacity(args.len());
        for arg in args {
            if let Some(items) = self.whole_array(arg)? {
                expanded.extend(items.iter().cloned());
            } else {
                expanded.push(self.apply(arg)?);
            }
        }
        Ok(expanded)
    }

    fn whole_array(&self, arg: &str) -> Result<Option<&Vec<String>>> {
        let Some(caps) = VARIABLE.captures(arg) else {
            return Ok(None);
        };
        let is_whole = caps.get(0).is_some_and(|m| m.as_str() == arg);
        if !is_whole || &caps[1] != "params" || caps.get(3).is_none() {
            return Ok(None);
        }
        match self.params.get(&caps[2]) {
            Some(ParamValue::Array(items)) => Ok(Some(items)),
            Some(ParamValue::String(_)) => Err(Error::validation(format!(
                "param '{}' is a string and cannot be expanded with [*]",
                &caps[2]
            ))),
            None => Err(unknown("param", &caps[2])),
        }
    }

    fn lookup(&self, caps: &Captures<'_>) -> Result<Option<String>> {
        let key = &caps[2];
        let star = caps.get(3).is_some();
        match &caps[1] {
            "params" => match self.params.get(key) {
                Some(ParamValue::String(value)) if !star => Ok(Some(value.clone())),
                Some(ParamValue::String(_)) => Err(Error::validation(format!(
                    "param '{key}' is a string and cannot be expanded with [*]"
                ))),
                Some(ParamValue::Array(_)) => Err(Error::validation(format!(
                    "array param '{key}' can only be used as a whole argument with [*]"
                ))),
                None => Err(unknown("param", key)),
            },
            "workspaces" => Self::path_of(&self.workspaces, "workspace", key),
            "results" => Self::path_of(&self.results, "result", key),
            "context" => Ok(self.context.get(key).cloned()),
            _ => Ok(None),
        }
    }

    fn path_of(
        table: &HashMap<String, String>,
        what: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let Some(name) = key.strip_suffix(".path") else {
            return Ok(None);
        };
        table
            .get(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| unknown(what, name))
    }
}

fn unknown(what: &str, name: &str) -> Error {
    Error::validation(format!("reference to undeclared {what} '{name}'"))
}

/// Replace or add param values from `overrides`.
#[must_use]
pub fn apply_overrides(params: &[Param], overrides: &BTreeMap<String, String>) -> Vec<Param> {
    let mut merged: Vec<Param> = params
        .iter()
        .filter(|p| !overrides.contains_key(&p.name))
        .cloned()
        .collect();
    merged.extend(overrides.iter().map(|(name, value)| Param {
        name: name.clone(),
        value: ParamValue::String(value.clone()),
    }));
    merged
}

/// Match supplied values against declarations.
///
/// Every declared param gets the supplied value or its default. Supplied
/// values for undeclared params are reported and dropped.
///
/// # Errors
///
/// Returns a validation error when a declared param has neither a value nor
/// a default, or when a value's shape contradicts the declared type.
pub fn resolve_params(
    resource: &str,
    declared: &[ParamSpec],
    supplied: &[Param],
    diagnostics: &dyn Diagnostics,
) -> Result<HashMap<String, ParamValue>> {
    for param in supplied {
        if !declared.iter().any(|d| d.name == param.name) {
            diagnostics.emit(DiagnosticEvent::UnusedParam {
                resource: resource.to_string(),
                param: param.name.clone(),
            });
        }
    }

    let mut resolved = HashMap::with_capacity(declared.len());
    for spec in declared {
        let value = supplied
            .iter()
            .rev()
            .find(|p| p.name == spec.name)
            .map(|p| p.value.clone())
            .or_else(|| spec.default.clone())
            .ok_or_else(|| {
                Error::validation(format!(
                    "param '{}' has no value and no default",
                    spec.name
                ))
            })?;

        match (spec.param_type.as_deref(), &value) {
            (Some("array"), ParamValue::String(_)) => {
                return Err(Error::validation(format!(
                    "param '{}' is declared as an array but was given a string",
                    spec.name
                )));
            }
            (Some("string"), ParamValue::Array(_)) => {
                return Err(Error::validation(format!(
                    "param '{}' is declared as a string but was given an array",
                    spec.name
                )));
            }
            _ => {}
        }
        resolved.insert(spec.name.clone(), value);
    }
    Ok(resolved)
}
