//! Interpreter settings and the get/set/"local" protocol of internal variables

use super::error::{EvalResult, ExecutionError};
use super::Interpreter;
use crate::value::{Value, ValueList};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings file problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Interpreter settings, loadable from TOML
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_recursion_depth: usize,
    pub silent_functions: bool,
    pub string_fill_char: char,
    pub ps4: String,
    /// `off`, `on` (scripts), `functions` or `all`
    pub echo: String,
    pub print_empty_dimensions: bool,
    /// Directories searched for `<name>.m`
    pub path: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_recursion_depth: 256,
            silent_functions: false,
            string_fill_char: ' ',
            ps4: "+ ".to_string(),
            echo: "off".to_string(),
            print_empty_dimensions: true,
            path: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Internal variables that follow the knob protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knob {
    MaxRecursionDepth,
    SilentFunctions,
    StringFillChar,
    Ps4,
    PrintEmptyDimensions,
}

impl Knob {
    pub fn name(self) -> &'static str {
        match self {
            Knob::MaxRecursionDepth => "max_recursion_depth",
            Knob::SilentFunctions => "silent_functions",
            Knob::StringFillChar => "string_fill_char",
            Knob::Ps4 => "PS4",
            Knob::PrintEmptyDimensions => "print_empty_dimensions",
        }
    }
}

/// Saved value of a knob, replayed when a frame that changed it locally is popped
#[derive(Debug, Clone)]
pub struct KnobRestore {
    pub knob: Knob,
    pub value: Value,
}

impl Interpreter {
    pub(crate) fn knob_value(&self, knob: Knob) -> Value {
        let s = &self.settings;
        match knob {
            Knob::MaxRecursionDepth => Value::scalar(s.max_recursion_depth as f64),
            Knob::SilentFunctions => Value::from(s.silent_functions),
            Knob::StringFillChar => Value::string(&s.string_fill_char.to_string()),
            Knob::Ps4 => Value::string(&s.ps4),
            Knob::PrintEmptyDimensions => Value::from(s.print_empty_dimensions),
        }
    }

    pub(crate) fn set_knob(&mut self, knob: Knob, value: &Value) -> EvalResult<()> {
        let name = knob.name();
        match knob {
            Knob::MaxRecursionDepth => {
                let n = value
                    .index_value()
                    .map_err(|_| ExecutionError::general(format!("{name}: argument must be a non-negative integer")))?;
                self.settings.max_recursion_depth = n;
            }
            Knob::SilentFunctions => {
                self.settings.silent_functions = value
                    .is_true()
                    .map_err(|_| ExecutionError::general(format!("{name}: argument must be a logical value")))?;
            }
            Knob::PrintEmptyDimensions => {
                self.settings.print_empty_dimensions = value
                    .is_true()
                    .map_err(|_| ExecutionError::general(format!("{name}: argument must be a logical value")))?;
            }
            Knob::StringFillChar => {
                let s = value
                    .as_string()
                    .ok_or_else(|| ExecutionError::general(format!("{name}: argument must be a single character")))?;
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => self.settings.string_fill_char = c,
                    _ => {
                        return Err(ExecutionError::general(format!(
                            "{name}: argument must be a single character"
                        ))
                        .into());
                    }
                }
            }
            Knob::Ps4 => {
                self.settings.ps4 = value
                    .as_string()
                    .ok_or_else(|| ExecutionError::general(format!("{name}: argument must be a string")))?;
            }
        }
        tracing::debug!(knob = name, "internal variable changed");
        Ok(())
    }

    /// `knob()`, `old = knob(new)`, `knob(new, "local")`
    pub(crate) fn set_internal_variable(
        &mut self,
        knob: Knob,
        args: &[Value],
        nargout: usize,
    ) -> EvalResult<ValueList> {
        let name = knob.name();
        if args.len() > 2 {
            return Err(ExecutionError::general(format!("Invalid call to {name}")).into());
        }
        let old = self.knob_value(knob);
        let Some(new) = args.first() else {
            return Ok(vec![old]);
        };

        if let Some(opt) = args.get(1) {
            if opt.as_string().as_deref() != Some("local") {
                return Err(ExecutionError::general(format!(
                    "{name}: second argument must be \"local\""
                ))
                .into());
            }
            if self.call_stack.at_top_level() {
                return Err(ExecutionError::general(format!(
                    "{name}: \"local\" has no meaning at the top level"
                ))
                .into());
            }
            self.call_stack.current_frame_mut().knob_restores.push(KnobRestore {
                knob,
                value: old.clone(),
            });
        }

        self.set_knob(knob, new)?;
        Ok(if nargout > 0 { vec![old] } else { Vec::new() })
    }

    /// Undo "local" changes recorded on a popped frame, newest first
    pub(crate) fn restore_knobs(&mut self, restores: Vec<KnobRestore>) {
        for r in restores.into_iter().rev() {
            // values were read from the knob itself, so they always convert back
            let _ = self.set_knob(r.knob, &r.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.max_recursion_depth, 256);
        assert_eq!(s.ps4, "+ ");
        assert_eq!(s.string_fill_char, ' ');
        assert!(!s.silent_functions);
    }

    #[test]
    fn test_from_toml_partial() {
        let s = Settings::from_toml_str("max_recursion_depth = 16\nps4 = \">> \"\n").unwrap();
        assert_eq!(s.max_recursion_depth, 16);
        assert_eq!(s.ps4, ">> ");
        assert!(s.print_empty_dimensions);
    }

    #[test]
    fn test_from_toml_rejects_bad_type() {
        assert!(Settings::from_toml_str("silent_functions = \"yes\"").is_err());
    }

    #[test]
    fn test_knob_query_and_set() {
        let mut interp = Interpreter::new();
        let old = interp
            .set_internal_variable(Knob::MaxRecursionDepth, &[Value::scalar(10.0)], 1)
            .unwrap();
        assert_eq!(old[0].scalar_value().unwrap(), 256.0);
        assert_eq!(interp.settings.max_recursion_depth, 10);
    }

    #[test]
    fn test_local_at_top_level_is_error() {
        let mut interp = Interpreter::new();
        let err = interp
            .set_internal_variable(
                Knob::SilentFunctions,
                &[Value::from(true), Value::string("local")],
                0,
            )
            .unwrap_err();
        assert!(err.to_string().contains("\"local\" has no meaning at the top level"));
    }
}
