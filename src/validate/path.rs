//! Path validator
//!
//! Paths are kept as the strings given on the command line. File-system
//! steps (`check`, `ensure`, ...) are evaluated against the validator's
//! file-or-directory mode at validation time, so `directory()` may be set
//! before or after them.

use super::{Builder, Common, Flow, Rule, StepTag, Value};
use std::fs::{self, OpenOptions};
use std::path::Path;

/// Sentinel meaning stdin or stdout
pub const STD_SENTINEL: &str = "-";

/// How `read()` replaces a validated path with the file's contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Parse the contents as JSON
    pub json: bool,
    /// Strip surrounding whitespace from the contents
    pub trim: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathRule {
    Exists(bool),
    ParentExists,
    Ensure,
    EnsureParent,
}

#[derive(Clone, Debug, Default)]
pub struct PathValidator {
    common: Common,
    directory: bool,
    allow_std: bool,
    read: Option<ReadOptions>,
}

impl PathValidator {
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Directory semantics instead of file semantics
    pub fn directory(mut self, directory: bool) -> Self {
        self.directory = directory;
        self
    }

    /// Accept `-` for stdin/stdout (never for directories)
    pub fn allow_std(mut self, allow: bool) -> Self {
        self.allow_std = allow;
        self
    }

    /// Require the path to exist (`true`) or to be absent (`false`)
    pub fn check(mut self, should_exist: bool) -> Self {
        self.common
            .add_step(StepTag::CheckPath, Rule::Path(PathRule::Exists(should_exist)));
        self
    }

    /// Require the parent directory to exist
    pub fn check_parent(mut self) -> Self {
        self.common
            .add_step(StepTag::CheckParentDir, Rule::Path(PathRule::ParentExists));
        self
    }

    /// Create the directory, or the file along with its parent directories
    pub fn ensure(mut self) -> Self {
        self.common
            .add_step(StepTag::EnsurePath, Rule::Path(PathRule::Ensure));
        self
    }

    /// Create the parent directories
    pub fn ensure_parent(mut self) -> Self {
        self.common
            .add_step(StepTag::EnsureParentDir, Rule::Path(PathRule::EnsureParent));
        self
    }

    /// Replace the value with the file contents once validation passed
    pub fn read(mut self, options: ReadOptions) -> Self {
        self.read = Some(options);
        self
    }

    pub fn is_directory(&self) -> bool {
        self.directory
    }

    pub fn allows_std(&self) -> bool {
        self.allow_std
    }

    pub(crate) fn is_std_sentinel(&self, value: &Value) -> bool {
        self.allow_std && !self.directory && value.as_str() == Some(STD_SENTINEL)
    }

    pub(crate) fn parse(&self, text: &str) -> Result<Value, String> {
        if text.is_empty() {
            return Err("expected a path".to_string());
        }
        if text == STD_SENTINEL && self.directory {
            return Err("a directory cannot be '-'".to_string());
        }
        Ok(Value::String(text.to_string()))
    }

    pub(crate) fn apply_rule(&self, rule: &PathRule, value: &Value) -> Result<Flow, String> {
        let raw = value.as_str().unwrap_or_default();
        let path = Path::new(raw);
        let kind = if self.directory { "directory" } else { "file" };
        match rule {
            PathRule::Exists(true) => {
                let ok = if self.directory {
                    path.is_dir()
                } else {
                    path.is_file()
                };
                if ok {
                    Ok(Flow::Continue)
                } else {
                    Err(format!("{} does not exist", kind))
                }
            }
            PathRule::Exists(false) => {
                if path.exists() {
                    Err(format!("{} already exists", kind))
                } else {
                    Ok(Flow::Continue)
                }
            }
            PathRule::ParentExists => {
                if parent_of(path).is_dir() {
                    Ok(Flow::Continue)
                } else {
                    Err("parent directory does not exist".to_string())
                }
            }
            PathRule::Ensure => {
                if self.directory {
                    fs::create_dir_all(path)
                        .map_err(|e| format!("cannot create directory: {}", e))?;
                } else {
                    fs::create_dir_all(parent_of(path))
                        .map_err(|e| format!("cannot create parent directory: {}", e))?;
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .map_err(|e| format!("cannot create file: {}", e))?;
                }
                Ok(Flow::Continue)
            }
            PathRule::EnsureParent => {
                fs::create_dir_all(parent_of(path))
                    .map_err(|e| format!("cannot create parent directory: {}", e))?;
                Ok(Flow::Continue)
            }
        }
    }

    pub(crate) fn read_contents(&self, value: Value) -> Result<Value, String> {
        let Some(options) = self.read else {
            return Ok(value);
        };
        if self.directory {
            return Err("a directory cannot be read".to_string());
        }
        let raw = value.as_str().unwrap_or_default();
        let contents =
            fs::read_to_string(raw).map_err(|e| format!("cannot read file: {}", e))?;
        let contents = if options.trim {
            contents.trim().to_string()
        } else {
            contents
        };
        if options.json {
            serde_json::from_str(&contents)
                .map(Value::Json)
                .map_err(|e| format!("invalid JSON: {}", e))
        } else {
            Ok(Value::String(contents))
        }
    }
}

fn parent_of(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

impl Builder for PathValidator {
    fn common(&self) -> &Common {
        &self.common
    }

    fn common_mut(&mut self) -> &mut Common {
        &mut self.common
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Validator;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn check(v: PathValidator, raw: &str) -> Result<Option<Value>, String> {
        Validator::from(v)
            .validate(Some(raw), "--path", &HashMap::new())
            .map_err(|e| e.to_string())
    }

    #[test]
    fn test_new_starts_as_plain_file() {
        let v = PathValidator::new();
        assert!(!v.is_directory());
        assert!(!v.allows_std());

        let got = Validator::from(PathValidator::new().default("out.txt"))
            .validate(None, "--path", &HashMap::new())
            .unwrap();
        assert_eq!(got, Some(Value::from("out.txt")));
    }

    #[test]
    fn test_check_exists_file_vs_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();
        let dir_str = dir.path().to_str().unwrap();
        let file_str = file.to_str().unwrap();

        assert!(check(PathValidator::new().check(true), file_str).is_ok());
        assert!(check(PathValidator::new().check(true), dir_str).is_err());
        assert!(check(PathValidator::new().directory(true).check(true), dir_str).is_ok());
        assert!(check(PathValidator::new().check(false), file_str)
            .unwrap_err()
            .contains("already exists"));
    }

    #[test]
    fn test_directory_flag_applies_late() {
        let dir = TempDir::new().unwrap();
        let dir_str = dir.path().to_str().unwrap();
        assert!(check(PathValidator::new().check(true).directory(true), dir_str).is_ok());
    }

    #[test]
    fn test_ensure_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a/b/c.txt");
        check(PathValidator::new().ensure(), file.to_str().unwrap()).unwrap();
        assert!(file.is_file());
    }

    #[test]
    fn test_ensure_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x/y");
        check(PathValidator::new().directory(true).ensure(), target.to_str().unwrap()).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_check_and_ensure_parent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("missing/out.txt");
        let file_str = file.to_str().unwrap();
        assert!(check(PathValidator::new().check_parent(), file_str).is_err());
        assert!(check(PathValidator::new().ensure_parent().check_parent(), file_str).is_ok());
        assert!(file.parent().unwrap().is_dir());
        assert!(!file.exists());
    }

    #[test]
    fn test_std_sentinel_skips_constraints() {
        let v = PathValidator::new().allow_std(true).check(true).read(ReadOptions {
            json: true,
            trim: false,
        });
        assert_eq!(check(v, "-").unwrap(), Some(Value::from("-")));
    }

    #[test]
    fn test_directory_never_std() {
        let v = PathValidator::new().directory(true).allow_std(true);
        assert!(check(v, "-").unwrap_err().contains("cannot be '-'"));
    }

    #[test]
    fn test_read_contents() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.json");
        fs::write(&file, " {\"a\": 1}\n").unwrap();
        let file_str = file.to_str().unwrap();

        let text = check(
            PathValidator::new().read(ReadOptions {
                json: false,
                trim: true,
            }),
            file_str,
        )
        .unwrap();
        assert_eq!(text, Some(Value::from("{\"a\": 1}")));

        let json = check(
            PathValidator::new().read(ReadOptions {
                json: true,
                trim: false,
            }),
            file_str,
        )
        .unwrap();
        assert_eq!(json, Some(Value::Json(serde_json::json!({"a": 1}))));
    }
}
