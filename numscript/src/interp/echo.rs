//! Echoing of executed source lines
//!
//! `echo` controls which code is printed, prefixed by `PS4`, as it runs.
//! Scripts and functions are switched independently; with `echo on all`
//! every function echoes unless it was turned off by name.

use bitflags::bitflags;
use std::collections::HashMap;
use std::path::Path;

bitflags! {
    /// What kinds of code echo
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct EchoMode: u32 {
        const SCRIPTS = 1 << 0;
        const FUNCTIONS = 1 << 1;
        const ALL = 1 << 2;
    }
}

/// Absolute path of the code's file, or its name when it has none
pub fn file_key(file: Option<&Path>, name: &str) -> String {
    match file {
        Some(path) => std::path::absolute(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string(),
        None => name.to_string(),
    }
}

/// Echo settings plus the position reached in the file being echoed
#[derive(Debug, Default)]
pub struct EchoState {
    pub mode: EchoMode,
    /// Overrides set with `echo FCN on|off`, keyed by [`file_key`]
    files: HashMap<String, bool>,
    /// Whether code currently executing echoes
    pub active: bool,
    pub file_name: String,
    /// First line not yet echoed
    pub file_pos: usize,
}

impl EchoState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state from the `echo` setting
    pub fn from_setting(setting: &str) -> Self {
        let mode = match setting {
            "on" | "scripts" => EchoMode::SCRIPTS,
            "functions" => EchoMode::FUNCTIONS,
            "all" => EchoMode::all(),
            _ => EchoMode::empty(),
        };
        EchoState {
            mode,
            ..Self::default()
        }
    }

    /// Apply `echo` with the given words; returns an error message for bad usage
    pub fn command(&mut self, args: &[String]) -> Result<(), String> {
        match args {
            [] => {
                if self.mode.intersects(EchoMode::SCRIPTS | EchoMode::FUNCTIONS) {
                    self.off_all();
                } else {
                    self.mode = EchoMode::SCRIPTS;
                }
            }
            [arg] => match arg.as_str() {
                "on" => self.mode = EchoMode::SCRIPTS,
                "off" => self.mode = EchoMode::empty(),
                file => {
                    if self.mode.contains(EchoMode::ALL) {
                        self.files.insert(file.to_string(), false);
                    } else if let Some(flag) = self.files.get_mut(file) {
                        *flag = !*flag;
                    } else {
                        self.files.insert(file.to_string(), true);
                        self.mode |= EchoMode::FUNCTIONS;
                    }
                }
            },
            [a, b] => match (a.as_str(), b.as_str()) {
                ("on", "all") => {
                    self.mode = EchoMode::all();
                    self.files.clear();
                }
                ("off", "all") => self.off_all(),
                (file, "on") => {
                    self.files.insert(file.to_string(), true);
                    self.mode |= EchoMode::FUNCTIONS;
                }
                (file, "off") => {
                    self.files.insert(file.to_string(), false);
                }
                _ => return Err("Invalid call to echo".to_string()),
            },
            _ => return Err("Invalid call to echo".to_string()),
        }
        tracing::debug!(mode = ?self.mode, "echo state changed");
        Ok(())
    }

    fn off_all(&mut self) {
        self.mode = EchoMode::empty();
        self.files.clear();
    }

    /// Whether code of `kind` (SCRIPTS or FUNCTIONS) from `file` echoes
    pub fn echo_this_file(&self, file: &str, kind: EchoMode) -> bool {
        if kind == EchoMode::SCRIPTS {
            return self.mode.contains(EchoMode::SCRIPTS);
        }
        if !self.mode.contains(EchoMode::FUNCTIONS) {
            return false;
        }
        match self.files.get(file) {
            Some(&flag) => flag,
            None => self.mode.contains(EchoMode::ALL),
        }
    }

    /// Enter code of `kind` from `file`, echoing from line `pos`
    pub fn enter(&mut self, kind: EchoMode, file: &str, pos: usize) {
        self.active = self.echo_this_file(file, kind);
        self.file_name = file.to_string();
        self.file_pos = pos;
    }

    /// Saved (active, file, position), for restoring on exit from a call
    pub fn snapshot(&self) -> (bool, String, usize) {
        (self.active, self.file_name.clone(), self.file_pos)
    }

    pub fn restore(&mut self, (active, file_name, file_pos): (bool, String, usize)) {
        self.active = active;
        self.file_name = file_name;
        self.file_pos = file_pos;
    }

    /// Lines `file_pos..=line` of `source`, each prefixed with `prefix`
    pub fn render_lines(&self, source: &str, line: usize, prefix: &str) -> String {
        if line < self.file_pos {
            return String::new();
        }
        source
            .lines()
            .skip(self.file_pos.saturating_sub(1))
            .take(line + 1 - self.file_pos.max(1))
            .map(|l| format!("{prefix}{l}\n"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_toggle() {
        let mut echo = EchoState::new();
        echo.command(&[]).unwrap();
        assert_eq!(echo.mode, EchoMode::SCRIPTS);
        echo.command(&[]).unwrap();
        assert!(echo.mode.is_empty());
    }

    #[test]
    fn test_scripts_only() {
        let mut echo = EchoState::new();
        echo.command(&words(&["on"])).unwrap();
        assert!(echo.echo_this_file("s.m", EchoMode::SCRIPTS));
        assert!(!echo.echo_this_file("f.m", EchoMode::FUNCTIONS));
    }

    #[test]
    fn test_on_all_with_file_exception() {
        let mut echo = EchoState::new();
        echo.command(&words(&["on", "all"])).unwrap();
        echo.command(&words(&["f.m"])).unwrap();
        assert!(!echo.echo_this_file("f.m", EchoMode::FUNCTIONS));
        assert!(echo.echo_this_file("g.m", EchoMode::FUNCTIONS));
    }

    #[test]
    fn test_named_function_toggles() {
        let mut echo = EchoState::new();
        echo.command(&words(&["f.m"])).unwrap();
        assert!(echo.mode.contains(EchoMode::FUNCTIONS));
        assert!(echo.echo_this_file("f.m", EchoMode::FUNCTIONS));
        assert!(!echo.echo_this_file("g.m", EchoMode::FUNCTIONS));
        echo.command(&words(&["f.m"])).unwrap();
        assert!(!echo.echo_this_file("f.m", EchoMode::FUNCTIONS));
        echo.command(&words(&["f.m", "on"])).unwrap();
        assert!(echo.echo_this_file("f.m", EchoMode::FUNCTIONS));
    }

    #[test]
    fn test_render_lines_from_position() {
        let mut echo = EchoState::new();
        echo.file_pos = 2;
        let out = echo.render_lines("a\nb\nc\nd\n", 3, "+ ");
        assert_eq!(out, "+ b\n+ c\n");
        echo.file_pos = 4;
        assert_eq!(echo.render_lines("a\nb\nc\nd\n", 3, "+ "), "");
    }

    #[test]
    fn test_bad_usage() {
        let mut echo = EchoState::new();
        assert!(echo.command(&words(&["a", "b", "c"])).is_err());
    }
}
