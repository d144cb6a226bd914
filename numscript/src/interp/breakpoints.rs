//! Breakpoint table: function name to breakpoint lines with optional conditions

use crate::ast::{StatementList, first_statement_line_from};
use std::collections::{BTreeMap, HashMap};

/// One active breakpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub line: usize,
    /// Expression evaluated in the paused frame; stops only when true
    pub condition: Option<String>,
}

#[derive(Debug, Default)]
pub struct BreakpointTable {
    points: HashMap<String, BTreeMap<usize, Option<String>>>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a breakpoint at the first executable line at or after `line`
    pub fn add(
        &mut self,
        name: &str,
        body: &StatementList,
        line: usize,
        condition: Option<String>,
    ) -> Option<usize> {
        let actual = first_statement_line_from(body, line)?;
        self.points
            .entry(name.to_string())
            .or_default()
            .insert(actual, condition);
        tracing::debug!(name, line = actual, "breakpoint set");
        Some(actual)
    }

    pub fn remove(&mut self, name: &str, line: usize) -> bool {
        let Some(lines) = self.points.get_mut(name) else {
            return false;
        };
        let removed = lines.remove(&line).is_some();
        if lines.is_empty() {
            self.points.remove(name);
        }
        removed
    }

    pub fn remove_all_in(&mut self, name: &str) -> usize {
        self.points.remove(name).map_or(0, |lines| lines.len())
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn have_breakpoints(&self) -> bool {
        !self.points.is_empty()
    }

    /// Breakpoint on `line` of `name`, if any
    pub fn get(&self, name: &str, line: usize) -> Option<Breakpoint> {
        let condition = self.points.get(name)?.get(&line)?;
        Some(Breakpoint {
            line,
            condition: condition.clone(),
        })
    }

    pub fn lines(&self, name: &str) -> Vec<usize> {
        self.points
            .get(name)
            .map(|lines| lines.keys().copied().collect())
            .unwrap_or_default()
    }

    /// All breakpoints sorted by function name
    pub fn list(&self) -> Vec<(String, Vec<Breakpoint>)> {
        let mut names: Vec<&String> = self.points.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let bps = self.points[name]
                    .iter()
                    .map(|(&line, condition)| Breakpoint {
                        line,
                        condition: condition.clone(),
                    })
                    .collect();
                (name.clone(), bps)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn body() -> StatementList {
        parse("a = 1;\n\nb = 2;\nc = 3;\n").unwrap()
    }

    #[test]
    fn test_add_snaps_to_next_statement() {
        let mut table = BreakpointTable::new();
        assert_eq!(table.add("f", &body(), 2, None), Some(3));
        assert!(table.get("f", 3).is_some());
        assert!(table.get("f", 2).is_none());
        assert!(table.have_breakpoints());
    }

    #[test]
    fn test_add_past_end_fails() {
        let mut table = BreakpointTable::new();
        assert_eq!(table.add("f", &body(), 10, None), None);
        assert!(!table.have_breakpoints());
    }

    #[test]
    fn test_remove_and_list() {
        let mut table = BreakpointTable::new();
        table.add("g", &body(), 1, Some("a > 0".into()));
        table.add("f", &body(), 4, None);
        let listed = table.list();
        assert_eq!(listed[0].0, "f");
        assert_eq!(listed[1].1[0].condition.as_deref(), Some("a > 0"));
        assert!(table.remove("g", 1));
        assert_eq!(table.lines("g"), Vec::<usize>::new());
        assert_eq!(table.remove_all_in("f"), 1);
    }
}
