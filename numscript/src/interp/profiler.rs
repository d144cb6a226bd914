//! Call counting and timing of user functions and operators

use crate::value::{StructValue, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FunctionStats {
    pub calls: usize,
    pub total: Duration,
}

#[derive(Debug, Default)]
pub struct Profiler {
    enabled: bool,
    stats: BTreeMap<String, FunctionStats>,
    active: Vec<(String, Instant)>,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `profile on`: start collecting from scratch
    pub fn start(&mut self) {
        self.clear();
        self.enabled = true;
    }

    /// `profile resume`: keep collected data
    pub fn resume(&mut self) {
        self.enabled = true;
    }

    pub fn stop(&mut self) {
        self.enabled = false;
        self.active.clear();
    }

    pub fn clear(&mut self) {
        self.stats.clear();
        self.active.clear();
    }

    pub fn enter(&mut self, name: &str) {
        if self.enabled {
            self.active.push((name.to_string(), Instant::now()));
        }
    }

    pub fn exit(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        let Some(pos) = self.active.iter().rposition(|(n, _)| n == name) else {
            return;
        };
        let (name, started) = self.active.remove(pos);
        let entry = self.stats.entry(name).or_default();
        entry.calls += 1;
        entry.total += started.elapsed();
    }

    pub fn stats(&self, name: &str) -> Option<FunctionStats> {
        self.stats.get(name).copied()
    }

    /// `profile("info")`: struct with a `FunctionTable` cell of per-entry structs
    pub fn info(&self) -> Value {
        let rows: Vec<Value> = self
            .stats
            .iter()
            .map(|(name, s)| {
                Value::from(StructValue::from_iter([
                    ("FunctionName", Value::string(name)),
                    ("TotalTime", Value::scalar(s.total.as_secs_f64())),
                    ("NumCalls", Value::scalar(s.calls as f64)),
                ]))
            })
            .collect();
        let mut info = StructValue::new();
        info.set("FunctionTable", Value::cell_row(rows));
        info.set("Running", Value::from(self.enabled));
        Value::from(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_records_nothing() {
        let mut p = Profiler::new();
        p.enter("f");
        p.exit("f");
        assert!(p.stats("f").is_none());
    }

    #[test]
    fn test_counts_nested_calls() {
        let mut p = Profiler::new();
        p.start();
        p.enter("f");
        p.enter("g");
        p.exit("g");
        p.enter("g");
        p.exit("g");
        p.exit("f");
        assert_eq!(p.stats("g").unwrap().calls, 2);
        assert_eq!(p.stats("f").unwrap().calls, 1);
    }

    #[test]
    fn test_resume_keeps_data_and_on_clears() {
        let mut p = Profiler::new();
        p.start();
        p.enter("f");
        p.exit("f");
        p.stop();
        p.resume();
        assert!(p.stats("f").is_some());
        p.start();
        assert!(p.stats("f").is_none());
    }

    #[test]
    fn test_info_shape() {
        let mut p = Profiler::new();
        p.start();
        p.enter("f");
        p.exit("f");
        let info = p.info();
        let table = info.field("FunctionTable").unwrap();
        assert_eq!(table.numel(), 1);
    }
}
