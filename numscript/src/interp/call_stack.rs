//! Activation frames, workspaces and global variables

use super::config::KnobRestore;
use super::error::ExecutionError;
use super::symtab::{UserFunction, UserScript};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

pub type WorkspaceRef = Rc<RefCell<Workspace>>;

/// Variable bindings of a function activation; scripts share their caller's
#[derive(Debug, Default)]
pub struct Workspace {
    vars: HashMap<String, Value>,
    global_names: HashSet<String>,
    persistent_names: HashSet<String>,
    /// Storage of the function that owns this workspace
    persistent: Option<Rc<RefCell<HashMap<String, Value>>>>,
    pub nargin: Option<usize>,
    pub nargout: Option<usize>,
    /// Output positions the caller discards with `~`
    pub ignored: Vec<bool>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_function(persistent: Rc<RefCell<HashMap<String, Value>>>) -> Self {
        Workspace {
            persistent: Some(persistent),
            ..Self::default()
        }
    }

    pub fn into_ref(self) -> WorkspaceRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.global_names.contains(name)
    }

    pub fn is_persistent(&self, name: &str) -> bool {
        self.persistent_names.contains(name)
    }
}

/// What a frame is executing
#[derive(Debug, Clone)]
pub enum FrameKind {
    Top,
    Function(Rc<UserFunction>),
    Script(Rc<UserScript>),
    Anonymous,
}

/// One activation
#[derive(Debug)]
pub struct Frame {
    pub kind: FrameKind,
    pub workspace: WorkspaceRef,
    pub line: usize,
    pub column: usize,
    /// Knobs changed with "local" inside this frame
    pub knob_restores: Vec<KnobRestore>,
    prev_current: usize,
}

impl Frame {
    pub fn new(kind: FrameKind, workspace: WorkspaceRef) -> Self {
        Frame {
            kind,
            workspace,
            line: 0,
            column: 0,
            knob_restores: Vec::new(),
            prev_current: 0,
        }
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            FrameKind::Top => "",
            FrameKind::Function(f) => &f.name,
            FrameKind::Script(s) => &s.name,
            FrameKind::Anonymous => "@<anonymous>",
        }
    }

    pub fn file(&self) -> Option<&Path> {
        match &self.kind {
            FrameKind::Function(f) => f.file.as_deref(),
            FrameKind::Script(s) => s.file.as_deref(),
            _ => None,
        }
    }

    /// Frames of functions and scripts, where statements carry locations
    pub fn is_user_code(&self) -> bool {
        matches!(self.kind, FrameKind::Function(_) | FrameKind::Script(_))
    }

    pub fn function(&self) -> Option<&Rc<UserFunction>> {
        match &self.kind {
            FrameKind::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// Stack of frames plus the global variable table
#[derive(Debug)]
pub struct CallStack {
    frames: Vec<Frame>,
    current: usize,
    globals: HashMap<String, Value>,
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: vec![Frame::new(FrameKind::Top, Workspace::new().into_ref())],
            current: 0,
            globals: HashMap::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.frames.len()
    }

    /// Push a frame and make it current, refusing beyond `max_depth` frames
    pub fn push(&mut self, mut frame: Frame, max_depth: usize) -> Result<(), ExecutionError> {
        if self.frames.len() >= max_depth {
            return Err(ExecutionError::recursion_limit());
        }
        frame.prev_current = self.current;
        tracing::trace!(name = frame.name(), depth = self.frames.len(), "push frame");
        self.frames.push(frame);
        self.current = self.frames.len() - 1;
        Ok(())
    }

    /// Pop the newest frame; the top-level frame is never popped
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() <= 1 {
            return None;
        }
        let frame = self.frames.pop()?;
        tracing::trace!(name = frame.name(), depth = self.frames.len(), "pop frame");
        self.current = frame.prev_current.min(self.frames.len() - 1);
        Some(frame)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_frame(&self) -> &Frame {
        &self.frames[self.current]
    }

    pub fn current_frame_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.current]
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn top_index(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn at_top_level(&self) -> bool {
        self.current == 0
    }

    /// Make `index` current and return the previous current index
    pub fn goto_frame(&mut self, index: usize) -> usize {
        let old = self.current;
        self.current = index.min(self.frames.len() - 1);
        old
    }

    pub fn restore_frame(&mut self, index: usize) {
        self.current = index.min(self.frames.len() - 1);
    }

    /// Nearest frame below the current one that runs user code or is the top level
    pub fn caller_index(&self) -> usize {
        (0..self.current)
            .rev()
            .find(|&i| i == 0 || self.frames[i].is_user_code())
            .unwrap_or(0)
    }

    /// Nearest user-code frame at or below `from`
    pub fn user_frame_at_or_below(&self, from: usize) -> Option<usize> {
        (1..=from.min(self.frames.len() - 1))
            .rev()
            .find(|&i| self.frames[i].is_user_code())
    }

    pub fn current_user_frame(&self) -> Option<&Frame> {
        self.user_frame_at_or_below(self.current).map(|i| &self.frames[i])
    }

    /// Move `delta` user-code frames from the current one; negative is toward the caller
    pub fn dbupdown(&mut self, delta: isize) -> usize {
        let user: Vec<usize> = (0..self.frames.len())
            .filter(|&i| i == 0 || self.frames[i].is_user_code())
            .collect();
        let here = user
            .iter()
            .rposition(|&i| i <= self.current)
            .unwrap_or(0) as isize;
        let target = (here + delta).clamp(0, user.len() as isize - 1) as usize;
        self.current = user[target];
        self.current
    }

    pub fn set_location(&mut self, line: usize, column: usize) {
        let frame = &mut self.frames[self.current];
        frame.line = line;
        frame.column = column;
    }

    pub fn current_line(&self) -> usize {
        self.current_frame().line
    }

    pub fn current_column(&self) -> usize {
        self.current_frame().column
    }

    /// Name, line and column of each user-code frame, innermost first
    pub fn backtrace(&self) -> Vec<(String, usize, usize)> {
        self.frames[1..=self.current]
            .iter()
            .rev()
            .filter(|f| f.is_user_code())
            .map(|f| (f.name().to_string(), f.line, f.column))
            .collect()
    }

    // ====================================================================
    // Variables of the current frame
    // ====================================================================

    pub fn varval(&self, name: &str) -> Option<Value> {
        let ws = self.current_frame().workspace.borrow();
        if ws.global_names.contains(name) {
            return self.globals.get(name).cloned();
        }
        if ws.persistent_names.contains(name) {
            return ws.persistent.as_ref()?.borrow().get(name).cloned();
        }
        ws.vars.get(name).cloned()
    }

    pub fn is_variable(&self, name: &str) -> bool {
        let ws = self.current_frame().workspace.borrow();
        if ws.global_names.contains(name) {
            return self.globals.contains_key(name);
        }
        if ws.persistent_names.contains(name) {
            return ws
                .persistent
                .as_ref()
                .is_some_and(|p| p.borrow().contains_key(name));
        }
        ws.vars.contains_key(name)
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        let workspace = Rc::clone(&self.current_frame().workspace);
        let mut ws = workspace.borrow_mut();
        if ws.global_names.contains(name) {
            self.globals.insert(name.to_string(), value);
        } else if ws.persistent_names.contains(name) {
            if let Some(p) = &ws.persistent {
                p.borrow_mut().insert(name.to_string(), value);
            }
        } else {
            ws.vars.insert(name.to_string(), value);
        }
    }

    pub fn clear_variable(&mut self, name: &str) -> bool {
        let workspace = Rc::clone(&self.current_frame().workspace);
        let mut ws = workspace.borrow_mut();
        let was_global = ws.global_names.remove(name);
        let was_persistent = ws.persistent_names.remove(name);
        ws.vars.remove(name).is_some() || was_global || was_persistent
    }

    pub fn clear_all_variables(&mut self) {
        let workspace = Rc::clone(&self.current_frame().workspace);
        let mut ws = workspace.borrow_mut();
        ws.vars.clear();
        ws.global_names.clear();
        ws.persistent_names.clear();
    }

    /// Sorted names visible in the current workspace
    pub fn variable_names(&self) -> Vec<String> {
        let ws = self.current_frame().workspace.borrow();
        let mut names: Vec<String> = ws
            .vars
            .keys()
            .cloned()
            .chain(ws.global_names.iter().filter(|n| self.globals.contains_key(*n)).cloned())
            .chain(ws.persistent_names.iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// `global name`: link the name in the current workspace to the global table
    pub fn make_global(&mut self, name: &str) {
        let workspace = Rc::clone(&self.current_frame().workspace);
        let mut ws = workspace.borrow_mut();
        ws.vars.remove(name);
        ws.global_names.insert(name.to_string());
    }

    /// `persistent name`; only meaningful in functions
    pub fn make_persistent(&mut self, name: &str) -> Result<(), ExecutionError> {
        let workspace = Rc::clone(&self.current_frame().workspace);
        let mut ws = workspace.borrow_mut();
        if ws.persistent.is_none() {
            return Err(ExecutionError::general(
                "persistent: invalid use of persistent variable outside of a function",
            ));
        }
        ws.vars.remove(name);
        ws.persistent_names.insert(name.to_string());
        Ok(())
    }

    // ====================================================================
    // Globals
    // ====================================================================

    pub fn global_varval(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    pub fn global_assign(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn is_global_defined(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    pub fn clear_global(&mut self, name: &str) {
        self.globals.remove(name);
        for frame in &self.frames {
            frame.workspace.borrow_mut().global_names.remove(name);
        }
    }

    pub fn clear_all_globals(&mut self) {
        self.globals.clear();
        for frame in &self.frames {
            frame.workspace.borrow_mut().global_names.clear();
        }
    }

    pub fn global_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.globals.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anon_frame() -> Frame {
        Frame::new(FrameKind::Anonymous, Workspace::new().into_ref())
    }

    #[test]
    fn test_push_respects_depth_limit() {
        let mut cs = CallStack::new();
        cs.push(anon_frame(), 2).unwrap();
        let err = cs.push(anon_frame(), 2).unwrap_err();
        assert_eq!(err.message, "max_recursion_depth exceeded");
        assert_eq!(cs.size(), 2);
    }

    #[test]
    fn test_pop_restores_previous_current() {
        let mut cs = CallStack::new();
        cs.push(anon_frame(), 10).unwrap();
        cs.goto_frame(0);
        cs.push(anon_frame(), 10).unwrap();
        assert_eq!(cs.current_index(), 2);
        cs.pop();
        assert_eq!(cs.current_index(), 0);
        assert!(cs.pop().is_some());
        assert!(cs.pop().is_none());
    }

    #[test]
    fn test_variables_are_per_workspace() {
        let mut cs = CallStack::new();
        cs.assign("x", Value::scalar(1.0));
        cs.push(anon_frame(), 10).unwrap();
        assert!(!cs.is_variable("x"));
        cs.assign("x", Value::scalar(2.0));
        cs.pop();
        assert_eq!(cs.varval("x").unwrap().scalar_value().unwrap(), 1.0);
    }

    #[test]
    fn test_global_link() {
        let mut cs = CallStack::new();
        cs.make_global("g");
        cs.assign("g", Value::scalar(3.0));
        assert!(cs.is_global_defined("g"));
        cs.push(anon_frame(), 10).unwrap();
        assert!(!cs.is_variable("g"));
        cs.make_global("g");
        assert_eq!(cs.varval("g").unwrap().scalar_value().unwrap(), 3.0);
    }

    #[test]
    fn test_persistent_outside_function_is_error() {
        let mut cs = CallStack::new();
        assert!(cs.make_persistent("p").is_err());
    }
}
