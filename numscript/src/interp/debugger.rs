//! Breakpoint decisions and the nested debug prompt
//!
//! Pausing pushes a [`Debugger`] record and runs its read-eval loop against
//! the same interpreter. A pause inside that loop pushes another record, so
//! the stack of records mirrors the nesting of suspended evaluations. The
//! records carry their own exit and abort flags, which `dbcont` and
//! `dbquit` set; the record is popped by the next statement that runs.

use super::error::{EvalResult, Exception, ExecutionError};
use super::toplevel::Unit;
use super::{FrameKind, Interpreter};

pub const DEBUG_PROMPT: &str = "debug> ";

/// One active debug prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debugger {
    pub level: usize,
    pub in_repl: bool,
    pub exit_repl: bool,
    pub abort_repl: bool,
}

impl Debugger {
    fn new(level: usize) -> Self {
        Debugger {
            level,
            in_repl: false,
            exit_repl: false,
            abort_repl: false,
        }
    }
}

/// Pending `dbstep` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Off,
    /// `dbstep` / `dbstep N`: statements left in the debug frame
    Count(usize),
    /// `dbstep in`: stop at the next statement anywhere
    In,
    /// `dbstep out`: stop after the debug frame finishes
    Out,
}

#[derive(Debug, Default)]
pub(crate) struct DebugState {
    /// Statements consult the breakpoint logic only while this is set
    pub mode: bool,
    pub step: Step,
    /// Frame index the debugger considers current
    pub frame: usize,
    pub stack: Vec<Debugger>,
    /// Skip the "stopped in" banner on the next pause
    pub quiet: bool,
}

impl Interpreter {
    pub fn in_debug_repl(&self) -> bool {
        self.debug.stack.last().is_some_and(|d| d.in_repl)
    }

    pub fn debug_mode(&self) -> bool {
        self.debug.mode
    }

    pub fn debugger_depth(&self) -> usize {
        self.debug.stack.len()
    }

    pub(crate) fn reset_debug_state(&mut self) {
        self.debug.mode = self.breakpoints.have_breakpoints()
            || self.debug.step != Step::Off
            || self.in_debug_repl();
    }

    /// Forget debug prompts that were left through `dbcont`/`dbquit`
    /// without another statement running to pop them
    pub(crate) fn drop_finished_debuggers(&mut self) {
        while self
            .debug
            .stack
            .last()
            .is_some_and(|d| !d.in_repl && (d.exit_repl || d.abort_repl))
        {
            self.debug.stack.pop();
        }
    }

    /// Pop prompts nested above `idx` that typed code opened and
    /// `dbcont`/`dbquit` already ended; a quit one unwinds further
    fn pop_finished_above(&mut self, idx: usize) -> EvalResult<()> {
        while self.debug.stack.len() > idx + 1 {
            let Some(top) = self.debug.stack.last() else {
                break;
            };
            if top.in_repl {
                break;
            }
            if top.abort_repl {
                self.debug.stack.pop();
                tracing::debug!("leaving nested debugger (quit)");
                self.debug.mode = false;
                return Err(Exception::Interrupt);
            }
            if !top.exit_repl {
                break;
            }
            self.debug.stack.pop();
            tracing::debug!("leaving nested debugger (continue)");
            self.reset_debug_state();
        }
        Ok(())
    }

    /// Pause at the nearest user-code frame and run a debug prompt
    pub fn enter_debugger(&mut self, prompt: &str) -> EvalResult<()> {
        let saved = self.call_stack.current_index();
        let mut g = self.unwind(move |i| i.call_stack.restore_frame(saved));

        g.call_stack.dbupdown(0);
        let level = g.debug.stack.len();
        g.debug.frame = g.call_stack.current_index();
        g.debug.stack.push(Debugger::new(level));
        g.debug.mode = true;
        tracing::debug!(level, frame = g.debug.frame, "entering debugger");
        g.debugger_repl(level, prompt)
    }

    /// Whether the debugger record at `idx` should stop reading input
    fn debugger_done(&self, idx: usize) -> bool {
        match self.debug.stack.get(idx) {
            Some(d) => !d.in_repl || d.exit_repl || d.abort_repl || self.debug.step != Step::Off,
            None => true,
        }
    }

    fn debugger_repl(&mut self, idx: usize, prompt: &str) -> EvalResult<()> {
        let Some(level) = self.debug.stack.get(idx).map(|d| d.level) else {
            return Ok(());
        };
        let was_in_repl = self.debug.stack[idx].in_repl;
        let saved_frame = self.call_stack.current_index();
        let mut g = self.unwind(move |i| {
            if let Some(d) = i.debug.stack.get_mut(idx) {
                d.in_repl = was_in_repl;
            }
            i.call_stack.restore_frame(saved_frame);
        });
        g.debug.stack[idx].in_repl = true;

        let quiet = std::mem::take(&mut g.debug.quiet);
        let debug_frame = g.debug.frame;
        g.call_stack.goto_frame(debug_frame);
        if !quiet {
            let banner = g.stopped_in_message();
            g.write_err(&banner);
        }

        let prompt = if level > 0 {
            format!("[{level}]{prompt}")
        } else {
            prompt.to_string()
        };

        while !g.debugger_done(idx) {
            match g.read_unit(&prompt, "> ") {
                Unit::Eof | Unit::Interrupted => {
                    // end of input acts like dbcont
                    g.debug.step = Step::Off;
                    if let Some(d) = g.debug.stack.get_mut(idx) {
                        d.exit_repl = true;
                    }
                    break;
                }
                Unit::SyntaxError(report) => g.write_err(&report),
                Unit::Parsed(list, _) => {
                    let saved_typed = g.typed_code;
                    g.typed_code = true;
                    let result = g.exec_list(&list);
                    g.typed_code = saved_typed;
                    let debug_frame = g.debug.frame;
                    g.call_stack.goto_frame(debug_frame);
                    match result {
                        Ok(()) => {}
                        Err(Exception::Execution(e)) => {
                            let report = e.report();
                            g.write_err(&report);
                            g.errors.save_exception(&e);
                            g.errors.recover_from_exception();
                        }
                        Err(other) => return Err(other),
                    }
                    // flags set by typed code never leak into the paused frame
                    g.breaking = 0;
                    g.continuing = 0;
                    g.returning = 0;
                    g.pop_finished_above(idx)?;
                }
            }
        }
        Ok(())
    }

    /// `stopped in NAME at line L` plus the source line, for the current user frame
    pub(crate) fn stopped_in_message(&self) -> String {
        let Some(frame) = self.call_stack.current_user_frame() else {
            return "stopped at top level\n".to_string();
        };
        let line = frame.line;
        let mut msg = format!("stopped in {} at line {}\n", frame.name(), line);
        let source = match &frame.kind {
            FrameKind::Function(f) => f.source.clone(),
            FrameKind::Script(s) => s.source.clone(),
            _ => None,
        };
        if let Some(code) = source.as_deref().and_then(|s| s.lines().nth(line.wrapping_sub(1))) {
            msg.push_str(&format!("{line}: {}\n", code.trim_end()));
        }
        msg
    }

    /// Per-statement decision: stop at a breakpoint, continue stepping or run on
    pub(crate) fn do_breakpoint(&mut self, is_breakpoint: bool, is_end: bool) -> EvalResult<()> {
        if let Some(top) = self.debug.stack.last() {
            if top.exit_repl {
                self.debug.stack.pop();
                tracing::debug!("leaving debugger (continue)");
                self.reset_debug_state();
            } else if top.abort_repl {
                self.debug.stack.pop();
                tracing::debug!("leaving debugger (quit)");
                self.debug.mode = false;
                return Err(Exception::Interrupt);
            }
        }

        let current = self.call_stack.current_index();
        let mut break_here = false;

        if is_breakpoint {
            self.debug.step = Step::Off;
            return self.enter_debugger(DEBUG_PROMPT);
        }
        match self.debug.step {
            Step::Count(n) => {
                if current == self.debug.frame {
                    if n <= 1 || is_end {
                        break_here = true;
                    } else {
                        self.debug.step = Step::Count(n - 1);
                    }
                } else if n == 1 && current < self.debug.frame {
                    // stepped out of the end of a function
                    self.debug.frame = current;
                    break_here = true;
                }
            }
            Step::In => {
                break_here = true;
                self.debug.frame = current;
            }
            Step::Out => {
                if is_end && current == self.debug.frame {
                    self.debug.step = Step::In;
                }
            }
            Step::Off => {}
        }

        if break_here {
            self.debug.step = Step::Off;
            let Some(idx) = self.debug.stack.len().checked_sub(1) else {
                return Err(ExecutionError::general(
                    "internal error: dbstep without an active debugger!",
                )
                .into());
            };
            return self.debugger_repl(idx, DEBUG_PROMPT);
        }
        Ok(())
    }

    /// Breakpoint check for a statement of the current frame at `line`
    pub(crate) fn check_breakpoint(&mut self, line: usize, is_end: bool) -> EvalResult<()> {
        if !self.debug.mode || self.typed_code {
            return Ok(());
        }
        let frame = self.call_stack.current_frame();
        let is_bp = if frame.is_user_code() {
            let name = frame.name().to_string();
            match self.breakpoints.get(&name, line) {
                Some(bp) => match bp.condition {
                    Some(cond) => self.breakpoint_condition_holds(&cond),
                    None => true,
                },
                None => false,
            }
        } else {
            false
        };
        self.do_breakpoint(is_bp, is_end)
    }

    fn breakpoint_condition_holds(&mut self, cond: &str) -> bool {
        let saved = self.typed_code;
        self.typed_code = true;
        let result = self.eval_string(cond, true, 1);
        self.typed_code = saved;
        match result.map(|vals| vals.first().map(|v| v.is_true())) {
            Ok(Some(Ok(flag))) => flag,
            Ok(_) => false,
            Err(_) => {
                self.errors.recover_from_exception();
                self.warning(
                    "Octave:breakpoint-condition",
                    &format!("error evaluating breakpoint condition '{cond}'"),
                );
                true
            }
        }
    }

    /// Move the debug frame `delta` user frames; negative is toward the caller
    pub fn dbupdown(&mut self, delta: isize) -> usize {
        self.debug.frame = self.call_stack.dbupdown(delta);
        self.debug.frame
    }

    fn require_debug_repl(&self, who: &str) -> EvalResult<()> {
        if self.in_debug_repl() {
            Ok(())
        } else {
            Err(ExecutionError::general(format!("{who}: can only be called in debug mode")).into())
        }
    }

    pub fn dbcont(&mut self) -> EvalResult<()> {
        self.require_debug_repl("dbcont")?;
        self.debug.step = Step::Off;
        if let Some(top) = self.debug.stack.last_mut() {
            top.exit_repl = true;
        }
        self.reset_debug_state();
        Ok(())
    }

    pub fn dbquit(&mut self) -> EvalResult<()> {
        self.require_debug_repl("dbquit")?;
        self.debug.step = Step::Off;
        if let Some(top) = self.debug.stack.last_mut() {
            top.abort_repl = true;
        }
        Ok(())
    }

    pub fn dbstep(&mut self, step: Step) -> EvalResult<()> {
        self.require_debug_repl("dbstep")?;
        tracing::debug!(?step, "dbstep");
        self.debug.step = step;
        self.debug.mode = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{ScriptedInput, SharedBuffer};

    fn interp_with(lines: &[&str]) -> (Interpreter, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let interp = Interpreter::new()
            .with_output(out.clone())
            .with_error_output(err.clone())
            .with_input(ScriptedInput::new(lines.iter().copied()));
        (interp, out, err)
    }

    #[test]
    fn test_keyboard_reads_until_dbcont() {
        let (mut interp, out, _) = interp_with(&["x = 41;", "x = x + 1", "dbcont"]);
        interp.eval_string("keyboard", false, 0).unwrap();
        assert!(out.contents().contains("x = 42"));
        assert!(!interp.in_debug_repl());
    }

    #[test]
    fn test_dbcont_outside_debugger_is_error() {
        let mut interp = Interpreter::new();
        assert!(interp.dbcont().is_err());
    }

    #[test]
    fn test_eof_leaves_debugger() {
        let (mut interp, _, _) = interp_with(&[]);
        interp.enter_debugger(DEBUG_PROMPT).unwrap();
        assert!(!interp.in_debug_repl());
        interp.drop_finished_debuggers();
        assert_eq!(interp.debugger_depth(), 0);
    }

    #[test]
    fn test_step_count_decrements_in_debug_frame() {
        let mut interp = Interpreter::new();
        interp.debug.step = Step::Count(3);
        interp.debug.frame = 0;
        interp.do_breakpoint(false, false).unwrap();
        assert_eq!(interp.debug.step, Step::Count(2));
    }

    #[test]
    fn test_step_out_arms_step_in_at_end() {
        let mut interp = Interpreter::new();
        interp.debug.step = Step::Out;
        interp.debug.frame = 0;
        interp.do_breakpoint(false, false).unwrap();
        assert_eq!(interp.debug.step, Step::Out);
        interp.do_breakpoint(false, true).unwrap();
        assert_eq!(interp.debug.step, Step::In);
    }
}
