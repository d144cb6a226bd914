//! Scoped restoration of interpreter state
//!
//! [`Unwind`] holds the interpreter mutably and runs a restore action when
//! dropped, so saved flags, frame pointers and counters are put back on every
//! exit path: normal return, `?` propagation and panics alike.

use super::Interpreter;
use std::ops::{Deref, DerefMut};

/// Guard that runs `restore` on the interpreter when dropped
pub struct Unwind<'a, F: FnOnce(&mut Interpreter)> {
    interp: &'a mut Interpreter,
    restore: Option<F>,
}

impl<F: FnOnce(&mut Interpreter)> Drop for Unwind<'_, F> {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore(self.interp);
        }
    }
}

impl<F: FnOnce(&mut Interpreter)> Deref for Unwind<'_, F> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interp
    }
}

impl<F: FnOnce(&mut Interpreter)> DerefMut for Unwind<'_, F> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interp
    }
}

impl Interpreter {
    /// Guard whose drop runs `restore`
    ///
    /// ```text
    /// let saved = self.in_loop;
    /// let mut g = self.unwind(move |i| i.in_loop = saved);
    /// g.in_loop = true;
    /// g.exec_list(body)?;
    /// ```
    pub(crate) fn unwind<F: FnOnce(&mut Interpreter)>(&mut self, restore: F) -> Unwind<'_, F> {
        Unwind {
            interp: self,
            restore: Some(restore),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_runs_on_early_return() {
        fn body(interp: &mut Interpreter) -> Result<(), ()> {
            let saved = interp.in_loop;
            let mut g = interp.unwind(move |i| i.in_loop = saved);
            g.in_loop = true;
            Err(())
        }
        let mut interp = Interpreter::new();
        assert!(body(&mut interp).is_err());
        assert!(!interp.in_loop);
    }

    #[test]
    fn test_guards_nest() {
        let mut interp = Interpreter::new();
        {
            let mut outer = interp.unwind(|i| i.breaking = 0);
            outer.breaking = 5;
            {
                let mut inner = outer.unwind(|i| i.continuing = 0);
                inner.continuing = 2;
            }
            assert_eq!(outer.continuing, 0);
            assert_eq!(outer.breaking, 5);
        }
        assert_eq!(interp.breaking, 0);
    }
}
