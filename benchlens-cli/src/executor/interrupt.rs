//! Interrupt Handling
//!
//! Ctrl-C must not leave scratch directories in the user's module. The
//! signal handler kills the tracked child and raises a flag; the runner then
//! fails the run with an ordinary error, so every `TempDir` on the stack
//! drops.

use super::error::ExecutionError;
use std::fmt;
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Inner {
    interrupted: AtomicBool,
    child: Mutex<Option<Child>>,
}

/// Cancellation state shared between a signal handler and the runners
#[derive(Clone, Default)]
pub struct Interrupter {
    inner: Arc<Inner>,
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupter")
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route Ctrl-C to this interrupter.
    ///
    /// A process has a single handler; later installations fail.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let handle = self.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nInterrupted, stopping the running toolchain...");
            handle.interrupt();
        })
    }

    /// Raise the flag and kill the tracked child, if any
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        if let Some(child) = self.slot().as_mut() {
            let _ = child.kill();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// `Err` once an interrupt has been requested
    pub(crate) fn check(&self) -> Result<(), ExecutionError> {
        if self.is_interrupted() {
            Err(interrupted(String::new()))
        } else {
            Ok(())
        }
    }

    /// Hold `child` where [`interrupt`](Self::interrupt) can reach it.
    ///
    /// A child tracked after the flag was raised is killed at once.
    pub(crate) fn track(&self, mut child: Child) {
        let mut slot = self.slot();
        if self.is_interrupted() {
            let _ = child.kill();
        }
        *slot = Some(child);
    }

    /// Take back the tracked child
    pub(crate) fn release(&self) -> Option<Child> {
        self.slot().take()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Child>> {
        self.inner
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The error an interrupted run ends with
pub(crate) fn interrupted(diagnostics: String) -> ExecutionError {
    ExecutionError::ExecutionFailed {
        cause: "interrupted".to_string(),
        diagnostics,
    }
}
