// Every public operation acquires binding handles under an arena. The
// arena owns them: release is LIFO on all exit paths, each close runs in
// its own catch, and a release failure surfaces as the operation's result
// only when the operation itself succeeded. Nested arenas are fine.

use std::cell::RefCell;

use sediment_base::{Error, Result};
use tracing::warn;

use crate::binding::{Binding, Hid};

pub struct Arena<'a> {
    binding: &'a dyn Binding,
    handles: RefCell<Vec<Hid>>,
}

impl<'a> Arena<'a> {
    pub fn new(binding: &'a dyn Binding) -> Arena<'a> {
        Arena {
            binding,
            handles: RefCell::new(Vec::new()),
        }
    }

    pub fn binding(&self) -> &'a dyn Binding {
        self.binding
    }

    /// Takes ownership of a handle; it will be closed when the arena is
    /// released, after every handle adopted later.
    pub fn adopt(&self, handle: Hid) -> Hid {
        self.handles.borrow_mut().push(handle);
        handle
    }

    /// Closes all adopted handles in reverse adoption order. Returns the
    /// first close failure; later failures are only logged.
    pub fn release(&self) -> Result<()> {
        let mut handles = self.handles.take();
        let mut first: Option<Error> = None;
        for h in handles.drain(..).rev() {
            if let Err(e) = self.binding.close(h) {
                warn!(target: "sediment", "failed to release handle {}: {}", h, e);
                if first.is_none() {
                    first = Some(e);
                }
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Arena<'_> {
    fn drop(&mut self) {
        // Backstop for panic unwinds; failures were already logged.
        let _ = self.release();
    }
}

/// Runs `f` under a fresh arena. An error from `f` wins over any release
/// error; a release error is surfaced only on an otherwise clean exit.
pub fn with_arena<R>(binding: &dyn Binding, f: impl FnOnce(&Arena) -> Result<R>) -> Result<R> {
    let arena = Arena::new(binding);
    match f(&arena) {
        Ok(v) => {
            arena.release()?;
            Ok(v)
        }
        Err(e) => {
            let _ = arena.release();
            Err(e)
        }
    }
}
