//! Action table: performative code to handler mapping.
//!
//! The code space is one byte wide and dense, so the table is a flat
//! 256-slot array indexed directly by code. Lookup is a single bounds-free
//! index; there is no hashing and no removal (the table lives as long as
//! its dispatcher).

use crate::dispatch::{FrameView, FrameWriter};
use crate::error::DispatchError;

/// Handler invoked for one decoded frame. Receives the caller-owned
/// context, a read view of the current frame, and the output path for
/// queuing replies.
pub type Handler<C> =
    Box<dyn Fn(&mut C, &FrameView<'_>, &mut FrameWriter) -> Result<(), DispatchError>>;

/// One registered entry: a handler plus its diagnostic name.
pub struct Action<C> {
    pub name: &'static str,
    pub handler: Handler<C>,
}

/// Fixed 256-slot lookup table from performative code to [`Action`].
pub struct ActionTable<C> {
    entries: [Option<Action<C>>; 256],
}

impl<C> ActionTable<C> {
    pub fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
        }
    }

    /// Registers `handler` under `code`. Last registration wins.
    pub fn register(&mut self, code: u8, name: &'static str, handler: Handler<C>) {
        self.entries[usize::from(code)] = Some(Action { name, handler });
    }

    /// Returns the entry for `code`, if one was registered.
    pub fn lookup(&self, code: u8) -> Option<&Action<C>> {
        self.entries[usize::from(code)].as_ref()
    }

    /// Diagnostic name for `code`.
    pub fn name(&self, code: u8) -> &'static str {
        self.lookup(code).map_or("unregistered", |a| a.name)
    }
}

impl<C> Default for ActionTable<C> {
    fn default() -> Self {
        Self::new()
    }
}
