//! Two-slot source ownership for gapless playback

/// The source being played and the one queued behind it
///
/// A transition promotes `pending` into `current`; nothing else reorders
/// the slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSlots<T> {
    current: Option<T>,
    pending: Option<T>,
}

impl<T> SourceSlots<T> {
    pub fn new() -> Self {
        Self {
            current: None,
            pending: None,
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.current.as_mut()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut T> {
        self.pending.as_mut()
    }

    /// Install a new current source, dropping both previous slots
    pub fn replace(&mut self, current: T) {
        self.current = Some(current);
        self.pending = None;
    }

    /// Queue a source behind the current one, returning the one it displaced
    pub fn set_pending(&mut self, pending: T) -> Option<T> {
        self.pending.replace(pending)
    }

    pub fn take_pending(&mut self) -> Option<T> {
        self.pending.take()
    }

    /// Move the pending source into the current slot
    ///
    /// Returns the finished source. With nothing pending the current slot
    /// simply empties.
    pub fn promote(&mut self) -> Option<T> {
        std::mem::replace(&mut self.current, self.pending.take())
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.pending = None;
    }
}

impl<T> Default for SourceSlots<T> {
    fn default() -> Self {
        Self::new()
    }
}
