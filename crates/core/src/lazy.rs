//! State machine for lazily evaluated values.

/// The state of a lazily evaluated value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LazyState {
    /// An invalid value that was never valid.
    #[default]
    Uninitialized,
    /// The first time the value is valid.
    ///
    /// Equivalent to `Valid` for comparison purposes, but distinguished so
    /// the first-ever change event can report the default old value exactly
    /// once.
    Initialized,
    /// A valid value.
    Valid,
    /// An invalid value; the next pull must recompute.
    Invalid,
}

impl LazyState {
    /// Returns whether this state describes a valid value.
    #[inline]
    pub fn is_valid(self) -> bool {
        matches!(self, LazyState::Initialized | LazyState::Valid)
    }
}
