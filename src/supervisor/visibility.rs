//! Page visibility signals.

// ============================================================================
// Visibility
// ============================================================================

/// Whether the display is currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Shown; the stream should be running.
    #[default]
    Visible,
    /// Hidden; no stream and no deliveries.
    Hidden,
}

// ============================================================================
// VisibilityEvent
// ============================================================================

/// Transition reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityEvent {
    /// The display became visible.
    BecameVisible,
    /// The display became hidden.
    BecameHidden,
}

impl VisibilityEvent {
    /// Returns the visibility after this event.
    #[inline]
    #[must_use]
    pub fn visibility(self) -> Visibility {
        match self {
            Self::BecameVisible => Visibility::Visible,
            Self::BecameHidden => Visibility::Hidden,
        }
    }
}

impl From<Visibility> for VisibilityEvent {
    fn from(visibility: Visibility) -> Self {
        match visibility {
            Visibility::Visible => Self::BecameVisible,
            Visibility::Hidden => Self::BecameHidden,
        }
    }
}
