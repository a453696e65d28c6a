//! Poll outcomes and session events.
//!
//! Two layers of "what happened":
//! - [`PollOutcome`] is the result of one poller step on a live connection. It
//!   separates "not due yet", "read timed out" and "nothing changed" so the
//!   session can count timeouts.
//! - [`SessionEvent`] is what the session manager reports to its
//!   [`Presenter`] after each cooperative step.

use crate::buttons::ButtonState;
use crate::metadata::DeviceSummary;
use serde::Serialize;

/// A changed input report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum InputReport {
    /// Normalized gamepad state, with `changed = state ^ previous`.
    Buttons {
        state: ButtonState,
        changed: ButtonState,
    },
    /// Raw report bytes from a device without a button mapping.
    Raw(Vec<u8>),
}

impl InputReport {
    pub fn buttons(&self) -> Option<ButtonState> {
        match self {
            InputReport::Buttons { state, .. } => Some(*state),
            InputReport::Raw(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The endpoint's interval has not elapsed; nothing was read.
    NotDue,
    /// A read was issued and timed out.
    Timeout,
    /// A report arrived but carried no new input.
    Unchanged,
    Input(InputReport),
}

impl PollOutcome {
    pub fn into_input(self) -> Option<InputReport> {
        match self {
            PollOutcome::Input(r) => Some(r),
            _ => None,
        }
    }
}

/// Result of one [`SessionManager::step`](crate::manager::SessionManager::step).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SessionEvent {
    /// Scanned, found nothing new to connect to.
    Idle,
    Connected(DeviceSummary),
    Input(InputReport),
    /// Connected, but no new input this step.
    NoData,
    /// The connection was torn down; the session is scanning again.
    Lost(String),
}

/// Consumer of session events (display, logging).
pub trait Presenter {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F: FnMut(&SessionEvent)> Presenter for F {
    fn on_event(&mut self, event: &SessionEvent) {
        self(event)
    }
}
