//! A presenter that writes session events to the `tracing` log.
use crate::event::{InputReport, Presenter, SessionEvent};
use tracing::{debug, info, warn};

/// Logs every session event. Button states print as 16-bit binary, raw
/// reports as hex. `Idle` and `NoData` are only logged at debug level when
/// `verbose` is set.
#[derive(Debug, Default)]
pub struct Logger {
    verbose: bool,
    inputs: u64,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose() -> Self {
        Self {
            verbose: true,
            inputs: 0,
        }
    }

    /// Input events seen so far.
    pub fn inputs(&self) -> u64 {
        self.inputs
    }
}

impl Presenter for Logger {
    fn on_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Connected(summary) => info!("Connected {summary}"),
            SessionEvent::Lost(reason) => warn!("Lost device: {reason}"),
            SessionEvent::Input(InputReport::Buttons { state, changed }) => {
                self.inputs += 1;
                info!("buttons {:016b} changed {:016b}", state, changed);
            }
            SessionEvent::Input(InputReport::Raw(bytes)) => {
                self.inputs += 1;
                let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
                info!("report [{}]", hex.join(" "));
            }
            SessionEvent::Idle | SessionEvent::NoData if self.verbose => debug!(?event),
            SessionEvent::Idle | SessionEvent::NoData => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::ButtonState;

    #[test]
    fn counts_input_events_only() {
        let mut logger = Logger::verbose();
        logger.on_event(&SessionEvent::Idle);
        logger.on_event(&SessionEvent::Input(InputReport::Buttons {
            state: ButtonState::A,
            changed: ButtonState::A,
        }));
        logger.on_event(&SessionEvent::NoData);
        logger.on_event(&SessionEvent::Input(InputReport::Raw(vec![1, 2])));
        logger.on_event(&SessionEvent::Lost("gone".into()));
        assert_eq!(logger.inputs(), 2);
    }
}
