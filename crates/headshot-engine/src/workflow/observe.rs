use std::sync::mpsc::{self, Receiver, Sender};

use headshot_contracts::backdrop::Backdrop;

use super::background_edit::EditState;
use super::session::{Screen, SessionError};

/// Snapshot published after every applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    pub screen: Screen,
    pub style_id: String,
    pub last_error: Option<SessionError>,
    pub has_generated_image: bool,
    pub background: Option<BackgroundChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundChange {
    pub state: EditState,
    pub backdrop: Backdrop,
    pub last_error: Option<SessionError>,
}

#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    senders: Vec<Sender<SessionChange>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self) -> Receiver<SessionChange> {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        rx
    }

    /// Delivers to every live receiver and forgets the dropped ones.
    pub(crate) fn publish(&mut self, change: &SessionChange) {
        self.senders.retain(|sender| sender.send(change.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionChange, Subscribers};
    use crate::workflow::Screen;

    fn change(screen: Screen) -> SessionChange {
        SessionChange {
            screen,
            style_id: "corporate-grey".to_string(),
            last_error: None,
            has_generated_image: false,
            background: None,
        }
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let mut subscribers = Subscribers::default();
        let a = subscribers.subscribe();
        let b = subscribers.subscribe();
        subscribers.publish(&change(Screen::Configure));
        assert_eq!(a.try_recv().map(|c| c.screen), Ok(Screen::Configure));
        assert_eq!(b.try_recv().map(|c| c.screen), Ok(Screen::Configure));
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut subscribers = Subscribers::default();
        let kept = subscribers.subscribe();
        drop(subscribers.subscribe());
        subscribers.publish(&change(Screen::Upload));
        assert_eq!(subscribers.len(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
