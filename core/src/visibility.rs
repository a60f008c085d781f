/// Page visibility as an injectable event source
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn is_hidden(self) -> bool {
        self == Visibility::Hidden
    }
}

/// Latest visibility plus the number of transitions that led to it.
///
/// A `watch` keeps only the newest value, so a hide followed by a show can
/// arrive as one update. The counter still moves, which lets subscribers
/// tell such a round trip apart from a repeated notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityState {
    pub visibility: Visibility,
    pub transitions: u64,
}

/// Source of visibility transitions. Dropping the receiver unsubscribes.
pub trait VisibilitySource: Send + Sync {
    fn current(&self) -> Visibility;
    fn subscribe(&self) -> watch::Receiver<VisibilityState>;
}

/// Visibility driven by whoever owns it (tests, a terminal, a window hook)
pub struct PageVisibility {
    tx: watch::Sender<VisibilityState>,
}

impl PageVisibility {
    pub fn new(initial: Visibility) -> Self {
        let (tx, _) = watch::channel(VisibilityState {
            visibility: initial,
            transitions: 0,
        });
        Self { tx }
    }

    /// Record a transition; setting the current value again notifies nobody
    pub fn set(&self, visibility: Visibility) {
        self.tx.send_if_modified(|state| {
            if state.visibility == visibility {
                return false;
            }
            state.visibility = visibility;
            state.transitions += 1;
            true
        });
    }

    pub fn hide(&self) {
        self.set(Visibility::Hidden);
    }

    pub fn show(&self) {
        self.set(Visibility::Visible);
    }
}

impl VisibilitySource for PageVisibility {
    fn current(&self) -> Visibility {
        self.tx.borrow().visibility
    }

    fn subscribe(&self) -> watch::Receiver<VisibilityState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_see_transitions() {
        let page = PageVisibility::new(Visibility::Visible);
        let mut rx = page.subscribe();
        assert!(!page.current().is_hidden());

        page.hide();
        assert!(rx.has_changed().unwrap());
        let state = *rx.borrow_and_update();
        assert_eq!(state.visibility, Visibility::Hidden);
        assert_eq!(state.transitions, 1);
        assert!(page.current().is_hidden());
    }

    #[test]
    fn test_round_trip_is_counted_and_repeats_are_not() {
        let page = PageVisibility::new(Visibility::Visible);
        let mut rx = page.subscribe();

        page.show();
        assert!(!rx.has_changed().unwrap());

        page.hide();
        page.show();
        assert!(rx.has_changed().unwrap());
        let state = *rx.borrow_and_update();
        assert_eq!(state.visibility, Visibility::Visible);
        assert_eq!(state.transitions, 2);
    }
}
