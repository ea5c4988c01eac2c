//! Diff subscriptions and their lifecycle.
//!
//! `Unsubscribed -> Subscribed -> (Lost | Unsubscribed)`, and `Lost ->
//! Unsubscribed` once the caller lets go of the dead subscription. Reconnecting
//! is left to the caller: open a new handle and subscribe again.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use tracing::{Span, debug, info, warn};

use crate::cache::DocumentCache;
use crate::error::{CibError, CibResult};
use crate::session::{ClusterSession, NotificationHandler, RegistrationId};
use crate::types::Document;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, AsRefStr, Display, Serialize, Deserialize)]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    Subscribed,
    /// The session was torn down while subscribed.
    Lost,
}

impl SubscriptionState {
    pub fn can_transition_to(self, to: SubscriptionState) -> bool {
        use SubscriptionState::*;
        matches!(
            (self, to),
            (Unsubscribed, Subscribed) | (Subscribed, Lost) | (Subscribed, Unsubscribed) | (Lost, Unsubscribed)
        )
    }
}

/// What a subscriber is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, Serialize, Deserialize)]
pub enum CibEvent {
    /// The document moved to a new revision.
    Updated,
    /// The session is gone. No further events follow.
    ConnectionLost,
}

/// Subscriber callback. Runs on the thread delivering notifications and
/// should return promptly.
///
/// `Updated` carries the new document. `ConnectionLost` carries the last
/// document known, if any.
pub type EventCallback = dyn Fn(CibEvent, Option<Arc<Document>>) + Send + Sync;

#[derive(Debug, Default)]
struct SlotState {
    state: SubscriptionState,
    generation: u64,
}

/// Subscription state of one `Cib` handle. Each subscription gets a new
/// generation so that events for an earlier one can be told apart.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionSlot {
    inner: Mutex<SlotState>,
}

impl SubscriptionSlot {
    pub fn state(&self) -> SubscriptionState {
        self.inner.lock().state
    }

    fn transition(slot: &mut SlotState, to: SubscriptionState) -> CibResult<()> {
        if !slot.state.can_transition_to(to) {
            return Err(CibError::InvalidStateTransition {
                from: slot.state.to_string(),
                to: to.to_string(),
            });
        }
        slot.state = to;
        Ok(())
    }

    fn begin(&self) -> CibResult<u64> {
        let mut slot = self.inner.lock();
        Self::transition(&mut slot, SubscriptionState::Subscribed)?;
        slot.generation += 1;
        Ok(slot.generation)
    }

    /// Undo `begin` when registration fails.
    fn abort(&self, generation: u64) {
        let mut slot = self.inner.lock();
        if slot.generation == generation {
            slot.state = SubscriptionState::Unsubscribed;
        }
    }

    fn is_live(&self, generation: u64) -> bool {
        let slot = self.inner.lock();
        slot.generation == generation && slot.state == SubscriptionState::Subscribed
    }

    fn lose(&self, generation: u64) -> bool {
        let mut slot = self.inner.lock();
        slot.generation == generation && Self::transition(&mut slot, SubscriptionState::Lost).is_ok()
    }

    /// Returns false if `generation` was already ended.
    fn end(&self, generation: u64) -> bool {
        let mut slot = self.inner.lock();
        slot.generation == generation && Self::transition(&mut slot, SubscriptionState::Unsubscribed).is_ok()
    }
}

struct Listener {
    generation: u64,
    slot: Arc<SubscriptionSlot>,
    cache: Arc<DocumentCache>,
    callback: Box<EventCallback>,
    span: Span,
}

impl NotificationHandler for Listener {
    fn on_diff(&self, envelope: &str) {
        let _entered = self.span.enter();
        if !self.slot.is_live(self.generation) {
            debug!(
                event = "Subscription",
                phase = "Notification",
                generation = self.generation,
                "ignoring notification for an ended subscription"
            );
            return;
        }
        match self.cache.on_notification(envelope) {
            Ok(document) => {
                debug!(event = "Subscription", phase = "Publish", version = %document.version());
                (self.callback)(CibEvent::Updated, Some(document));
            }
            Err(err) => warn!(
                event = "Subscription",
                phase = "Notification",
                error = %err,
                "could not refresh document"
            ),
        }
    }

    fn on_destroy(&self) {
        let _entered = self.span.enter();
        if !self.slot.lose(self.generation) {
            debug!(event = "Subscription", phase = "Destroy", "ignoring destroy for an ended subscription");
            return;
        }
        info!(event = "Subscription", phase = "Lost", "connection to the CIB lost");
        (self.callback)(CibEvent::ConnectionLost, self.cache.current());
    }
}

/// A live diff subscription. Dropping it unsubscribes.
///
/// An event already being delivered when the subscription ends may still
/// reach the callback once.
pub struct Subscription {
    session: Arc<dyn ClusterSession>,
    slot: Arc<SubscriptionSlot>,
    registration: RegistrationId,
    generation: u64,
    span: Span,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("registration", &self.registration)
            .field("state", &self.state())
            .finish()
    }
}

impl Subscription {
    pub(crate) fn start(
        session: Arc<dyn ClusterSession>,
        cache: Arc<DocumentCache>,
        slot: Arc<SubscriptionSlot>,
        callback: Box<EventCallback>,
        span: Span,
    ) -> CibResult<Self> {
        let generation = slot.begin()?;
        let listener = Arc::new(Listener {
            generation,
            slot: slot.clone(),
            cache,
            callback,
            span: span.clone(),
        });
        let registration = match session.register_notifications(listener) {
            Ok(registration) => registration,
            Err(err) => {
                slot.abort(generation);
                return Err(err);
            }
        };
        debug!(event = "Subscription", phase = "Subscribed", %registration, generation);
        Ok(Self {
            session,
            slot,
            registration,
            generation,
            span,
        })
    }

    /// `Lost` after the session went away, `Unsubscribed` once a newer
    /// subscription replaced this one.
    pub fn state(&self) -> SubscriptionState {
        let slot = self.slot.inner.lock();
        if slot.generation == self.generation {
            slot.state
        } else {
            SubscriptionState::Unsubscribed
        }
    }

    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    pub fn is_lost(&self) -> bool {
        self.state() == SubscriptionState::Lost
    }

    pub fn unsubscribe(mut self) -> CibResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> CibResult<()> {
        let _entered = self.span.enter();
        if !self.slot.end(self.generation) {
            return Ok(());
        }
        debug!(event = "Subscription", phase = "Unsubscribed", registration = %self.registration);
        self.session.unregister(self.registration)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(event = "Subscription", phase = "Drop", error = %err, "unregister failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::MemorySession;
    use crate::tests::revision;
    use yare::parameterized;

    type Seen = Arc<Mutex<Vec<(CibEvent, Option<String>)>>>;

    struct Fixture {
        session: Arc<MemorySession>,
        cache: Arc<DocumentCache>,
        slot: Arc<SubscriptionSlot>,
        seen: Seen,
    }

    impl Fixture {
        fn new() -> Self {
            let session = Arc::new(MemorySession::new(revision(0, &[])).unwrap());
            let cache = Arc::new(DocumentCache::new(session.clone(), ClientConfig::default()));
            Self {
                session,
                cache,
                slot: Arc::new(SubscriptionSlot::default()),
                seen: Seen::default(),
            }
        }

        fn subscribe(&self) -> CibResult<Subscription> {
            let seen = self.seen.clone();
            Subscription::start(
                self.session.clone(),
                self.cache.clone(),
                self.slot.clone(),
                Box::new(move |event: CibEvent, doc: Option<Arc<Document>>| {
                    seen.lock().push((event, doc.map(|d| d.version().to_string())));
                }),
                Span::none(),
            )
        }
    }

    #[parameterized(
        subscribe = { SubscriptionState::Unsubscribed, SubscriptionState::Subscribed, true },
        lose = { SubscriptionState::Subscribed, SubscriptionState::Lost, true },
        unsubscribe = { SubscriptionState::Subscribed, SubscriptionState::Unsubscribed, true },
        release_lost = { SubscriptionState::Lost, SubscriptionState::Unsubscribed, true },
        twice = { SubscriptionState::Subscribed, SubscriptionState::Subscribed, false },
        revive = { SubscriptionState::Lost, SubscriptionState::Subscribed, false },
        lose_idle = { SubscriptionState::Unsubscribed, SubscriptionState::Lost, false },
    )]
    fn test_transitions(from: SubscriptionState, to: SubscriptionState, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_updates_are_published() {
        let fixture = Fixture::new();
        fixture.cache.initialize().unwrap();
        let subscription = fixture.subscribe().unwrap();
        assert_eq!(subscription.state(), SubscriptionState::Subscribed);

        fixture.session.push_update(revision(1, &["n1"])).unwrap();
        fixture.session.push_update(revision(2, &["n1", "n2"])).unwrap();
        fixture.session.dispatch_pending();

        let seen = fixture.seen.lock();
        assert_eq!(
            *seen,
            vec![
                (CibEvent::Updated, Some("0:1:1".to_string())),
                (CibEvent::Updated, Some("0:1:2".to_string())),
            ]
        );
    }

    #[test]
    fn test_second_subscription_is_rejected() {
        let fixture = Fixture::new();
        let _first = fixture.subscribe().unwrap();
        let err = fixture.subscribe().unwrap_err();
        assert_eq!(
            err,
            CibError::InvalidStateTransition {
                from: "Subscribed".to_string(),
                to: "Subscribed".to_string(),
            }
        );
    }

    #[test]
    fn test_late_notification_after_unsubscribe() {
        let fixture = Fixture::new();
        let subscription = fixture.subscribe().unwrap();
        fixture.session.push_update(revision(1, &["n1"])).unwrap();

        subscription.unsubscribe().unwrap();
        assert_eq!(fixture.slot.state(), SubscriptionState::Unsubscribed);
        assert_eq!(fixture.session.registrations(), 0);

        assert_eq!(fixture.session.dispatch_pending(), 1);
        assert!(fixture.seen.lock().is_empty());
    }

    #[test]
    fn test_resubscribe_ignores_events_for_old_generation() {
        let fixture = Fixture::new();
        let first = fixture.subscribe().unwrap();
        fixture.session.push_update(revision(1, &["n1"])).unwrap();
        drop(first);

        let second = fixture.subscribe().unwrap();
        fixture.session.dispatch_pending();
        assert!(fixture.seen.lock().is_empty());

        fixture.session.push_update(revision(2, &["n1"])).unwrap();
        fixture.session.dispatch_pending();
        assert_eq!(fixture.seen.lock().len(), 1);
        assert_eq!(second.state(), SubscriptionState::Subscribed);
    }

    #[test]
    fn test_connection_lost() {
        let fixture = Fixture::new();
        fixture.cache.initialize().unwrap();
        let subscription = fixture.subscribe().unwrap();

        fixture.session.disconnect();
        fixture.session.dispatch_pending();

        assert!(subscription.is_lost());
        assert_eq!(
            *fixture.seen.lock(),
            vec![(CibEvent::ConnectionLost, Some("0:1:0".to_string()))]
        );

        drop(subscription);
        assert_eq!(fixture.slot.state(), SubscriptionState::Unsubscribed);
        assert!(fixture.subscribe().is_err());
    }

    #[test]
    fn test_registration_failure_leaves_unsubscribed() {
        let fixture = Fixture::new();
        fixture.session.set_connected(false);
        assert_eq!(fixture.subscribe().unwrap_err(), CibError::not_connected_rc());
        assert_eq!(fixture.slot.state(), SubscriptionState::Unsubscribed);
    }
}
