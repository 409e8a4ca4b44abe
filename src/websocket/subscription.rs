// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2021-2025 Rentora Pty Ltd. All rights reserved.
//  https://rentora.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Subscriber registry and server-side subscription bookkeeping.
//!
//! Two pieces of state live here. [`SubscriberRegistry`] tracks local
//! subscribers and the modules each is interested in, and answers the
//! "first interest / last interest" questions that drive wire subscribe
//! and unsubscribe messages. [`SubscriptionState`] tracks the wire-level
//! view: modules requested but not yet acknowledged by the server
//! (pending, in request order) versus modules the server has confirmed.

use std::sync::{Arc, Mutex};

use ahash::AHashSet;
use dashmap::DashMap;
use ustr::Ustr;

use super::{enums::RentoraModule, messages::EventHandler};

/// A registered subscriber: its event handler and the modules it wants.
#[derive(Clone)]
pub(crate) struct SubscriberEntry {
    pub handler: EventHandler,
    pub modules: AHashSet<RentoraModule>,
}

/// Registry of local subscribers keyed by subscriber id.
///
/// Cheap to clone and share; all mutation goes through the inner [`DashMap`].
#[derive(Clone, Default)]
pub(crate) struct SubscriberRegistry {
    entries: Arc<DashMap<Ustr, SubscriberEntry>>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SubscriberRegistry))
            .field("subscribers", &self.entries.len())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Registers a subscriber, replacing any previous entry with the same id.
    ///
    /// Returns the modules only the replaced entry was interested in, so the
    /// caller can release them on the wire.
    pub fn register(&self, subscriber_id: Ustr, handler: EventHandler) -> Vec<RentoraModule> {
        let previous = self.entries.insert(
            subscriber_id,
            SubscriberEntry {
                handler,
                modules: AHashSet::new(),
            },
        );

        match previous {
            Some(entry) => entry
                .modules
                .into_iter()
                .filter(|module| !self.has_interest(*module))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Removes a subscriber and returns the modules no remaining subscriber
    /// is interested in.
    pub fn deregister(&self, subscriber_id: &Ustr) -> Vec<RentoraModule> {
        match self.entries.remove(subscriber_id) {
            Some((_, entry)) => entry
                .modules
                .into_iter()
                .filter(|module| !self.has_interest(*module))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Records a subscriber's interest in a module.
    ///
    /// Returns `true` if this is the first interest in the module across all
    /// subscribers, meaning a wire subscribe is warranted.
    pub fn add_interest(&self, subscriber_id: &Ustr, module: RentoraModule) -> bool {
        let newly_added = {
            let Some(mut entry) = self.entries.get_mut(subscriber_id) else {
                return false;
            };
            entry.modules.insert(module)
        };

        if !newly_added {
            return false;
        }

        // The inserting subscriber holds the only interest iff nobody else does
        self.entries
            .iter()
            .filter(|entry| entry.value().modules.contains(&module))
            .count()
            == 1
    }

    /// Drops a subscriber's interest in a module.
    ///
    /// Returns `true` if no subscriber remains interested in the module,
    /// meaning a wire unsubscribe is warranted.
    pub fn remove_interest(&self, subscriber_id: &Ustr, module: RentoraModule) -> bool {
        let removed = {
            let Some(mut entry) = self.entries.get_mut(subscriber_id) else {
                return false;
            };
            entry.modules.remove(&module)
        };

        removed && !self.has_interest(module)
    }

    /// Returns whether any subscriber is interested in the module.
    pub fn has_interest(&self, module: RentoraModule) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.value().modules.contains(&module))
    }

    /// Returns the union of all subscribers' module interests.
    pub fn interested_modules(&self) -> Vec<RentoraModule> {
        let mut modules = AHashSet::new();
        for entry in self.entries.iter() {
            modules.extend(entry.value().modules.iter().copied());
        }
        modules.into_iter().collect()
    }

    /// Returns the handlers of all subscribers interested in the module.
    pub fn handlers_for(&self, module: RentoraModule) -> Vec<EventHandler> {
        self.entries
            .iter()
            .filter(|entry| entry.value().modules.contains(&module))
            .map(|entry| entry.value().handler.clone())
            .collect()
    }

    /// Returns the handlers of all subscribers.
    pub fn all_handlers(&self) -> Vec<EventHandler> {
        self.entries
            .iter()
            .map(|entry| entry.value().handler.clone())
            .collect()
    }

    /// Returns whether the registry has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
struct SubscriptionStateInner {
    /// Modules requested on the wire, awaiting confirmation, in request order.
    pending: Vec<RentoraModule>,
    /// Modules the server has confirmed.
    confirmed: AHashSet<RentoraModule>,
}

/// Wire-level subscription bookkeeping shared between facade and handler.
///
/// A module is in at most one of the pending or confirmed sets at a time.
/// Both sets are cleared whenever a session ends; interests recorded in the
/// [`SubscriberRegistry`] survive and seed the next session's pending set.
#[derive(Clone, Debug, Default)]
pub(crate) struct SubscriptionState {
    inner: Arc<Mutex<SubscriptionStateInner>>,
}

impl SubscriptionState {
    fn lock(&self) -> std::sync::MutexGuard<'_, SubscriptionStateInner> {
        self.inner.lock().expect("subscription state lock poisoned")
    }

    /// Marks a module as requested, pending server confirmation.
    ///
    /// Returns `false` without changing state if the module is already
    /// pending or confirmed.
    pub fn mark_subscribe(&self, module: RentoraModule) -> bool {
        let mut inner = self.lock();
        if inner.pending.contains(&module) || inner.confirmed.contains(&module) {
            return false;
        }
        inner.pending.push(module);
        true
    }

    /// Moves a module from pending to confirmed on server acknowledgement.
    ///
    /// Returns `false` if the module was not pending; a confirmation for a
    /// module the client never requested does not create state.
    pub fn confirm_subscribe(&self, module: RentoraModule) -> bool {
        let mut inner = self.lock();
        let Some(pos) = inner.pending.iter().position(|m| *m == module) else {
            return false;
        };
        inner.pending.remove(pos);
        inner.confirmed.insert(module);
        true
    }

    /// Clears a module from both the pending and confirmed sets.
    pub fn mark_unsubscribe(&self, module: RentoraModule) {
        let mut inner = self.lock();
        inner.pending.retain(|m| *m != module);
        inner.confirmed.remove(&module);
    }

    /// Returns the pending modules in request order.
    pub fn pending_snapshot(&self) -> Vec<RentoraModule> {
        self.lock().pending.clone()
    }

    /// Returns the confirmed modules.
    pub fn confirmed_modules(&self) -> Vec<RentoraModule> {
        self.lock().confirmed.iter().copied().collect()
    }

    /// Returns whether the module is awaiting confirmation.
    pub fn is_pending(&self, module: RentoraModule) -> bool {
        self.lock().pending.contains(&module)
    }

    /// Returns whether the module is confirmed by the server.
    pub fn is_confirmed(&self, module: RentoraModule) -> bool {
        self.lock().confirmed.contains(&module)
    }

    /// Returns whether the module was requested on the wire at all.
    pub fn is_requested(&self, module: RentoraModule) -> bool {
        let inner = self.lock();
        inner.pending.contains(&module) || inner.confirmed.contains(&module)
    }

    /// Clears all wire-level state; called on every session end.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.pending.clear();
        inner.confirmed.clear();
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::websocket::messages::RealtimeEvent;

    fn noop_handler() -> EventHandler {
        Arc::new(|_: RealtimeEvent| {})
    }

    #[rstest]
    fn test_registry_first_and_last_interest() {
        let registry = SubscriberRegistry::default();
        let alice = Ustr::from("alice");
        let bob = Ustr::from("bob");
        registry.register(alice, noop_handler());
        registry.register(bob, noop_handler());

        assert!(registry.add_interest(&alice, RentoraModule::Bookings));
        assert!(!registry.add_interest(&bob, RentoraModule::Bookings));
        assert!(!registry.add_interest(&bob, RentoraModule::Bookings));

        assert!(!registry.remove_interest(&alice, RentoraModule::Bookings));
        assert!(registry.remove_interest(&bob, RentoraModule::Bookings));
        assert!(!registry.has_interest(RentoraModule::Bookings));
    }

    #[rstest]
    fn test_registry_interest_for_unknown_subscriber() {
        let registry = SubscriberRegistry::default();
        assert!(!registry.add_interest(&Ustr::from("ghost"), RentoraModule::Orders));
        assert!(!registry.remove_interest(&Ustr::from("ghost"), RentoraModule::Orders));
    }

    #[rstest]
    fn test_registry_deregister_reports_orphaned_modules() {
        let registry = SubscriberRegistry::default();
        let alice = Ustr::from("alice");
        let bob = Ustr::from("bob");
        registry.register(alice, noop_handler());
        registry.register(bob, noop_handler());
        registry.add_interest(&alice, RentoraModule::Bookings);
        registry.add_interest(&alice, RentoraModule::Quotes);
        registry.add_interest(&bob, RentoraModule::Quotes);

        let orphaned = registry.deregister(&alice);
        assert_eq!(orphaned, vec![RentoraModule::Bookings]);
        assert!(registry.has_interest(RentoraModule::Quotes));
        assert!(!registry.is_empty());

        let orphaned = registry.deregister(&bob);
        assert_eq!(orphaned, vec![RentoraModule::Quotes]);
        assert!(registry.is_empty());
    }

    #[rstest]
    fn test_registry_reregister_replaces_entry() {
        let registry = SubscriberRegistry::default();
        let alice = Ustr::from("alice");
        registry.register(alice, noop_handler());
        registry.add_interest(&alice, RentoraModule::Orders);

        let orphaned = registry.register(alice, noop_handler());
        assert_eq!(orphaned, vec![RentoraModule::Orders]);
        assert!(!registry.has_interest(RentoraModule::Orders));
    }

    #[rstest]
    fn test_registry_handlers_for_filters_by_module() {
        let registry = SubscriberRegistry::default();
        let alice = Ustr::from("alice");
        let bob = Ustr::from("bob");
        registry.register(alice, noop_handler());
        registry.register(bob, noop_handler());
        registry.add_interest(&alice, RentoraModule::Bookings);
        registry.add_interest(&bob, RentoraModule::Orders);

        assert_eq!(registry.handlers_for(RentoraModule::Bookings).len(), 1);
        assert_eq!(registry.handlers_for(RentoraModule::Quotes).len(), 0);
        assert_eq!(registry.all_handlers().len(), 2);
    }

    #[rstest]
    fn test_subscription_state_pending_confirmed_exclusive() {
        let state = SubscriptionState::default();

        assert!(state.mark_subscribe(RentoraModule::Bookings));
        assert!(!state.mark_subscribe(RentoraModule::Bookings));
        assert!(state.is_pending(RentoraModule::Bookings));
        assert!(!state.is_confirmed(RentoraModule::Bookings));

        assert!(state.confirm_subscribe(RentoraModule::Bookings));
        assert!(!state.is_pending(RentoraModule::Bookings));
        assert!(state.is_confirmed(RentoraModule::Bookings));

        // Confirmed modules cannot be re-marked pending
        assert!(!state.mark_subscribe(RentoraModule::Bookings));
    }

    #[rstest]
    fn test_subscription_state_confirm_requires_pending() {
        let state = SubscriptionState::default();
        assert!(!state.confirm_subscribe(RentoraModule::Quotes));
        assert!(!state.is_confirmed(RentoraModule::Quotes));
    }

    #[rstest]
    fn test_subscription_state_pending_order_preserved() {
        let state = SubscriptionState::default();
        state.mark_subscribe(RentoraModule::Quotes);
        state.mark_subscribe(RentoraModule::Bookings);
        state.mark_subscribe(RentoraModule::Orders);

        assert_eq!(
            state.pending_snapshot(),
            vec![
                RentoraModule::Quotes,
                RentoraModule::Bookings,
                RentoraModule::Orders
            ]
        );
    }

    #[rstest]
    fn test_subscription_state_unsubscribe_and_reset() {
        let state = SubscriptionState::default();
        state.mark_subscribe(RentoraModule::Bookings);
        state.mark_subscribe(RentoraModule::Orders);
        state.confirm_subscribe(RentoraModule::Bookings);

        state.mark_unsubscribe(RentoraModule::Bookings);
        assert!(!state.is_requested(RentoraModule::Bookings));
        assert!(state.is_requested(RentoraModule::Orders));

        state.reset();
        assert!(state.pending_snapshot().is_empty());
        assert!(state.confirmed_modules().is_empty());
    }
}
