// SPDX-FileCopyrightText: © 2025 ProxyKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Serialized state machine engine.
//!
//! Events may be submitted from any thread, including reentrantly from a
//! callback fired by a running transition. Submissions land in a mailbox and
//! are drained by whichever thread is currently processing, so exactly one
//! transition executes at a time and its side effects complete before the
//! next event is handled.
//!
//! The transition logic itself is supplied through the [`Transitions`] trait:
//! a static match on (state, event) per state, which keeps the table
//! exhaustiveness-checked by the compiler. Pairs without a transition are
//! reported through [`Transitions::on_inappropriate`] and leave the state
//! unchanged.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Outcome of a transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S> {
    /// Move to (or stay in) the given state.
    Next(S),
    /// The (state, event) pair has no transition; the state is unchanged.
    Inappropriate,
}

/// Diagnostic tag of an event, available before the event is consumed.
pub trait EventKind {
    fn kind(&self) -> &'static str;
}

/// Transition logic plugged into a [`StateMachine`].
pub trait Transitions {
    type State: Copy + Eq + fmt::Debug;
    type Event: EventKind;

    /// Handles `event` in `state`, performing side effects, and returns the
    /// next state.
    fn transition(&mut self, state: Self::State, event: Self::Event) -> Step<Self::State>;

    /// Called when [`Transitions::transition`] reported [`Step::Inappropriate`].
    fn on_inappropriate(&mut self, state: Self::State, event_kind: &'static str);

    /// Observes every applied state change, including self-transitions.
    fn on_transition(&mut self, _from: Self::State, _to: Self::State) {}
}

struct Mailbox<E> {
    queue: VecDeque<E>,
    draining: bool,
}

struct Core<T: Transitions> {
    state: T::State,
    transitions: T,
}

/// A state machine with serialized, reentrancy-safe event delivery.
pub struct StateMachine<T: Transitions> {
    mailbox: Mutex<Mailbox<T::Event>>,
    core: Mutex<Core<T>>,
    snapshot: Mutex<T::State>,
}

impl<T: Transitions> StateMachine<T> {
    pub fn new(initial: T::State, transitions: T) -> Self {
        Self {
            mailbox: Mutex::new(Mailbox { queue: VecDeque::new(), draining: false }),
            core: Mutex::new(Core { state: initial, transitions }),
            snapshot: Mutex::new(initial),
        }
    }

    /// Submits an event.
    ///
    /// If no other thread is mid-transition, the calling thread processes the
    /// event (and any that arrive meanwhile) before returning. Otherwise the
    /// event is queued and the active thread picks it up.
    pub fn handle(&self, event: T::Event) {
        {
            let mut mailbox = self.mailbox.lock().unwrap_or_else(PoisonError::into_inner);
            mailbox.queue.push_back(event);
            if mailbox.draining {
                return;
            }
            mailbox.draining = true;
        }
        self.drain();
    }

    /// Current state, readable from any thread without blocking on an active
    /// transition.
    pub fn state(&self) -> T::State {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self) {
        loop {
            let event = {
                let mut mailbox = self.mailbox.lock().unwrap_or_else(PoisonError::into_inner);
                match mailbox.queue.pop_front() {
                    Some(event) => event,
                    None => {
                        mailbox.draining = false;
                        return;
                    },
                }
            };

            let mut core = self.core.lock().unwrap_or_else(PoisonError::into_inner);
            let state = core.state;
            let kind = event.kind();
            match core.transitions.transition(state, event) {
                Step::Next(next) => {
                    core.state = next;
                    *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = next;
                    core.transitions.on_transition(state, next);
                },
                Step::Inappropriate => core.transitions.on_inappropriate(state, kind),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Gate {
        Locked,
        Open,
    }

    enum GateEvent {
        Coin,
        Push,
    }

    impl EventKind for GateEvent {
        fn kind(&self) -> &'static str {
            match self {
                Self::Coin => "coin",
                Self::Push => "push",
            }
        }
    }

    #[derive(Default)]
    struct Turnstile {
        entries: u32,
        rejected: Vec<&'static str>,
        transitions: Vec<(Gate, Gate)>,
    }

    impl Transitions for Turnstile {
        type State = Gate;
        type Event = GateEvent;

        fn transition(&mut self, state: Gate, event: GateEvent) -> Step<Gate> {
            match (state, event) {
                (Gate::Locked, GateEvent::Coin) => Step::Next(Gate::Open),
                (Gate::Open, GateEvent::Push) => {
                    self.entries += 1;
                    Step::Next(Gate::Locked)
                },
                _ => Step::Inappropriate,
            }
        }

        fn on_inappropriate(&mut self, _state: Gate, event_kind: &'static str) {
            self.rejected.push(event_kind);
        }

        fn on_transition(&mut self, from: Gate, to: Gate) {
            self.transitions.push((from, to));
        }
    }

    fn entries(machine: &StateMachine<Turnstile>) -> u32 {
        let core = machine.core.lock().unwrap_or_else(PoisonError::into_inner);
        core.transitions.entries
    }

    #[test]
    fn test_transitions_apply_in_order() {
        let machine = StateMachine::new(Gate::Locked, Turnstile::default());
        machine.handle(GateEvent::Coin);
        assert_eq!(machine.state(), Gate::Open);
        machine.handle(GateEvent::Push);
        assert_eq!(machine.state(), Gate::Locked);
        assert_eq!(entries(&machine), 1);
    }

    #[test]
    fn test_inappropriate_event_leaves_state_unchanged() {
        let machine = StateMachine::new(Gate::Locked, Turnstile::default());
        machine.handle(GateEvent::Push);
        assert_eq!(machine.state(), Gate::Locked);

        let core = machine.core.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(core.transitions.rejected, vec!["push"]);
        assert!(core.transitions.transitions.is_empty());
    }

    #[test]
    fn test_concurrent_submissions_are_serialized() {
        let machine = Arc::new(StateMachine::new(Gate::Locked, Turnstile::default()));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let machine = Arc::clone(&machine);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        machine.handle(GateEvent::Coin);
                        machine.handle(GateEvent::Push);
                    }
                })
            })
            .collect();
        for thread in threads {
            let _ = thread.join();
        }

        // Every applied transition was observed atomically: the observer log
        // alternates Locked->Open / Open->Locked with no torn pairs.
        let core = machine.core.lock().unwrap_or_else(PoisonError::into_inner);
        for window in core.transitions.transitions.windows(2) {
            assert_eq!(window[0].1, window[1].0);
        }
    }
}
