//! Generic tick-driven state machine.
//!
//! An [`Engine`] holds labelled states, each with an action and an ordered
//! list of guarded transition rules. The engine owns no domain data: every
//! action, guard and effect receives the caller's context by reference, so a
//! single owner mutates the workflow state and the engine only decides which
//! state is active.
//!
//! One call to [`Engine::tick`] does exactly this:
//! 1. runs the active state's action, passing an [`Entry`] that reports
//!    whether this is the first tick since the state was entered;
//! 2. evaluates that state's rules in the order they were added and follows
//!    the first rule whose guard is true, running its effect first;
//! 3. stays put when no guard matches.

use std::fmt;

use thiserror::Error;
use tracing::{debug, trace};

/// Stable handle to a state registered with an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(usize);

/// Entry-once information handed to a state's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    first: bool,
}

impl Entry {
    /// True only on the first tick after the state became active.
    pub fn is_first(self) -> bool {
        self.first
    }
}

/// What happened during a single [`Engine::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// State whose action ran this tick.
    pub state: StateId,
    /// Whether the action saw the entry-once flag set.
    pub first_entry: bool,
    /// State active after the tick.
    pub next: StateId,
}

impl TickReport {
    pub fn moved(&self) -> bool {
        self.state != self.next
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("state {0:?} is not registered with this engine")]
    UnknownState(StateId),
}

type Action<C> = Box<dyn FnMut(&mut C, Entry) + Send>;
type Guard<C> = Box<dyn Fn(&C) -> bool + Send>;
type Effect<C> = Box<dyn FnMut(&mut C) + Send>;

struct Rule<C> {
    guard: Guard<C>,
    target: StateId,
    effect: Option<Effect<C>>,
}

struct StateNode<C> {
    label: &'static str,
    action: Action<C>,
    rules: Vec<Rule<C>>,
}

/// Tick-driven state machine over a caller-owned context `C`.
///
/// The first state added is the initial state. Transitions to the state that
/// is already active count as staying, so the entry-once flag is not raised
/// again.
pub struct Engine<C> {
    states: Vec<StateNode<C>>,
    current: usize,
    entry_pending: bool,
}

impl<C> Default for Engine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Engine<C> {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            current: 0,
            entry_pending: true,
        }
    }

    /// Register a state and return its handle.
    pub fn add_state<A>(&mut self, label: &'static str, action: A) -> StateId
    where
        A: FnMut(&mut C, Entry) + Send + 'static,
    {
        self.states.push(StateNode {
            label,
            action: Box::new(action),
            rules: Vec::new(),
        });
        StateId(self.states.len() - 1)
    }

    /// Append a rule to `from`'s ordered list of outgoing transitions.
    pub fn add_transition<G>(
        &mut self,
        from: StateId,
        guard: G,
        to: StateId,
    ) -> Result<(), EngineError>
    where
        G: Fn(&C) -> bool + Send + 'static,
    {
        self.push_rule(from, Box::new(guard), to, None)
    }

    /// Like [`Engine::add_transition`], with an effect that runs on the
    /// context only when this rule is the one that fires.
    pub fn add_transition_with<G, E>(
        &mut self,
        from: StateId,
        guard: G,
        to: StateId,
        effect: E,
    ) -> Result<(), EngineError>
    where
        G: Fn(&C) -> bool + Send + 'static,
        E: FnMut(&mut C) + Send + 'static,
    {
        self.push_rule(from, Box::new(guard), to, Some(Box::new(effect)))
    }

    fn push_rule(
        &mut self,
        from: StateId,
        guard: Guard<C>,
        to: StateId,
        effect: Option<Effect<C>>,
    ) -> Result<(), EngineError> {
        if to.0 >= self.states.len() {
            return Err(EngineError::UnknownState(to));
        }
        let node = self
            .states
            .get_mut(from.0)
            .ok_or(EngineError::UnknownState(from))?;
        node.rules.push(Rule {
            guard,
            target: to,
            effect,
        });
        Ok(())
    }

    /// Run one scheduling step. Returns `None` when no state is registered.
    pub fn tick(&mut self, ctx: &mut C) -> Option<TickReport> {
        if self.states.is_empty() {
            return None;
        }

        let current = self.current;
        let first_entry = std::mem::replace(&mut self.entry_pending, false);
        let node = &mut self.states[current];

        (node.action)(ctx, Entry { first: first_entry });

        let mut next = current;
        for rule in node.rules.iter_mut() {
            if (rule.guard)(ctx) {
                if let Some(effect) = rule.effect.as_mut() {
                    effect(ctx);
                }
                next = rule.target.0;
                break;
            }
        }

        if next != current {
            debug!(
                from = self.states[current].label,
                to = self.states[next].label,
                "state transition"
            );
            self.current = next;
            self.entry_pending = true;
        } else {
            trace!(state = self.states[current].label, "no transition");
        }

        Some(TickReport {
            state: StateId(current),
            first_entry,
            next: StateId(next),
        })
    }

    pub fn current(&self) -> Option<StateId> {
        (!self.states.is_empty()).then_some(StateId(self.current))
    }

    pub fn label(&self, id: StateId) -> Option<&'static str> {
        self.states.get(id.0).map(|node| node.label)
    }

    /// Targets of `from`'s rules in evaluation order.
    pub fn transitions_from(&self, from: StateId) -> Vec<StateId> {
        self.states
            .get(from.0)
            .map(|node| node.rules.iter().map(|rule| rule.target).collect())
            .unwrap_or_default()
    }
}

impl<C> fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field(
                "states",
                &self.states.iter().map(|node| node.label).collect::<Vec<_>>(),
            )
            .field("current", &self.label(StateId(self.current)))
            .field("entry_pending", &self.entry_pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        entries: u32,
        runs: u32,
        go: bool,
        effects: Vec<&'static str>,
    }

    fn counting(ctx: &mut Counter, entry: Entry) {
        ctx.runs += 1;
        if entry.is_first() {
            ctx.entries += 1;
        }
    }

    #[test]
    fn test_empty_engine_tick_is_none() {
        let mut engine: Engine<Counter> = Engine::new();
        assert_eq!(engine.tick(&mut Counter::default()), None);
        assert_eq!(engine.current(), None);
    }

    #[test]
    fn test_action_sees_entry_once_per_visit() {
        let mut engine = Engine::new();
        let a = engine.add_state("a", counting);
        let b = engine.add_state("b", |_: &mut Counter, _| {});
        engine.add_transition(a, |c: &Counter| c.go, b).unwrap();

        let mut ctx = Counter::default();
        let first = engine.tick(&mut ctx).unwrap();
        assert!(first.first_entry);
        assert!(!first.moved());

        for _ in 0..3 {
            let report = engine.tick(&mut ctx).unwrap();
            assert!(!report.first_entry);
        }
        assert_eq!(ctx.runs, 4);
        assert_eq!(ctx.entries, 1);

        ctx.go = true;
        let report = engine.tick(&mut ctx).unwrap();
        assert_eq!(report.next, b);
        assert_eq!(engine.current(), Some(b));

        let report = engine.tick(&mut ctx).unwrap();
        assert_eq!(report.state, b);
        assert!(report.first_entry);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let mut engine = Engine::new();
        let start = engine.add_state("start", |_: &mut Counter, _| {});
        let left = engine.add_state("left", |_: &mut Counter, _| {});
        let right = engine.add_state("right", |_: &mut Counter, _| {});
        engine
            .add_transition_with(start, |_| true, left, |c: &mut Counter| c.effects.push("left"))
            .unwrap();
        engine
            .add_transition_with(start, |_| true, right, |c: &mut Counter| c.effects.push("right"))
            .unwrap();

        let mut ctx = Counter::default();
        let report = engine.tick(&mut ctx).unwrap();
        assert_eq!(report.next, left);
        assert_eq!(ctx.effects, vec!["left"]);
        assert_eq!(engine.transitions_from(start), vec![left, right]);
    }

    #[test]
    fn test_guards_run_after_action() {
        let mut engine = Engine::new();
        let a = engine.add_state("a", |c: &mut Counter, entry: Entry| {
            if entry.is_first() {
                c.go = true;
            }
        });
        let b = engine.add_state("b", |_: &mut Counter, _| {});
        engine.add_transition(a, |c: &Counter| c.go, b).unwrap();

        let mut ctx = Counter::default();
        assert_eq!(engine.tick(&mut ctx).unwrap().next, b);
    }

    #[test]
    fn test_self_transition_keeps_entry_flag_down() {
        let mut engine = Engine::new();
        let idle = engine.add_state("idle", counting);
        engine
            .add_transition_with(idle, |_| true, idle, |c: &mut Counter| c.effects.push("stay"))
            .unwrap();

        let mut ctx = Counter::default();
        engine.tick(&mut ctx);
        engine.tick(&mut ctx);
        engine.tick(&mut ctx);

        assert_eq!(ctx.entries, 1);
        assert_eq!(ctx.effects.len(), 3);
        assert_eq!(engine.current(), Some(idle));
    }

    #[test]
    fn test_effect_skipped_when_rule_does_not_fire() {
        let mut engine = Engine::new();
        let a = engine.add_state("a", |_: &mut Counter, _| {});
        let b = engine.add_state("b", |_: &mut Counter, _| {});
        engine
            .add_transition_with(a, |c: &Counter| c.go, b, |c: &mut Counter| c.effects.push("fired"))
            .unwrap();

        let mut ctx = Counter::default();
        engine.tick(&mut ctx);
        assert!(ctx.effects.is_empty());
    }

    #[test]
    fn test_unknown_state_rejected() {
        let mut engine: Engine<Counter> = Engine::new();
        let a = engine.add_state("a", |_, _| {});

        let mut other: Engine<Counter> = Engine::new();
        other.add_state("x", |_, _| {});
        let stray = other.add_state("y", |_, _| {});

        assert_eq!(
            engine.add_transition(a, |_| true, stray),
            Err(EngineError::UnknownState(stray))
        );
        assert_eq!(
            engine.add_transition(stray, |_| true, a),
            Err(EngineError::UnknownState(stray))
        );
    }
}
