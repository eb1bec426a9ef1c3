//! The device restart workflow.
//!
//! Five states on top of the generic [`Engine`]:
//!
//! ```text
//! Start -> Initialize -> Authenticate -> Apply -> Cooldown
//!   |          |              |            |         |  ^
//!   +----------+--------------+------------+-> Cooldown  |  (on failure)
//!                                                    +--+  (stay while successful)
//! Cooldown -> Start once the retry wait has elapsed
//! ```
//!
//! Each working state performs its remote call once per visit and records the
//! outcome in [`WorkflowData`]. Guards only read those flags. The failure
//! fallback of every working state is registered after its happy-path rule,
//! and its effect records the failure and arms the next retry wait.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::device::{DeviceOperations, SessionToken};
use crate::workflows::backoff::{BackoffPolicy, RetryTimer};
use crate::workflows::engine::{Engine, EngineError, Entry, StateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartStep {
    Start,
    Initialize,
    Authenticate,
    Apply,
    Cooldown,
}

impl RestartStep {
    pub const ALL: [RestartStep; 5] = [
        RestartStep::Start,
        RestartStep::Initialize,
        RestartStep::Authenticate,
        RestartStep::Apply,
        RestartStep::Cooldown,
    ];

    fn label(self) -> &'static str {
        match self {
            RestartStep::Start => "start",
            RestartStep::Initialize => "initialize",
            RestartStep::Authenticate => "authenticate",
            RestartStep::Apply => "apply",
            RestartStep::Cooldown => "cooldown",
        }
    }
}

impl fmt::Display for RestartStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Progress flags, session and retry timing of the workflow.
#[derive(Debug, Clone)]
pub struct WorkflowData {
    success: bool,
    index_loaded: bool,
    initialized: bool,
    logged_in: bool,
    updated: bool,
    session: Option<SessionToken>,
    timer: RetryTimer,
}

impl WorkflowData {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            success: false,
            index_loaded: false,
            initialized: false,
            logged_in: false,
            updated: false,
            session: None,
            timer: RetryTimer::new(policy),
        }
    }

    fn clear_progress(&mut self) {
        self.success = false;
        self.index_loaded = false;
        self.initialized = false;
        self.logged_in = false;
        self.updated = false;
        self.session = None;
    }

    /// Abandon the current attempt at `now` and arm the retry wait.
    pub fn record_failure(&mut self, now: Duration) -> Duration {
        let had_updated = self.updated;
        self.clear_progress();
        let wait = self.timer.record_failure(now, had_updated);
        warn!(
            wait_ms = wait.as_millis() as u64,
            had_updated, "restart attempt failed, cooling down"
        );
        wait
    }

    pub fn mark_success(&mut self, now: Duration) {
        self.success = true;
        self.timer.record_success(now);
        info!("device configuration applied, restart cycle complete");
    }

    /// Force a fresh cycle after a completed one.
    ///
    /// Only acts when the last cycle got as far as applying its change; the
    /// next attempt is then held back until `cooldown_floor` has passed since
    /// that success. Returns whether a restart was armed.
    pub fn restart(&mut self, now: Duration) -> bool {
        if !self.updated {
            return false;
        }
        self.clear_progress();
        let wait = self.timer.rearm_after_success(now);
        info!(wait_ms = wait.as_millis() as u64, "restart requested");
        true
    }

    pub fn can_try_again(&self, now: Duration) -> bool {
        self.timer.can_try_again(now)
    }

    pub fn all_steps_done(&self) -> bool {
        self.index_loaded && self.initialized && self.logged_in && self.updated
    }

    fn usable_session(&self) -> Option<&SessionToken> {
        self.session.as_ref().filter(|token| !token.is_empty())
    }

    pub fn is_successful(&self) -> bool {
        self.success
    }

    pub fn index_loaded(&self) -> bool {
        self.index_loaded
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn updated(&self) -> bool {
        self.updated
    }

    pub fn session(&self) -> Option<&SessionToken> {
        self.session.as_ref()
    }

    pub fn timer(&self) -> &RetryTimer {
        &self.timer
    }
}

/// Everything the workflow's actions and guards can see.
#[derive(Debug)]
pub struct RestartContext<D, K> {
    data: WorkflowData,
    device: D,
    clock: K,
}

/// One tick of the restart workflow, in workflow terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTick {
    pub step: RestartStep,
    pub first_entry: bool,
    pub next: RestartStep,
}

impl StepTick {
    pub fn moved(&self) -> bool {
        self.step != self.next
    }
}

/// Snapshot for logs and status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStatus {
    pub step: RestartStep,
    pub success: bool,
    pub index_loaded: bool,
    pub initialized: bool,
    pub logged_in: bool,
    pub updated: bool,
    pub has_session: bool,
    pub wait_ms: u64,
    pub retry_in_ms: u64,
}

/// Drives a device through fetch, initialize, authenticate and apply,
/// retrying with backoff until the whole sequence succeeds.
#[derive(Debug)]
pub struct RestartController<D, K> {
    engine: Engine<RestartContext<D, K>>,
    states: [StateId; 5],
    ctx: RestartContext<D, K>,
}

impl<D, K> RestartController<D, K>
where
    D: DeviceOperations + 'static,
    K: Clock + 'static,
{
    pub fn new(device: D, clock: K, policy: BackoffPolicy) -> Result<Self, EngineError> {
        let (engine, states) = build_engine()?;
        Ok(Self {
            engine,
            states,
            ctx: RestartContext {
                data: WorkflowData::new(policy),
                device,
                clock,
            },
        })
    }

    /// Run one scheduling step of the workflow.
    pub fn tick(&mut self) -> Option<StepTick> {
        let report = self.engine.tick(&mut self.ctx)?;
        Some(StepTick {
            step: self.step_of(report.state)?,
            first_entry: report.first_entry,
            next: self.step_of(report.next)?,
        })
    }

    /// See [`WorkflowData::restart`].
    pub fn restart(&mut self) -> bool {
        let now = self.ctx.clock.now();
        self.ctx.data.restart(now)
    }

    pub fn current_step(&self) -> Option<RestartStep> {
        self.engine.current().and_then(|id| self.step_of(id))
    }

    fn step_of(&self, id: StateId) -> Option<RestartStep> {
        let position = self.states.iter().position(|state| *state == id)?;
        RestartStep::ALL.get(position).copied()
    }

    pub fn is_successful(&self) -> bool {
        self.ctx.data.is_successful()
    }

    pub fn data(&self) -> &WorkflowData {
        &self.ctx.data
    }

    pub fn device(&self) -> &D {
        &self.ctx.device
    }

    /// Targets of `step`'s transition rules in evaluation order.
    pub fn transitions_from(&self, step: RestartStep) -> Vec<RestartStep> {
        self.engine
            .transitions_from(self.states[step as usize])
            .into_iter()
            .filter_map(|id| self.step_of(id))
            .collect()
    }

    pub fn status(&self) -> WorkflowStatus {
        let data = &self.ctx.data;
        let now = self.ctx.clock.now();
        WorkflowStatus {
            step: self.current_step().unwrap_or(RestartStep::Start),
            success: data.success,
            index_loaded: data.index_loaded,
            initialized: data.initialized,
            logged_in: data.logged_in,
            updated: data.updated,
            has_session: data.usable_session().is_some(),
            wait_ms: data.timer.wait().as_millis() as u64,
            retry_in_ms: data.timer.remaining(now).as_millis() as u64,
        }
    }
}

type Built<D, K> = (Engine<RestartContext<D, K>>, [StateId; 5]);

fn build_engine<D, K>() -> Result<Built<D, K>, EngineError>
where
    D: DeviceOperations + 'static,
    K: Clock + 'static,
{
    let mut engine: Engine<RestartContext<D, K>> = Engine::new();

    let start = engine.add_state(RestartStep::Start.label(), start_action::<D, K>);
    let initialize = engine.add_state(
        RestartStep::Initialize.label(),
        initialize_action::<D, K>,
    );
    let authenticate = engine.add_state(
        RestartStep::Authenticate.label(),
        authenticate_action::<D, K>,
    );
    let apply = engine.add_state(RestartStep::Apply.label(), apply_action::<D, K>);
    let cooldown = engine.add_state(RestartStep::Cooldown.label(), cooldown_action::<D, K>);

    engine.add_transition(start, |c| c.data.index_loaded, initialize)?;
    engine.add_transition(initialize, |c| c.data.initialized, authenticate)?;
    engine.add_transition(authenticate, |c| c.data.logged_in, apply)?;
    engine.add_transition(apply, |c| c.data.updated, cooldown)?;

    // Fallbacks come after the happy-path rules above.
    for from in [start, initialize, authenticate, apply] {
        engine.add_transition_with(from, |_| true, cooldown, |c| {
            let now = c.clock.now();
            c.data.record_failure(now);
        })?;
    }

    engine.add_transition(cooldown, |c| c.data.success, cooldown)?;
    engine.add_transition(cooldown, |c| c.data.can_try_again(c.clock.now()), start)?;

    Ok((engine, [start, initialize, authenticate, apply, cooldown]))
}

fn start_action<D: DeviceOperations, K: Clock>(ctx: &mut RestartContext<D, K>, entry: Entry) {
    if !entry.is_first() {
        return;
    }
    match ctx.device.fetch_root() {
        Ok(token) => {
            info!(session_empty = token.is_empty(), "device root loaded");
            ctx.data.session = Some(token);
            ctx.data.index_loaded = true;
        }
        Err(err) => {
            warn!(error = %err, "fetching device root failed");
            ctx.data.session = None;
        }
    }
}

fn initialize_action<D: DeviceOperations, K: Clock>(ctx: &mut RestartContext<D, K>, entry: Entry) {
    if !entry.is_first() {
        return;
    }
    let Some(token) = ctx.data.usable_session() else {
        warn!("no session token, cannot initialize");
        return;
    };
    match ctx.device.initialize_session(token) {
        Ok(()) => {
            info!("device session initialized");
            ctx.data.initialized = true;
        }
        Err(err) => warn!(error = %err, "initializing session failed"),
    }
}

fn authenticate_action<D: DeviceOperations, K: Clock>(ctx: &mut RestartContext<D, K>, entry: Entry) {
    if !entry.is_first() {
        return;
    }
    let Some(token) = ctx.data.usable_session() else {
        warn!("no session token, cannot authenticate");
        return;
    };
    match ctx.device.authenticate(token) {
        Ok(()) => {
            info!("logged in to device");
            ctx.data.logged_in = true;
        }
        Err(err) => warn!(error = %err, "authentication failed"),
    }
}

fn apply_action<D: DeviceOperations, K: Clock>(ctx: &mut RestartContext<D, K>, entry: Entry) {
    if !entry.is_first() {
        return;
    }
    let Some(token) = ctx.data.session.as_ref() else {
        warn!("no session token, cannot apply configuration");
        return;
    };
    match ctx.device.apply_configuration(token) {
        Ok(()) => {
            info!("configuration update accepted");
            ctx.data.updated = true;
            if ctx.data.all_steps_done() {
                let now = ctx.clock.now();
                ctx.data.mark_success(now);
            }
        }
        Err(err) => warn!(error = %err, "applying configuration failed"),
    }
}

fn cooldown_action<D, K: Clock>(ctx: &mut RestartContext<D, K>, entry: Entry) {
    if entry.is_first() {
        debug!(
            success = ctx.data.success,
            retry_in_ms = ctx.data.timer.remaining(ctx.clock.now()).as_millis() as u64,
            "cooling down"
        );
    }
}
