// Property-Based Testing for the restart workflow
// Tests timing and transition invariants under arbitrary device behaviour

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use device_restarter::workflows::RetryTimer;
use device_restarter::{
    BackoffPolicy, DeviceError, DeviceOperations, ManualClock, Operation, RestartController,
    RestartStep, SessionToken,
};
use proptest::prelude::*;

/// Device whose successive calls succeed or fail according to a script
#[derive(Debug)]
struct ScriptDevice {
    script: RefCell<VecDeque<bool>>,
}

impl ScriptDevice {
    fn new(script: Vec<bool>) -> Self {
        Self {
            script: RefCell::new(script.into()),
        }
    }

    fn next(&self, operation: Operation) -> Result<(), DeviceError> {
        match self.script.borrow_mut().pop_front() {
            Some(false) => Err(DeviceError::UnexpectedStatus {
                operation,
                status: 500,
            }),
            _ => Ok(()),
        }
    }
}

impl DeviceOperations for ScriptDevice {
    fn fetch_root(&self) -> Result<SessionToken, DeviceError> {
        self.next(Operation::FetchRoot)?;
        Ok(SessionToken::new("token"))
    }

    fn initialize_session(&self, _token: &SessionToken) -> Result<(), DeviceError> {
        self.next(Operation::InitializeSession)
    }

    fn authenticate(&self, _token: &SessionToken) -> Result<(), DeviceError> {
        self.next(Operation::Authenticate)
    }

    fn apply_configuration(&self, _token: &SessionToken) -> Result<(), DeviceError> {
        self.next(Operation::ApplyConfiguration)
    }
}

fn legal(from: RestartStep, to: RestartStep) -> bool {
    use RestartStep::*;
    matches!(
        (from, to),
        (Start, Initialize)
            | (Initialize, Authenticate)
            | (Authenticate, Apply)
            | (Start | Initialize | Authenticate | Apply, Cooldown)
            | (Cooldown, Cooldown)
            | (Cooldown, Start)
    )
}

fn policy_strategy() -> impl Strategy<Value = BackoffPolicy> {
    (100u64..10_000, 1.0f64..4.0, 2u64..50, 1_000u64..600_000).prop_map(
        |(initial, multiplier, span, floor)| BackoffPolicy {
            initial_wait: Duration::from_millis(initial),
            multiplier,
            max_wait: Duration::from_millis(initial * span),
            cooldown_floor: Duration::from_millis(floor),
        },
    )
}

proptest! {
    #[test]
    fn prop_ordinary_waits_stay_within_bounds(
        policy in policy_strategy(),
        gaps in prop::collection::vec(0u64..100_000, 1..60),
    ) {
        let mut timer = RetryTimer::new(policy);
        let mut now = Duration::ZERO;
        for gap in gaps {
            now += Duration::from_millis(gap);
            let wait = timer.record_failure(now, false);
            prop_assert!(wait >= policy.initial_wait);
            prop_assert!(wait < policy.max_wait);
        }
    }

    #[test]
    fn prop_failure_after_apply_never_cuts_floor_short(
        policy in policy_strategy(),
        success_at in 0u64..1_000_000,
        elapsed in 0u64..1_000_000,
    ) {
        let mut timer = RetryTimer::new(policy);
        timer.record_success(Duration::from_millis(success_at));
        let failed_at = Duration::from_millis(success_at + elapsed);
        let wait = timer.record_failure(failed_at, true);

        let since_success = Duration::from_millis(elapsed);
        if since_success < policy.cooldown_floor {
            prop_assert_eq!(since_success + wait, policy.cooldown_floor);
        } else {
            prop_assert_eq!(wait, policy.initial_wait);
        }
    }

    #[test]
    fn prop_workflow_transitions_stay_legal(
        script in prop::collection::vec(any::<bool>(), 0..80),
        advances in prop::collection::vec(0u64..20_000, 1..200),
    ) {
        let clock = ManualClock::new();
        let policy = BackoffPolicy::default();
        let mut sm = RestartController::new(ScriptDevice::new(script), clock.clone(), policy).unwrap();

        for advance in advances {
            clock.advance(Duration::from_millis(advance));
            let before = sm.current_step();
            let tick = sm.tick().unwrap();

            prop_assert_eq!(before, Some(tick.step));
            prop_assert_eq!(sm.current_step(), Some(tick.next));
            prop_assert!(legal(tick.step, tick.next), "{:?} -> {:?}", tick.step, tick.next);

            let status = sm.status();
            if status.success {
                prop_assert_eq!(status.step, RestartStep::Cooldown);
                prop_assert!(status.index_loaded && status.initialized && status.logged_in && status.updated);
            } else if tick.next == RestartStep::Cooldown {
                prop_assert!(!status.index_loaded && !status.initialized);
                prop_assert!(!status.logged_in && !status.updated);
                prop_assert!(status.wait_ms < policy.max_wait.as_millis() as u64);
            }
        }
    }
}
