use thiserror::Error;

use crate::host::HostHandle;

/// Failure reported by a [`Host`](crate::Host) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host node {handle} missing")]
    Missing { handle: HostHandle },
    #[error("host node {child} is not a child of {parent}")]
    NotAChild {
        parent: HostHandle,
        child: HostHandle,
    },
    #[error("host rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
}

/// Errors surfaced by [`FiberRoot::run_slice`](crate::FiberRoot::run_slice).
///
/// Host failures abort the pass that triggered them; the host tree is left in
/// whatever state the host reached. Hook violations are authoring errors in a
/// component and are reported instead of silently misattributing slots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FiberError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("component `{component}` read state slot {slot} as `{expected}`, but the slot holds another type")]
    StateType {
        component: &'static str,
        slot: usize,
        expected: &'static str,
    },
    #[error("component `{component}` changed the dependency count of effect slot {slot} from {previous} to {current}")]
    DependencyLength {
        component: &'static str,
        slot: usize,
        previous: usize,
        current: usize,
    },
}
