#![doc = r"Incremental tree reconciliation with a cooperative scheduler and hooks."]

mod collections;
mod commit;
pub mod config;
pub mod element;
pub mod error;
pub mod hash;
pub mod hooks;
pub mod host;
pub mod platform;
mod reconciler;
pub mod runtime;
mod scheduler;
pub mod work;

pub use commit::CommitReport;
pub use config::FiberConfig;
pub use element::{
    create_element, create_text_element, h, AttrValue, Child, ComponentFn, Element, ElementKind,
    Listener, Props, TEXT_VALUE,
};
pub use error::{FiberError, HostError};
pub use hooks::{use_effect, use_state, Cleanup, Dependencies, Setter};
pub use host::{Host, HostHandle, HostKind, HostOp, MemoryHost, MemoryNode};
pub use platform::{Deadline, IdleScheduler, ManualScheduler, StepBudget, Unbounded};
pub use runtime::{Runtime, RuntimeHandle};
pub use scheduler::{FiberRoot, SliceOutcome};
pub use work::{MutationTag, WorkId, WorkKind, WorkNode, WorkTree};

pub type Key = u64;
