//! Application services and ports.

#![forbid(unsafe_code)]

mod inheritance_run;
mod inheritance_service;
mod vault_ports;

pub use inheritance_run::{
    ApplyOptions, ApplyOutcome, ApplyStatus, DEFAULT_PACING_DELAY, NoProgress, ProgressSink,
    PropagationRun, RunReport, SkipReason,
};
pub use inheritance_service::InheritanceService;
pub use vault_ports::VaultClient;
