//! Chaos engineering module for Resilia
//!
//! Builds pumba workers and runs them against live pods:
//! - Network emulation (delay, loss, rate, duplicate, corrupt)
//! - Container pause

mod daemonset;
mod runner;
mod types;
mod worker;

pub use daemonset::{
    create_pumba_daemon_set, daemon_set_name, PumbaSettings, DEFAULT_DOCKER_SOCKET,
    DEFAULT_PUMBA_IMAGE, PUMBA_LABEL,
};
#[cfg(test)]
pub use runner::MockWorkerRunner;
pub use runner::{PumbaRunner, WorkerRunner};
pub use types::*;
pub use worker::{Worker, POD_NAME_LABEL};
