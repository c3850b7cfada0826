//! Chaos worker types and option groups

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Command mode of a chaos worker, as understood by the pumba CLI
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    /// Network emulation (`tc netem`)
    Netem,
    /// Pause all processes of the target container
    Pause,
}

impl std::fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerMode::Netem => write!(f, "netem"),
            WorkerMode::Pause => write!(f, "pause"),
        }
    }
}

impl std::str::FromStr for WorkerMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "netem" => Ok(WorkerMode::Netem),
            "pause" => Ok(WorkerMode::Pause),
            _ => Err(format!("Unknown worker mode: {}", s)),
        }
    }
}

/// Network emulation sub-commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum NetEmCommand {
    /// Delay egress traffic
    #[default]
    Delay,
    /// Add packet losses
    Loss,
    /// Add packet losses, based on a 4-state Markov probability model
    LossState,
    /// Add packet losses, according to the Gilbert-Elliot loss model
    #[serde(rename = "loss-gemodel")]
    LossGeModel,
    /// Limit egress traffic
    Rate,
    /// Add packet duplication
    Duplicate,
    /// Add packet corruption
    Corrupt,
}

impl std::fmt::Display for NetEmCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetEmCommand::Delay => write!(f, "delay"),
            NetEmCommand::Loss => write!(f, "loss"),
            NetEmCommand::LossState => write!(f, "loss-state"),
            NetEmCommand::LossGeModel => write!(f, "loss-gemodel"),
            NetEmCommand::Rate => write!(f, "rate"),
            NetEmCommand::Duplicate => write!(f, "duplicate"),
            NetEmCommand::Corrupt => write!(f, "corrupt"),
        }
    }
}

/// Options for network emulation workers
///
/// Durations carry a unit suffix (`ms`, `s`, `m`, `h`) and are passed through
/// verbatim. The emulation duration should be shorter than the worker interval.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, ToSchema)]
pub struct NetEmOptions {
    /// Image with `tc` available (e.g. "gaiadocker/iproute2")
    pub tc_image: String,
    /// Network emulation duration
    pub duration: String,
    /// Network interface to apply the emulation on
    #[serde(default)]
    pub interface: Option<String>,
    /// Target IP filter; supports multiple IPs and CIDR notation
    #[serde(default)]
    pub target_ip_filter: Option<String>,
    /// Try to pull the tc image
    #[serde(default)]
    pub pull_image: bool,
    /// Loss percentage for the loss command
    #[serde(default)]
    pub loss_percent: Option<String>,
}

/// Options for pause workers
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, ToSchema)]
pub struct PauseOptions {
    /// Pause duration; must be shorter than the worker interval
    #[serde(default)]
    pub duration: String,
}

/// Mode-specific configuration of a worker. Exactly one group exists at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ChaosVariant {
    #[serde(rename = "netem")]
    NetworkEmulation {
        command: NetEmCommand,
        options: NetEmOptions,
    },
    Pause {
        options: PauseOptions,
    },
}

impl ChaosVariant {
    /// Variant with default options for the given mode
    pub fn for_mode(mode: WorkerMode) -> Self {
        match mode {
            WorkerMode::Netem => ChaosVariant::NetworkEmulation {
                command: NetEmCommand::default(),
                options: NetEmOptions::default(),
            },
            WorkerMode::Pause => ChaosVariant::Pause {
                options: PauseOptions::default(),
            },
        }
    }

    pub fn mode(&self) -> WorkerMode {
        match self {
            ChaosVariant::NetworkEmulation { .. } => WorkerMode::Netem,
            ChaosVariant::Pause { .. } => WorkerMode::Pause,
        }
    }
}

/// A configuration step applied while building a worker.
///
/// Steps are applied in order and each replaces the whole variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerOption {
    Netem {
        command: NetEmCommand,
        #[serde(default)]
        options: NetEmOptions,
    },
    Pause(PauseOptions),
}

impl WorkerOption {
    pub fn net_em(command: NetEmCommand, options: NetEmOptions) -> Self {
        WorkerOption::Netem { command, options }
    }

    pub fn pause(options: PauseOptions) -> Self {
        WorkerOption::Pause(options)
    }

    pub(crate) fn into_variant(self) -> ChaosVariant {
        match self {
            WorkerOption::Netem { command, options } => {
                ChaosVariant::NetworkEmulation { command, options }
            }
            WorkerOption::Pause(options) => ChaosVariant::Pause { options },
        }
    }
}
