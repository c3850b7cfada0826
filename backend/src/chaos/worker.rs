//! Chaos worker definition and pumba argument serialization

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::types::*;

/// Label key pumba uses to select the target container by pod name
pub const POD_NAME_LABEL: &str = "io.kubernetes.pod.name";

/// Immutable description of a recurring chaos action against one pod
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Worker {
    id: String,
    target: String,
    interval: String,
    variant: ChaosVariant,
}

impl Worker {
    /// Build a worker for `target`, running every `interval`.
    ///
    /// `mode` picks the starting variant; each option then replaces it in order,
    /// so the last option applied decides the final mode.
    pub fn new(
        target: impl Into<String>,
        interval: impl Into<String>,
        mode: WorkerMode,
        options: impl IntoIterator<Item = WorkerOption>,
    ) -> Self {
        let variant = options
            .into_iter()
            .fold(ChaosVariant::for_mode(mode), |_, option| option.into_variant());

        Self {
            id: generate_worker_id(),
            target: target.into(),
            interval: interval.into(),
            variant,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn mode(&self) -> WorkerMode {
        self.variant.mode()
    }

    pub fn variant(&self) -> &ChaosVariant {
        &self.variant
    }

    /// Serialize into the pumba argument vector. Order is positional for the
    /// pumba CLI and must not change.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--log-level".to_string(),
            "info".to_string(),
            "--label".to_string(),
            format!("{}={}", POD_NAME_LABEL, self.target),
            "--interval".to_string(),
            self.interval.clone(),
            self.mode().to_string(),
        ];

        match &self.variant {
            ChaosVariant::NetworkEmulation { command, options } => {
                args.push(command.to_string());
                args.extend(["--duration".to_string(), options.duration.clone()]);
                args.extend(["--tc-image".to_string(), options.tc_image.clone()]);
                push_flag(&mut args, "-i", options.interface.as_deref());
                push_flag(&mut args, "-t", options.target_ip_filter.as_deref());
                push_flag(&mut args, "--percent", options.loss_percent.as_deref());
            }
            ChaosVariant::Pause { options } => {
                push_flag(&mut args, "-d", Some(options.duration.as_str()));
            }
        }

        args
    }
}

fn push_flag(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
}

/// Decimal form of the leading 32 bits of a random UUID; short and DNS-safe
fn generate_worker_id() -> String {
    Uuid::new_v4().as_fields().0.to_string()
}
