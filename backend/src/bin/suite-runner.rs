//! Run a suite from a manifest directory, pause a matching pod on a schedule
//! and tear everything down on Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use resilia_backend::{
    chaos::{PauseOptions, PumbaRunner, PumbaSettings, Worker, WorkerMode, WorkerOption},
    k8s::{K8sClient, ResourceGateway},
    models::Suite,
    suite::{loader, MemoryTracker, SuiteEngine},
};

#[derive(Parser, Debug)]
#[command(name = "suite-runner")]
struct Args {
    /// Directory holding `deployments/`, `services/` and `daemon_sets/`
    #[arg(long, default_value = "files")]
    manifests: PathBuf,

    /// Kubeconfig path; inferred when omitted
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<String>,

    #[arg(long, default_value = "default")]
    namespace: String,

    /// Substring of the pod name to target
    #[arg(long, default_value = "redis")]
    target: String,

    /// How often the pause is repeated
    #[arg(long, default_value = "20s")]
    interval: String,

    /// How long each pause lasts
    #[arg(long, default_value = "10s")]
    duration: String,

    #[arg(long, default_value = "gaiaadm/pumba")]
    chaos_image: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let k8s = Arc::new(K8sClient::connect(args.kubeconfig.as_deref(), &args.namespace).await?);
    let settings = PumbaSettings {
        image: args.chaos_image.clone(),
        ..PumbaSettings::default()
    };
    let runner = Arc::new(PumbaRunner::new(k8s.clone(), settings));
    let engine = SuiteEngine::new(k8s.clone(), runner, Arc::new(MemoryTracker::new()));

    let mut suite = Suite::new("suite-runner");
    let declared = loader::load_manifest_dir(&mut suite, &args.manifests)
        .with_context(|| format!("failed to load manifests from {}", args.manifests.display()))?;
    tracing::info!(declared, suite_id = %suite.id, "Loaded manifests");

    let outcome = tokio::select! {
        result = run(&engine, &mut suite, k8s.as_ref(), &args) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted before chaos started");
            Ok(())
        }
    };
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "Suite run failed");
    } else {
        tracing::info!("Chaos running, press Ctrl-C to tear down");
        tokio::signal::ctrl_c().await?;
    }

    match engine.stop(&mut suite).await {
        Ok(report) => tracing::info!(
            deleted = report.deleted,
            already_gone = report.already_gone,
            failures = report.failures.len(),
            "Suite torn down"
        ),
        Err(e) => tracing::error!(error = %e, causes = ?e.causes(), "Teardown incomplete"),
    }

    outcome
}

async fn run(
    engine: &SuiteEngine,
    suite: &mut Suite,
    gateway: &dyn ResourceGateway,
    args: &Args,
) -> Result<()> {
    engine.run_declared_resources(suite).await?;

    let pod = wait_for_pod(gateway, &args.target).await;
    tracing::info!(pod = %pod, "Target pod found");

    suite.add_worker(Worker::new(
        pod,
        args.interval.clone(),
        WorkerMode::Pause,
        [WorkerOption::pause(PauseOptions {
            duration: args.duration.clone(),
        })],
    ));
    engine.run_chaos_workers(suite).await?;
    Ok(())
}

/// Poll pods once a second until one whose name contains `needle` shows up
async fn wait_for_pod(gateway: &dyn ResourceGateway, needle: &str) -> String {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        match gateway.list_pods().await {
            Ok(pods) => {
                if let Some(pod) = pods.into_iter().find(|p| p.contains(needle)) {
                    return pod;
                }
                tracing::info!(needle, "No matching pod yet, waiting ...");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to list pods"),
        }
    }
}
