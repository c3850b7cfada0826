//! Kubernetes resource builders for chaos workers
//!
//! Each worker runs as a DaemonSet so that one pumba instance lives on every
//! node and can reach the target container through the node's runtime socket.

use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

use super::worker::Worker;

/// Label marking pumba daemon sets; also used to tell them apart from
/// ordinary daemon sets when listing
pub const PUMBA_LABEL: &str = "com.gaiaadm.pumba";

/// Default pumba image
pub const DEFAULT_PUMBA_IMAGE: &str = "gaiaadm/pumba";

/// Default container runtime socket on the host
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

const SOCKET_VOLUME: &str = "dockersocket";

/// Image and host socket used by chaos daemon sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumbaSettings {
    pub image: String,
    pub socket_path: String,
}

impl Default for PumbaSettings {
    fn default() -> Self {
        Self {
            image: DEFAULT_PUMBA_IMAGE.to_string(),
            socket_path: DEFAULT_DOCKER_SOCKET.to_string(),
        }
    }
}

/// Name of the daemon set backing a worker
pub fn daemon_set_name(worker: &Worker) -> String {
    format!("resilience-pumba-{}", worker.id())
}

fn selector_labels(name: &str) -> BTreeMap<String, String> {
    [("app".to_string(), name.to_string())].into_iter().collect()
}

fn pumba_labels(name: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(name);
    labels.insert(PUMBA_LABEL.to_string(), "true".to_string());
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        "resilia".to_string(),
    );
    labels
}

/// Create the DaemonSet spec running `worker` against its target pod
pub fn create_pumba_daemon_set(worker: &Worker, settings: &PumbaSettings) -> DaemonSet {
    let name = daemon_set_name(worker);
    let container_name = format!(
        "resilience-pumba-{}-container-{}",
        worker.mode(),
        worker.id()
    );
    let labels = pumba_labels(&name);

    DaemonSet {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(selector_labels(&name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(name),
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: container_name,
                        image: Some(settings.image.clone()),
                        args: Some(worker.to_args()),
                        volume_mounts: Some(vec![VolumeMount {
                            name: SOCKET_VOLUME.to_string(),
                            mount_path: settings.socket_path.clone(),
                            read_only: Some(false),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: SOCKET_VOLUME.to_string(),
                        host_path: Some(HostPathVolumeSource {
                            path: settings.socket_path.clone(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaos::{PauseOptions, WorkerMode, WorkerOption};

    fn pause_worker() -> Worker {
        Worker::new(
            "pod-a",
            "20s",
            WorkerMode::Pause,
            [WorkerOption::pause(PauseOptions {
                duration: "10s".to_string(),
            })],
        )
    }

    #[test]
    fn test_daemon_set_names_derive_from_worker_id() {
        let worker = pause_worker();
        let ds = create_pumba_daemon_set(&worker, &PumbaSettings::default());

        let expected = format!("resilience-pumba-{}", worker.id());
        assert_eq!(ds.metadata.name.as_deref(), Some(expected.as_str()));

        let spec = ds.spec.unwrap();
        assert_eq!(
            spec.selector.match_labels.unwrap().get("app"),
            Some(&expected)
        );

        let pod = spec.template.spec.unwrap();
        assert_eq!(
            pod.containers[0].name,
            format!("resilience-pumba-pause-container-{}", worker.id())
        );
    }

    #[test]
    fn test_container_runs_worker_args_with_socket_mounted() {
        let worker = pause_worker();
        let settings = PumbaSettings {
            image: "registry.local/pumba:0.9".to_string(),
            socket_path: "/run/containerd/containerd.sock".to_string(),
        };
        let ds = create_pumba_daemon_set(&worker, &settings);
        let pod = ds.spec.unwrap().template.spec.unwrap();
        let container = &pod.containers[0];

        assert_eq!(container.image.as_deref(), Some("registry.local/pumba:0.9"));
        assert_eq!(container.args.as_ref(), Some(&worker.to_args()));

        let mount = &container.volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.mount_path, "/run/containerd/containerd.sock");
        assert_ne!(mount.read_only, Some(true));

        let volume = &pod.volumes.unwrap()[0];
        assert_eq!(volume.name, mount.name);
        assert_eq!(
            volume.host_path.as_ref().map(|h| h.path.as_str()),
            Some("/run/containerd/containerd.sock")
        );
    }

    #[test]
    fn test_template_is_labelled_as_pumba() {
        let ds = create_pumba_daemon_set(&pause_worker(), &PumbaSettings::default());
        let labels = ds.spec.unwrap().template.metadata.unwrap().labels.unwrap();
        assert_eq!(labels.get(PUMBA_LABEL).map(String::as_str), Some("true"));
        assert_eq!(
            ds.metadata.labels.unwrap().get(PUMBA_LABEL).map(String::as_str),
            Some("true")
        );
    }
}
