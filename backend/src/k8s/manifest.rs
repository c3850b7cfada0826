//! Typed manifests decoded from raw suite resources

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

use crate::models::ResourceKind;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to decode {kind} manifest: {source}")]
    Decode {
        kind: ResourceKind,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{kind} manifest declares {found}, expected {expected}")]
    TypeMismatch {
        kind: ResourceKind,
        expected: String,
        found: String,
    },
    #[error("{kind} manifest has no metadata.name")]
    MissingName { kind: ResourceKind },
}

/// A decoded cluster object ready to be created
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Deployment(Deployment),
    Service(Service),
    DaemonSet(DaemonSet),
}

impl Manifest {
    /// Decode raw manifest bytes as an object of `kind`.
    ///
    /// Accepts YAML and JSON. The body must be a mapping whose `apiVersion`
    /// and `kind` name the object type backing `kind`.
    pub fn parse(kind: ResourceKind, raw: &[u8]) -> Result<Self, ManifestError> {
        let manifest = match kind {
            ResourceKind::Deployment => Manifest::Deployment(decode(kind, raw)?),
            ResourceKind::Service => Manifest::Service(decode(kind, raw)?),
            ResourceKind::DaemonSet | ResourceKind::ChaosDaemonSet => {
                Manifest::DaemonSet(decode(kind, raw)?)
            }
        };
        Ok(manifest)
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Manifest::Deployment(d) => &d.metadata,
            Manifest::Service(s) => &s.metadata,
            Manifest::DaemonSet(ds) => &ds.metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Manifest::Deployment(d) => &mut d.metadata,
            Manifest::Service(s) => &mut s.metadata,
            Manifest::DaemonSet(ds) => &mut ds.metadata,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata().name.as_deref().filter(|n| !n.is_empty())
    }

    /// Resolve the object name, falling back to `fallback` when the manifest
    /// carries none. The resolved name is written back into the manifest.
    pub fn resolve_name(
        &mut self,
        kind: ResourceKind,
        fallback: &str,
    ) -> Result<String, ManifestError> {
        if let Some(name) = self.name() {
            return Ok(name.to_string());
        }
        if fallback.is_empty() {
            return Err(ManifestError::MissingName { kind });
        }
        self.metadata_mut().name = Some(fallback.to_string());
        Ok(fallback.to_string())
    }
}

fn decode<K>(kind: ResourceKind, raw: &[u8]) -> Result<K, ManifestError>
where
    K: k8s_openapi::Resource + DeserializeOwned,
{
    let decode_err = |source| ManifestError::Decode { kind, source };
    let value: Value = serde_yaml::from_slice(raw).map_err(decode_err)?;

    let api_version = type_field(&value, "apiVersion");
    let object_kind = type_field(&value, "kind");
    if api_version != K::API_VERSION || object_kind != K::KIND {
        let found = match (api_version, object_kind) {
            ("", "") => "no apiVersion/kind".to_string(),
            (v, k) => format!("{v}/{k}"),
        };
        return Err(ManifestError::TypeMismatch {
            kind,
            expected: format!("{}/{}", K::API_VERSION, K::KIND),
            found,
        });
    }

    serde_yaml::from_value(value).map_err(decode_err)
}

fn type_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}
