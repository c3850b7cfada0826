//! Load suite resources from a manifest directory
//!
//! Layout:
//! ```text
//! <dir>/deployments/<name>.yaml
//! <dir>/services/<name>.yaml      (optional, paired with the deployment file)
//! <dir>/daemon_sets/<name>.yaml   (optional)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::{ResourceKind, Suite};

pub const DEPLOYMENTS_DIR: &str = "deployments";
pub const SERVICES_DIR: &str = "services";
pub const DAEMON_SETS_DIR: &str = "daemon_sets";

/// Declare every manifest under `dir` on `suite`.
///
/// Each deployment is followed by the service sharing its file name, if any,
/// so a workload and its service are applied back to back. Files are visited in
/// name order. Returns the number of declared resources.
pub fn load_manifest_dir(suite: &mut Suite, dir: &Path) -> Result<usize> {
    let mut declared = 0;

    for path in yaml_files(&dir.join(DEPLOYMENTS_DIR))? {
        declare(suite, &path, ResourceKind::Deployment)?;
        declared += 1;

        let Some(file_name) = path.file_name() else {
            continue;
        };
        let service = dir.join(SERVICES_DIR).join(file_name);
        if service.is_file() {
            declare(suite, &service, ResourceKind::Service)?;
            declared += 1;
        } else {
            debug!(deployment = %path.display(), "Deployment has no service");
        }
    }

    for path in yaml_files(&dir.join(DAEMON_SETS_DIR))? {
        declare(suite, &path, ResourceKind::DaemonSet)?;
        declared += 1;
    }

    Ok(declared)
}

fn declare(suite: &mut Suite, path: &Path, kind: ResourceKind) -> Result<()> {
    let value = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    suite.add_resource(name, kind, value);
    Ok(())
}

/// `*.yaml` files directly under `dir`, sorted; a missing directory is empty
fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
