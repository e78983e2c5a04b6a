use crate::common::DEPS_STAMP_FILE;
use crate::host::{Command, Host, RunAs};
use crate::operator::Operator;
use crate::runner::ProvisioningStep;
use log::info;
use sha2::{Digest, Sha256};
use std::io::Error;
use std::path::{Path, PathBuf};

pub fn venv_python(venv: &Path) -> PathBuf {
    venv.join("bin").join("python")
}

pub fn venv_step<'a>(
    host: &'a dyn Host,
    operator: &'a Operator,
    python: &'a str,
    venv: &'a Path,
) -> ProvisioningStep<'a> {
    ProvisioningStep::new(
        "runtime-environment",
        move || Ok(venv_python(venv).exists()),
        move || {
            info!("Creating python environment {}", venv.display());
            host.run(
                RunAs::Operator(operator),
                &Command::new(python).args(["-m", "venv"]).path_arg(venv),
            )
        },
    )
}

/// SHA-256 over every manifest's name and content, in order.
pub fn manifest_digest(checkout: &Path, manifests: &[String]) -> Result<String, Error> {
    let mut hasher = Sha256::new();
    for manifest in manifests {
        let path = checkout.join(manifest);
        let content = std::fs::read(&path).map_err(|e| {
            Error::other(format!(
                "Missing dependency manifest {}: {e}",
                path.display()
            ))
        })?;
        hasher.update(manifest.as_bytes());
        hasher.update([0u8]);
        hasher.update(&content);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub struct Dependencies<'a> {
    pub checkout: &'a Path,
    pub venv: &'a Path,
    pub manifests: &'a [String],
    pub install_editable: bool,
}

impl Dependencies<'_> {
    fn stamp_path(&self) -> PathBuf {
        self.venv.join(DEPS_STAMP_FILE)
    }

    fn is_current(&self) -> Result<bool, Error> {
        let digest = manifest_digest(self.checkout, self.manifests)?;
        Ok(std::fs::read_to_string(self.stamp_path())
            .map(|stamp| stamp.trim() == digest)
            .unwrap_or(false))
    }

    fn install(&self, host: &dyn Host, operator: &Operator) -> cmd_lib::CmdResult {
        let digest = manifest_digest(self.checkout, self.manifests)?;
        let python = venv_python(self.venv).display().to_string();
        let pip = || {
            Command::new(python.as_str())
                .args(["-m", "pip", "install"])
                .current_dir(self.checkout)
        };
        let who = RunAs::Operator(operator);

        host.run(who, &pip().args(["--upgrade", "pip"]))?;
        for manifest in self.manifests {
            info!("Installing dependencies from {manifest}");
            host.run(who, &pip().args(["-r", manifest.as_str()]))?;
        }
        if self.install_editable {
            host.run(who, &pip().args(["-e", "."]))?;
        }
        host.write_file(who, &self.stamp_path(), &format!("{digest}\n"))
    }
}

pub fn dependencies_step<'a>(
    host: &'a dyn Host,
    operator: &'a Operator,
    deps: &'a Dependencies<'a>,
) -> ProvisioningStep<'a> {
    ProvisioningStep::new(
        "dependencies",
        move || deps.is_current(),
        move || deps.install(host, operator),
    )
}
