//! pm2 application declaration for the miner and its launch.
//!
//! The document is produced with `serde_json`, so wallet names, endpoints and
//! paths are escaped by the serializer and arguments stay separate array
//! elements instead of one shell-split string.

use crate::collect::{Network, OperatorAnswers};
use crate::config::{CudaConfig, MinerSetupConfig};
use crate::host::{Command, Host, RunAs};
use crate::operator::Operator;
use crate::python::venv_python;
use crate::runner::ProvisioningStep;
use cmd_lib::CmdResult;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Error;
use std::path::{Path, PathBuf};

pub const SUPERVISOR: &str = "pm2";

/// PATH and LD_LIBRARY_PATH inherited from the provisioning process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritedEnv {
    pub path: Option<String>,
    pub ld_library_path: Option<String>,
}

impl InheritedEnv {
    pub fn from_process() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            path: var("PATH"),
            ld_library_path: var("LD_LIBRARY_PATH"),
        }
    }
}

/// Everything needed to run the miner, fixed once the operator has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerConfig {
    pub network: Network,
    pub network_endpoint: String,
    pub wallet_cold: String,
    pub wallet_hot: String,
    pub axon_port: String,
    pub process_name: String,
    pub working_directory: PathBuf,
    pub entrypoint: String,
    pub interpreter_path: PathBuf,
    pub extra_args: Vec<String>,
    pub extra_env: BTreeMap<String, String>,
}

impl MinerConfig {
    pub fn new(
        answers: OperatorAnswers,
        setup: &MinerSetupConfig,
        checkout: &Path,
        venv: &Path,
        cuda: &CudaConfig,
        inherited: &InheritedEnv,
    ) -> Self {
        let mut path = format!(
            "{}:{}",
            venv.join("bin").display(),
            cuda.bin_dir().display()
        );
        let mut ld_library_path = cuda.lib_dir().display().to_string();
        for (value, extra) in [
            (&mut path, &inherited.path),
            (&mut ld_library_path, &inherited.ld_library_path),
        ] {
            if let Some(extra) = extra {
                value.push(':');
                value.push_str(extra);
            }
        }
        let extra_env = BTreeMap::from([
            ("LD_LIBRARY_PATH".to_string(), ld_library_path),
            ("PATH".to_string(), path),
        ]);

        Self {
            network: answers.network,
            network_endpoint: answers.network_endpoint,
            wallet_cold: answers.wallet_cold,
            wallet_hot: answers.wallet_hot,
            axon_port: answers.axon_port,
            process_name: setup.process_name.clone(),
            working_directory: checkout.to_path_buf(),
            entrypoint: setup.entrypoint.clone(),
            interpreter_path: venv_python(venv),
            extra_args: setup.extra_args.clone(),
            extra_env,
        }
    }

    pub fn netuid(&self) -> u16 {
        self.network.netuid()
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--netuid".to_string(),
            self.netuid().to_string(),
            "--subtensor.network".to_string(),
            self.network_endpoint.clone(),
            "--wallet.name".to_string(),
            self.wallet_cold.clone(),
            "--wallet.hotkey".to_string(),
            self.wallet_hot.clone(),
            "--axon.port".to_string(),
            self.axon_port.clone(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[derive(Debug, Serialize)]
pub struct SupervisorDocument {
    pub apps: Vec<SupervisorProcessSpec>,
}

#[derive(Debug, Serialize)]
pub struct SupervisorProcessSpec {
    pub name: String,
    pub cwd: PathBuf,
    pub script: String,
    pub interpreter: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl From<&MinerConfig> for SupervisorProcessSpec {
    fn from(config: &MinerConfig) -> Self {
        Self {
            name: config.process_name.clone(),
            cwd: config.working_directory.clone(),
            script: config.entrypoint.clone(),
            interpreter: config.interpreter_path.clone(),
            args: config.args(),
            env: config.extra_env.clone(),
        }
    }
}

/// Same config, same bytes.
pub fn render(config: &MinerConfig) -> Result<String, Error> {
    let document = SupervisorDocument {
        apps: vec![config.into()],
    };
    let mut rendered = serde_json::to_string_pretty(&document)
        .map_err(|e| Error::other(format!("Could not render pm2 document: {e}")))?;
    rendered.push('\n');
    Ok(rendered)
}

/// Overwrites whatever document was there before.
pub fn write_document(
    host: &dyn Host,
    operator: &Operator,
    path: &Path,
    config: &MinerConfig,
) -> CmdResult {
    let document = render(config)?;
    info!("Writing pm2 document {}", path.display());
    host.write_file(RunAs::Operator(operator), path, &document)
}

pub fn pm2_step(host: &dyn Host) -> ProvisioningStep<'_> {
    ProvisioningStep::new(
        "process-supervisor",
        move || Ok(host.find_command(SUPERVISOR).is_some()),
        move || {
            host.run(
                RunAs::Root,
                &Command::new("npm").args(["install", "-g", SUPERVISOR]),
            )
        },
    )
}

pub fn launch(host: &dyn Host, operator: &Operator, document: &Path, name: &str) -> CmdResult {
    info!("Starting {name} under pm2");
    host.run(
        RunAs::Operator(operator),
        &Command::new(SUPERVISOR)
            .arg("startOrRestart")
            .path_arg(document),
    )
    .map_err(|e| Error::other(format!("pm2 could not start {name}: {e}")))?;
    info!("{name} is running, follow its output with `pm2 logs {name}`");
    Ok(())
}
