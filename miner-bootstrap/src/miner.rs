use crate::apt;
use crate::collect::collect;
use crate::common::{home_path, TOOLKIT_PROBE};
use crate::config::BootstrapConfig;
use crate::git::{self, checkout_step};
use crate::host::Host;
use crate::operator::Operator;
use crate::ownership::ownership_step;
use crate::python::{dependencies_step, venv_step, Dependencies};
use crate::runner::{run_steps, ProvisioningStep};
use crate::supervisor::{self, pm2_step, InheritedEnv, MinerConfig};
use cmd_lib::CmdResult;
use log::info;
use std::io::{BufRead, Error, Write};

const SYSTEM_PACKAGES: &[&str] = &[
    "python3",
    "python3-venv",
    "python3-pip",
    "python3-dev",
    "build-essential",
    "git",
    "nodejs",
    "npm",
];

fn system_packages_step(host: &dyn Host) -> ProvisioningStep<'_> {
    ProvisioningStep::new(
        "system-packages",
        move || Ok(apt::missing(host, SYSTEM_PACKAGES).is_empty()),
        move || {
            let missing = apt::missing(host, SYSTEM_PACKAGES);
            apt::update(host)?;
            apt::install(host, &missing)
        },
    )
}

/// Prepare the miner checkout and its environment, ask the operator for the
/// run parameters, then hand the rendered pm2 document to pm2.
pub fn bootstrap(
    host: &dyn Host,
    config: &BootstrapConfig,
    operator: &Operator,
    inherited: &InheritedEnv,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> CmdResult {
    if host.find_command(TOOLKIT_PROBE).is_none() {
        return Err(Error::other(format!(
            "CUDA toolkit ({TOOLKIT_PROBE}) not found, run `miner-bootstrap platform` first"
        )));
    }

    let setup = &config.miner;
    let checkout = home_path(&operator.home, &setup.checkout_dir);
    let venv = home_path(&operator.home, &setup.venv_dir);
    let wallets_dir = home_path(&operator.home, &setup.wallets_dir);

    run_steps(&[
        system_packages_step(host),
        venv_step(host, operator, &setup.python, &venv),
        checkout_step(host, operator, &setup.repo_url, &checkout),
        ownership_step(host, &checkout, operator),
    ])?;

    if setup.update_checkout {
        git::pull(host, operator, &checkout)?;
    }

    let deps = Dependencies {
        checkout: &checkout,
        venv: &venv,
        manifests: &setup.requirements,
        install_editable: setup.install_editable,
    };
    run_steps(&[dependencies_step(host, operator, &deps), pm2_step(host)])?;

    let answers = collect(&wallets_dir, input, out).map_err(Error::other)?;
    let miner = MinerConfig::new(answers, setup, &checkout, &venv, &config.cuda, inherited);
    info!(
        "Mining on netuid {} via {} with wallet {}/{}",
        miner.netuid(),
        miner.network_endpoint,
        miner.wallet_cold,
        miner.wallet_hot
    );

    let document = checkout.join(&setup.document_name);
    supervisor::write_document(host, operator, &document, &miner)?;
    run_steps(&[ownership_step(host, &checkout, operator)])?;

    supervisor::launch(host, operator, &document, &miner.process_name)
}
