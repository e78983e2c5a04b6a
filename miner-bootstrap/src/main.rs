mod apt;
mod collect;
mod common;
mod config;
mod git;
mod gpu_host;
mod host;
mod miner;
mod operator;
mod ownership;
mod platform;
mod python;
mod runner;
mod supervisor;
#[cfg(test)]
mod testing;
mod wallet;

use clap::{Parser, Subcommand};
use cmd_lib::*;
use config::BootstrapConfig;
use host::SystemHost;
use operator::Operator;
use platform::OsRelease;
use std::io::Write;
use std::path::PathBuf;
use strum::AsRefStr;
use supervisor::InheritedEnv;

#[derive(Parser)]
#[clap(
    name = "miner-bootstrap",
    about = "Provision a GPU host and run a subnet miner under pm2"
)]
struct Opts {
    #[arg(long, global = true, help = "TOML file overriding the built-in defaults")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    stage: Stage,
}

#[derive(Subcommand, AsRefStr)]
#[strum(serialize_all = "snake_case")]
#[command(rename_all = "snake_case")]
enum Stage {
    #[clap(about = "Install docker, the NVIDIA driver stack and the CUDA toolkit, then reboot")]
    Platform {
        #[arg(long, help = "Leave the reboot to the operator")]
        no_reboot: bool,
    },
    #[clap(about = "Set up the miner checkout, ask for its settings and start it under pm2")]
    Miner,
}

#[cmd_lib::main]
fn main() -> CmdResult {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = chrono::Local::now().format("%b %d %H:%M:%S").to_string();
            let process_name = std::env::current_exe()
                .ok()
                .and_then(|path| {
                    path.file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| "miner-bootstrap".to_string());
            let pid = std::process::id();
            writeln!(
                buf,
                "{} {}[{}]: {} {}",
                timestamp,
                process_name,
                pid,
                record.level(),
                record.args()
            )
        })
        .init();

    let opts = Opts::parse();
    let stage = opts.stage.as_ref().to_string();
    let config = BootstrapConfig::load(opts.config.as_deref())?;

    let os = OsRelease::load()?;
    os.ensure_supported(&config.platform.supported_codenames)?;
    let host = SystemHost::new(vec![config.cuda.bin_dir()])?;

    match opts.stage {
        Stage::Platform { no_reboot } => gpu_host::bootstrap(&host, &os, &config, !no_reboot)?,
        Stage::Miner => {
            let operator = Operator::resolve(&host)?;
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut out = std::io::stdout();
            miner::bootstrap(
                &host,
                &config,
                &operator,
                &InheritedEnv::from_process(),
                &mut input,
                &mut out,
            )?
        }
    }

    info!("miner-bootstrap {stage} is done");
    Ok(())
}
