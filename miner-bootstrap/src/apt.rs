use crate::host::{Command, Host, RunAs};
use cmd_lib::CmdResult;
use log::info;

fn apt_get() -> Command {
    Command::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
}

pub fn update(host: &dyn Host) -> CmdResult {
    info!("Refreshing apt package index");
    host.run(RunAs::Root, &apt_get().args(["update", "-y"]))
}

pub fn install(host: &dyn Host, packages: &[&str]) -> CmdResult {
    info!("Installing packages: {}", packages.join(" "));
    host.run(
        RunAs::Root,
        &apt_get().args(["install", "-y"]).args(packages.iter().copied()),
    )
}

pub fn is_installed(host: &dyn Host, package: &str) -> bool {
    host.output(
        RunAs::Root,
        &Command::new("dpkg-query").args(["-W", "--showformat=${Status}", package]),
    )
    .map(|status| status.trim() == "install ok installed")
    .unwrap_or(false)
}

pub fn missing<'p>(host: &dyn Host, packages: &[&'p str]) -> Vec<&'p str> {
    packages
        .iter()
        .copied()
        .filter(|p| !is_installed(host, p))
        .collect()
}

pub fn dpkg_architecture(host: &dyn Host) -> Result<String, std::io::Error> {
    host.output(
        RunAs::Root,
        &Command::new("dpkg").arg("--print-architecture"),
    )
    .map(|arch| arch.trim().to_string())
}
