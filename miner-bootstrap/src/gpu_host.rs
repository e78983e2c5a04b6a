use crate::apt;
use crate::common::*;
use crate::config::{BootstrapConfig, CudaConfig, PlatformConfig};
use crate::host::{Command, Host, RunAs};
use crate::platform::{cuda_repo_arch, OsRelease};
use crate::runner::{run_steps, ProvisioningStep};
use cmd_lib::CmdResult;
use log::info;
use std::path::{Path, PathBuf};

const DOCKER_KEYRING: &str = "/etc/apt/keyrings/docker.asc";
const DOCKER_PACKAGES: &[&str] = &[
    "docker-ce",
    "docker-ce-cli",
    "containerd.io",
    "docker-buildx-plugin",
    "docker-compose-plugin",
];
const NVIDIA_CTK_KEYRING: &str = "/usr/share/keyrings/nvidia-container-toolkit-keyring.gpg";
const NVIDIA_CTK_GPGKEY_URL: &str = "https://nvidia.github.io/libnvidia-container/gpgkey";

fn root(host: &dyn Host, cmd: Command) -> CmdResult {
    host.run(RunAs::Root, &cmd)
}

/// Runs `f` inside a fresh `mktemp -d` directory that is removed afterwards,
/// also when `f` fails.
fn with_scratch_dir(host: &dyn Host, f: impl FnOnce(&Path) -> CmdResult) -> CmdResult {
    let dir = host.output(
        RunAs::Root,
        &Command::new("mktemp").args(["-d", "-t", "miner-bootstrap.XXXXXX"]),
    )?;
    let dir = PathBuf::from(dir.trim());
    let result = f(&dir);
    let cleanup = root(host, Command::new("rm").arg("-rf").path_arg(&dir));
    result.and(cleanup)
}

fn present(host: &dyn Host, probe: &str) -> Result<bool, std::io::Error> {
    Ok(host.find_command(probe).is_some())
}

fn install_docker(host: &dyn Host, os: &OsRelease) -> CmdResult {
    apt::update(host)?;
    apt::install(host, &["ca-certificates", "curl", "gnupg"])?;
    root(host, Command::new("install").args(["-m", "0755", "-d", APT_KEYRINGS_DIR]))?;
    root(
        host,
        Command::new("curl").args([
            "-fsSL",
            "https://download.docker.com/linux/ubuntu/gpg",
            "-o",
            DOCKER_KEYRING,
        ]),
    )?;
    root(host, Command::new("chmod").args(["a+r", DOCKER_KEYRING]))?;

    let arch = apt::dpkg_architecture(host)?;
    let codename = &os.codename;
    let source = format!(
        "deb [arch={arch} signed-by={DOCKER_KEYRING}] https://download.docker.com/linux/ubuntu {codename} stable\n"
    );
    host.write_file(
        RunAs::Root,
        &Path::new(APT_SOURCES_DIR).join("docker.list"),
        &source,
    )?;

    apt::update(host)?;
    apt::install(host, DOCKER_PACKAGES)?;
    root(host, Command::new("systemctl").args(["enable", "--now", "docker"]))
}

fn install_driver(host: &dyn Host, platform: &PlatformConfig) -> CmdResult {
    apt::update(host)?;
    match &platform.driver_package {
        Some(package) => apt::install(host, &[package.as_str()]),
        None => {
            apt::install(host, &["ubuntu-drivers-common"])?;
            info!("Letting ubuntu-drivers pick the NVIDIA driver");
            root(host, Command::new("ubuntu-drivers").arg("install"))
        }
    }
}

fn install_container_toolkit(host: &dyn Host) -> CmdResult {
    with_scratch_dir(host, |scratch| {
        let gpgkey = scratch.join("nvidia-container-toolkit.gpgkey");
        root(
            host,
            Command::new("curl")
                .args(["-fsSL", NVIDIA_CTK_GPGKEY_URL, "-o"])
                .path_arg(&gpgkey),
        )?;
        root(
            host,
            Command::new("gpg")
                .args(["--batch", "--yes", "--dearmor", "-o", NVIDIA_CTK_KEYRING])
                .path_arg(&gpgkey),
        )
    })?;
    // apt expands $(ARCH) itself
    let source = format!(
        "deb [signed-by={NVIDIA_CTK_KEYRING}] https://nvidia.github.io/libnvidia-container/stable/deb/$(ARCH) /\n"
    );
    host.write_file(
        RunAs::Root,
        &Path::new(APT_SOURCES_DIR).join("nvidia-container-toolkit.list"),
        &source,
    )?;

    apt::update(host)?;
    apt::install(host, &["nvidia-container-toolkit"])?;
    root(
        host,
        Command::new("nvidia-ctk").args(["runtime", "configure", "--runtime=docker"]),
    )?;
    root(host, Command::new("systemctl").args(["restart", "docker"]))
}

fn cuda_profile(cuda: &CudaConfig) -> String {
    let bin = cuda.bin_dir();
    let lib = cuda.lib_dir();
    format!(
        r##"export PATH={}${{PATH:+:${{PATH}}}}
export LD_LIBRARY_PATH={}${{LD_LIBRARY_PATH:+:${{LD_LIBRARY_PATH}}}}
"##,
        bin.display(),
        lib.display()
    )
}

fn install_cuda_toolkit(host: &dyn Host, os: &OsRelease, config: &BootstrapConfig) -> CmdResult {
    let arch = cuda_repo_arch(&apt::dpkg_architecture(host)?)?;
    let distro = os.nvidia_distro();
    let keyring_url = format!(
        "https://developer.download.nvidia.com/compute/cuda/repos/{distro}/{arch}/cuda-keyring_1.1-1_all.deb"
    );
    with_scratch_dir(host, |scratch| {
        let deb = scratch.join("cuda-keyring.deb");
        root(
            host,
            Command::new("curl")
                .args(["-fsSL", keyring_url.as_str(), "-o"])
                .path_arg(&deb),
        )?;
        root(host, Command::new("dpkg").arg("-i").path_arg(&deb))
    })?;

    apt::update(host)?;
    apt::install(host, &[config.platform.cuda_toolkit_package.as_str()])?;
    host.write_file(
        RunAs::Root,
        Path::new(CUDA_PROFILE_SCRIPT),
        &cuda_profile(&config.cuda),
    )
}

/// Install the container runtime, NVIDIA driver stack and CUDA toolkit. The
/// host is rebooted only when something was installed.
pub fn bootstrap(
    host: &dyn Host,
    os: &OsRelease,
    config: &BootstrapConfig,
    allow_reboot: bool,
) -> CmdResult {
    info!("Bootstrapping GPU platform on {} ({})", os.version_id, os.codename);

    let report = run_steps(&[
        ProvisioningStep::new(
            "docker",
            || present(host, "docker"),
            || install_docker(host, os),
        ),
        ProvisioningStep::new(
            "nvidia-driver",
            || present(host, "nvidia-smi"),
            || install_driver(host, &config.platform),
        ),
        ProvisioningStep::new(
            "nvidia-container-toolkit",
            || present(host, "nvidia-ctk"),
            || install_container_toolkit(host),
        ),
        ProvisioningStep::new(
            "cuda-toolkit",
            || present(host, TOOLKIT_PROBE),
            || install_cuda_toolkit(host, os, config),
        ),
    ])?;

    if !report.changed() {
        info!("GPU platform is already provisioned, nothing to do");
        return Ok(());
    }
    info!("Installed: {}", report.applied.join(", "));

    if !(allow_reboot && config.platform.reboot) {
        info!("Reboot skipped, reboot before running `miner-bootstrap miner`");
        return Ok(());
    }
    info!("Rebooting to load the NVIDIA driver");
    root(host, Command::new("shutdown").args(["-r", "now"]))
}
