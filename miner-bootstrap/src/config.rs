use log::info;
use serde::Deserialize;
use std::io::Error;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub platform: PlatformConfig,
    pub cuda: CudaConfig,
    pub miner: MinerSetupConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub supported_codenames: Vec<String>,
    /// Explicit NVIDIA driver package; `ubuntu-drivers install` picks one when unset.
    pub driver_package: Option<String>,
    pub cuda_toolkit_package: String,
    pub reboot: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            supported_codenames: vec!["focal".into(), "jammy".into(), "noble".into()],
            driver_package: None,
            cuda_toolkit_package: "cuda-toolkit-12-4".into(),
            reboot: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CudaConfig {
    pub home: PathBuf,
}

impl Default for CudaConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from("/usr/local/cuda"),
        }
    }
}

impl CudaConfig {
    pub fn bin_dir(&self) -> PathBuf {
        self.home.join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.home.join("lib64")
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MinerSetupConfig {
    pub repo_url: String,
    pub checkout_dir: PathBuf,
    pub venv_dir: PathBuf,
    pub wallets_dir: PathBuf,
    pub python: String,
    pub requirements: Vec<String>,
    pub install_editable: bool,
    pub entrypoint: String,
    pub process_name: String,
    pub document_name: String,
    pub extra_args: Vec<String>,
    pub update_checkout: bool,
}

impl Default for MinerSetupConfig {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/neuralinternet/compute-subnet.git".into(),
            checkout_dir: PathBuf::from("compute-subnet"),
            venv_dir: PathBuf::from(".venvs/compute-subnet"),
            wallets_dir: PathBuf::from(".bittensor/wallets"),
            python: "python3".into(),
            requirements: vec!["requirements.txt".into()],
            install_editable: true,
            entrypoint: "neurons/miner.py".into(),
            process_name: "subnet27-miner".into(),
            document_name: "pm2.config.json".into(),
            extra_args: Vec::new(),
            update_checkout: false,
        }
    }
}

impl BootstrapConfig {
    /// Defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        info!("Loading bootstrap config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::other(format!("Could not read config {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::other(format!("TOML parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BootstrapConfig::parse("").unwrap();
        assert_eq!(config.platform.supported_codenames, ["focal", "jammy", "noble"]);
        assert!(config.platform.reboot);
        assert_eq!(config.cuda.bin_dir(), PathBuf::from("/usr/local/cuda/bin"));
        assert_eq!(config.miner.document_name, "pm2.config.json");
        assert!(!config.miner.update_checkout);
    }

    #[test]
    fn test_partial_sections_keep_remaining_defaults() {
        let config = BootstrapConfig::parse(
            r#"
[platform]
driver_package = "nvidia-driver-550"
reboot = false

[miner]
requirements = ["requirements.txt", "requirements-compute.txt"]
update_checkout = true
"#,
        )
        .unwrap();
        assert_eq!(
            config.platform.driver_package.as_deref(),
            Some("nvidia-driver-550")
        );
        assert!(!config.platform.reboot);
        assert_eq!(config.platform.cuda_toolkit_package, "cuda-toolkit-12-4");
        assert_eq!(config.miner.requirements.len(), 2);
        assert!(config.miner.update_checkout);
        assert_eq!(config.miner.entrypoint, "neurons/miner.py");
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let err = BootstrapConfig::parse("[miner\nrepo_url = 1").unwrap_err();
        assert!(err.to_string().starts_with("TOML parse error"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(BootstrapConfig::load(Some(&missing)).is_err());
        assert!(BootstrapConfig::load(None).is_ok());
    }
}
