use crate::common::OS_RELEASE_PATH;
use log::info;
use std::collections::HashMap;
use std::io::Error;

/// The fields of `/etc/os-release` the provisioner branches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub version_id: String,
    pub codename: String,
}

impl OsRelease {
    pub fn load() -> Result<Self, Error> {
        let content = std::fs::read_to_string(OS_RELEASE_PATH)
            .map_err(|e| Error::other(format!("Could not read {OS_RELEASE_PATH}: {e}")))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let fields: HashMap<&str, String> = content
            .lines()
            .filter_map(|line| line.trim().split_once('='))
            .map(|(k, v)| (k.trim(), unquote(v.trim())))
            .collect();
        let field = |key: &str| fields.get(key).cloned().unwrap_or_default();
        let mut codename = field("VERSION_CODENAME");
        if codename.is_empty() {
            codename = field("UBUNTU_CODENAME");
        }
        Self {
            id: field("ID"),
            version_id: field("VERSION_ID"),
            codename,
        }
    }

    /// Refuses anything but Linux running one of the listed Ubuntu releases.
    pub fn ensure_supported(&self, codenames: &[String]) -> Result<(), Error> {
        if std::env::consts::OS != "linux" {
            return Err(Error::other(format!(
                "Unsupported operating system: {}",
                std::env::consts::OS
            )));
        }
        if self.id != "ubuntu" || !codenames.iter().any(|c| c == &self.codename) {
            return Err(Error::other(format!(
                "Unsupported platform {} {} ({}), supported ubuntu releases: {}",
                self.id,
                self.version_id,
                self.codename,
                codenames.join(", ")
            )));
        }
        info!(
            "Detected supported platform {} {} ({})",
            self.id, self.version_id, self.codename
        );
        Ok(())
    }

    /// Distro segment of NVIDIA repository URLs, e.g. `ubuntu2204`.
    pub fn nvidia_distro(&self) -> String {
        format!("{}{}", self.id, self.version_id.replace('.', ""))
    }
}

/// CUDA repository architecture for a dpkg architecture.
pub fn cuda_repo_arch(dpkg_arch: &str) -> Result<&'static str, Error> {
    match dpkg_arch.trim() {
        "amd64" => Ok("x86_64"),
        "arm64" => Ok("sbsa"),
        other => Err(Error::other(format!(
            "Unsupported architecture for the CUDA repository: {other}"
        ))),
    }
}

fn unquote(value: &str) -> String {
    value.trim_matches(|c| c == '"' || c == '\'').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAMMY: &str = r#"PRETTY_NAME="Ubuntu 22.04.4 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
VERSION="22.04.4 LTS (Jammy Jellyfish)"
VERSION_CODENAME=jammy
ID=ubuntu
ID_LIKE=debian
UBUNTU_CODENAME=jammy
"#;

    fn supported() -> Vec<String> {
        vec!["focal".into(), "jammy".into(), "noble".into()]
    }

    #[test]
    fn test_parse_ubuntu_os_release() {
        let os = OsRelease::parse(JAMMY);
        assert_eq!(os.id, "ubuntu");
        assert_eq!(os.version_id, "22.04");
        assert_eq!(os.codename, "jammy");
        assert_eq!(os.nvidia_distro(), "ubuntu2204");
    }

    #[test]
    fn test_codename_falls_back_to_ubuntu_codename() {
        let os = OsRelease::parse("ID=ubuntu\nVERSION_ID=\"20.04\"\nUBUNTU_CODENAME=focal\n");
        assert_eq!(os.codename, "focal");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_ensure_supported() {
        assert!(OsRelease::parse(JAMMY).ensure_supported(&supported()).is_ok());

        let debian = OsRelease::parse("ID=debian\nVERSION_ID=\"12\"\nVERSION_CODENAME=bookworm\n");
        let err = debian.ensure_supported(&supported()).unwrap_err();
        assert!(err.to_string().contains("Unsupported platform debian"));

        let bionic = OsRelease::parse("ID=ubuntu\nVERSION_ID=\"18.04\"\nVERSION_CODENAME=bionic\n");
        assert!(bionic.ensure_supported(&supported()).is_err());
    }

    #[test]
    fn test_cuda_repo_arch() {
        assert_eq!(cuda_repo_arch("amd64\n").unwrap(), "x86_64");
        assert_eq!(cuda_repo_arch("arm64").unwrap(), "sbsa");
        assert!(cuda_repo_arch("riscv64").is_err());
    }
}
