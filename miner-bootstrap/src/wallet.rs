use crate::collect::CollectError;
use std::io::ErrorKind;
use std::path::Path;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum KeyRole {
    Coldkey,
    Hotkey,
}

/// Wallets found on disk, addressed by 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletList {
    names: Vec<String>,
}

impl WalletList {
    /// Sorted non-hidden entries of `dir`. An absent or empty directory is
    /// terminal: the operator has to create wallets first.
    pub fn enumerate(dir: &Path) -> Result<Self, CollectError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CollectError::NoWallets(dir.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Err(CollectError::NoWallets(dir.to_path_buf()));
        }
        names.sort();
        Ok(Self { names })
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (i + 1, name.as_str()))
    }

    /// Resolve the operator's answer for `role`; anything that is not a
    /// listed index is rejected.
    pub fn select(&self, role: KeyRole, input: &str) -> Result<&str, CollectError> {
        let invalid = || CollectError::InvalidSelection {
            role,
            input: input.to_string(),
        };
        let wanted = input.trim();
        self.entries()
            .find(|(index, _)| index.to_string() == wanted)
            .map(|(_, name)| name)
            .ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallets_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::create_dir_all(dir.path().join(name).join("hotkeys")).unwrap();
        }
        dir
    }

    #[test]
    fn test_enumerate_sorts_and_skips_hidden() {
        let dir = wallets_dir(&["bob", "alice", ".cache"]);
        let wallets = WalletList::enumerate(dir.path()).unwrap();
        assert_eq!(
            wallets.entries().collect::<Vec<_>>(),
            vec![(1, "alice"), (2, "bob")]
        );
    }

    #[test]
    fn test_enumerate_absent_or_empty_dir() {
        let dir = wallets_dir(&[]);
        assert!(matches!(
            WalletList::enumerate(dir.path()),
            Err(CollectError::NoWallets(_))
        ));
        assert!(matches!(
            WalletList::enumerate(&dir.path().join("wallets")),
            Err(CollectError::NoWallets(_))
        ));
    }

    #[test]
    fn test_select_resolves_exact_names() {
        let dir = wallets_dir(&["alice", "bob"]);
        let wallets = WalletList::enumerate(dir.path()).unwrap();
        assert_eq!(wallets.select(KeyRole::Coldkey, "1").unwrap(), "alice");
        assert_eq!(wallets.select(KeyRole::Hotkey, " 2 ").unwrap(), "bob");
        // nothing stops both roles from using the same wallet
        assert_eq!(wallets.select(KeyRole::Hotkey, "1").unwrap(), "alice");
    }

    #[test]
    fn test_select_rejects_unlisted_indices_naming_role() {
        let dir = wallets_dir(&["alice", "bob"]);
        let wallets = WalletList::enumerate(dir.path()).unwrap();
        for input in ["0", "3", "-1", "", "alice", "1.5", "+1", "01"] {
            let err = wallets.select(KeyRole::Hotkey, input).unwrap_err();
            assert!(
                err.to_string().starts_with("Invalid hotkey selection"),
                "{input:?} gave {err}"
            );
        }
        let err = wallets.select(KeyRole::Coldkey, "9").unwrap_err();
        assert_eq!(err.to_string(), "Invalid coldkey selection: \"9\"");
    }
}
