use crate::wallet::{KeyRole, WalletList};
use log::warn;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use strum::AsRefStr;
use thiserror::Error;

pub const DEFAULT_AXON_PORT: &str = "8091";

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(
        "No wallets found in {}. Create a coldkey and hotkey with btcli before running this setup",
        .0.display()
    )]
    NoWallets(PathBuf),
    #[error("Invalid {role} selection: {input:?}")]
    InvalidSelection { role: KeyRole, input: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    #[default]
    Main,
    Test,
}

impl Network {
    pub fn netuid(self) -> u16 {
        match self {
            Network::Main => 27,
            Network::Test => 15,
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            Network::Main => "finney",
            Network::Test => "test",
        }
    }

    /// Only "1" and "2" are choices; everything else is `None`.
    pub fn from_choice(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Network::Main),
            "2" => Some(Network::Test),
            _ => None,
        }
    }
}

/// What the operator typed, already defaulted and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorAnswers {
    pub network: Network,
    pub network_endpoint: String,
    /// Passed through verbatim, no numeric check.
    pub axon_port: String,
    pub wallet_cold: String,
    pub wallet_hot: String,
}

struct Prompter<'a> {
    input: &'a mut dyn BufRead,
    out: &'a mut dyn Write,
}

impl Prompter<'_> {
    /// Trimmed answer; end of input reads as an empty answer.
    fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.out, "{question}")?;
        self.out.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn ask_or(&mut self, question: &str, default: &str) -> io::Result<String> {
        let answer = self.ask(&format!("{question} [{default}]: "))?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }
}

/// Wallets are enumerated before anything is asked, so a host without
/// wallets fails without prompting.
pub fn collect(
    wallets_dir: &Path,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<OperatorAnswers, CollectError> {
    let wallets = WalletList::enumerate(wallets_dir)?;
    let mut prompter = Prompter { input, out };

    writeln!(prompter.out, "Select the network to mine on:")?;
    for (choice, network) in [(1, Network::Main), (2, Network::Test)] {
        writeln!(
            prompter.out,
            "  {choice}) {} (netuid {})",
            network.as_ref(),
            network.netuid()
        )?;
    }
    let choice = prompter.ask("Network [1/2]: ")?;
    let network = Network::from_choice(&choice).unwrap_or_else(|| {
        warn!("Invalid network choice {choice:?}, using 1 (main)");
        Network::Main
    });

    let network_endpoint = prompter.ask_or("Network endpoint", network.default_endpoint())?;
    let axon_port = prompter.ask_or("Axon port", DEFAULT_AXON_PORT)?;

    writeln!(prompter.out, "Available wallets:")?;
    for (index, name) in wallets.entries() {
        writeln!(prompter.out, "  {index}) {name}")?;
    }
    let cold = prompter.ask("Coldkey wallet number: ")?;
    let wallet_cold = wallets.select(KeyRole::Coldkey, &cold)?.to_string();
    let hot = prompter.ask("Hotkey wallet number: ")?;
    let wallet_hot = wallets.select(KeyRole::Hotkey, &hot)?.to_string();

    Ok(OperatorAnswers {
        network,
        network_endpoint,
        axon_port,
        wallet_cold,
        wallet_hot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wallets(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        dir
    }

    fn run(dir: &Path, answers: &str) -> (Result<OperatorAnswers, CollectError>, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut out = Vec::new();
        let result = collect(dir, &mut input, &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_defaults_with_explicit_main_network() {
        let dir = wallets(&["alice", "bob"]);
        let (answers, _) = run(dir.path(), "1\n\n\n1\n2\n");
        assert_eq!(
            answers.unwrap(),
            OperatorAnswers {
                network: Network::Main,
                network_endpoint: "finney".into(),
                axon_port: "8091".into(),
                wallet_cold: "alice".into(),
                wallet_hot: "bob".into(),
            }
        );
    }

    #[test]
    fn test_test_network_and_overrides() {
        let dir = wallets(&["alice", "bob"]);
        let (answers, _) = run(dir.path(), "2\nws://127.0.0.1:9944\n9000\n2\n2\n");
        let answers = answers.unwrap();
        assert_eq!(answers.network.netuid(), 15);
        assert_eq!(answers.network_endpoint, "ws://127.0.0.1:9944");
        assert_eq!(answers.axon_port, "9000");
        assert_eq!(answers.wallet_cold, "bob");
        assert_eq!(answers.wallet_hot, "bob");
    }

    #[test]
    fn test_invalid_network_choice_falls_back_to_main() {
        let dir = wallets(&["alice", "bob"]);
        let (explicit, _) = run(dir.path(), "1\n\n\n1\n2\n");
        for choice in ["3", "", "main", "12", "two"] {
            let (fallback, _) = run(dir.path(), &format!("{choice}\n\n\n1\n2\n"));
            assert_eq!(fallback.unwrap(), *explicit.as_ref().unwrap());
        }
    }

    #[test]
    fn test_port_is_not_validated() {
        let dir = wallets(&["alice"]);
        let (answers, _) = run(dir.path(), "1\n\nnot-a-port\n1\n1\n");
        assert_eq!(answers.unwrap().axon_port, "not-a-port");
    }

    #[test]
    fn test_missing_wallets_fail_before_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let (result, prompted) = run(&dir.path().join("wallets"), "1\n\n\n1\n2\n");
        assert!(matches!(result, Err(CollectError::NoWallets(_))));
        assert!(prompted.is_empty());
    }

    #[test]
    fn test_invalid_hotkey_names_role() {
        let dir = wallets(&["alice", "bob"]);
        let (result, prompted) = run(dir.path(), "1\n\n\n1\n7\n");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Invalid hotkey selection: \"7\""
        );
        assert!(prompted.contains("  1) alice\n  2) bob\n"));
    }

    #[test]
    fn test_eof_reads_as_empty_answers() {
        let dir = wallets(&["alice"]);
        let (result, _) = run(dir.path(), "1\n");
        assert!(matches!(
            result,
            Err(CollectError::InvalidSelection {
                role: KeyRole::Coldkey,
                ..
            })
        ));
    }
}
