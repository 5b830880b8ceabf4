//! Configuration management for the transfer loop
//!
//! Loads configuration from a TOML file with environment variable substitution.
//! Placeholders take the form `${VAR}` or `${VAR:-default}`.

use crate::error::{PingPongError, PingPongResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::U256;
use ethers::utils::parse_ether;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub rpc: RpcConfig,
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
pub struct AccountsConfig {
    pub private_key_a: String,
    pub private_key_b: String,
}

// Keys stay out of debug output.
impl std::fmt::Debug for AccountsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountsConfig")
            .field("private_key_a", &"<redacted>")
            .field("private_key_b", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Amount per transfer, decimal string in ether
    pub amount_eth: String,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            amount_eth: "0.01".to_string(),
            min_delay_secs: 1.0,
            max_delay_secs: 30.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    /// 0 disables receipt waiting
    pub wait_for_confirmations: u64,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            wait_for_confirmations: 1,
            timeout_secs: 120,
            poll_interval_secs: 2,
        }
    }
}

impl ConfirmationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9102,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Settings {
    /// Load settings from the file named by `PINGPONG_CONFIG`, or `config/default.toml`
    pub fn load() -> PingPongResult<Self> {
        let config_path = env::var("PINGPONG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> PingPongResult<Self> {
        let config_str = std::fs::read_to_string(config_path).map_err(|e| {
            PingPongError::Config(format!(
                "Failed to read config file {:?}: {}",
                config_path, e
            ))
        })?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text, substituting environment variables first
    pub fn parse(raw: &str) -> PingPongResult<Self> {
        let config_str = substitute_env_vars(raw);

        let settings: Settings = toml::from_str(&config_str)
            .map_err(|e| PingPongError::Config(format!("Failed to parse configuration: {}", e)))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> PingPongResult<()> {
        if self.rpc.url.trim().is_empty() {
            return Err(PingPongError::Config("rpc.url (RPC_URL) is not set".to_string()));
        }
        if self.accounts.private_key_a.trim().is_empty()
            || self.accounts.private_key_b.trim().is_empty()
        {
            return Err(PingPongError::Config(
                "accounts.private_key_a and accounts.private_key_b (PRIVATE_KEY_A, PRIVATE_KEY_B) must be set"
                    .to_string(),
            ));
        }

        let (wallet_a, wallet_b) = self.wallets()?;
        if wallet_a.address() == wallet_b.address() {
            return Err(PingPongError::Config(
                "accounts A and B must use different keys".to_string(),
            ));
        }

        if self.amount_wei()?.is_zero() {
            return Err(PingPongError::Config("transfer.amount_eth must be non-zero".to_string()));
        }

        let transfer = &self.transfer;
        if !(transfer.min_delay_secs >= 0.0 && transfer.min_delay_secs <= transfer.max_delay_secs)
        {
            return Err(PingPongError::Config(format!(
                "invalid delay range {}-{} sec",
                transfer.min_delay_secs, transfer.max_delay_secs
            )));
        }

        if self.confirmation.wait_for_confirmations > 0 && self.confirmation.poll_interval_secs == 0
        {
            return Err(PingPongError::Config(
                "confirmation.poll_interval_secs must be non-zero".to_string(),
            ));
        }

        if self.rpc.request_timeout_secs == 0 {
            return Err(PingPongError::Config(
                "rpc.request_timeout_secs must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse both signing keys
    pub fn wallets(&self) -> PingPongResult<(LocalWallet, LocalWallet)> {
        Ok((
            parse_wallet("A", &self.accounts.private_key_a)?,
            parse_wallet("B", &self.accounts.private_key_b)?,
        ))
    }

    /// Transfer amount in wei
    pub fn amount_wei(&self) -> PingPongResult<U256> {
        parse_ether(self.transfer.amount_eth.trim()).map_err(|e| {
            PingPongError::Config(format!(
                "Invalid transfer.amount_eth {:?}: {}",
                self.transfer.amount_eth, e
            ))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.request_timeout_secs)
    }
}

fn parse_wallet(label: &str, key: &str) -> PingPongResult<LocalWallet> {
    // The parse error is reported without echoing the key.
    key.trim()
        .parse::<LocalWallet>()
        .map_err(|_| PingPongError::Config(format!("Invalid private key for account {}", label)))
}

/// Substitute environment variables in the format ${VAR_NAME} or ${VAR_NAME:-default}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("valid regex");
    }

    ENV_VAR
        .replace_all(input, |cap: &regex::Captures| {
            let fallback = cap.get(2).map(|m| m.as_str()).unwrap_or_default();
            match env::var(&cap[1]) {
                Ok(value) if !value.is_empty() => value,
                _ => fallback.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY_A: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn minimal_config(key_a: &str, key_b: &str) -> String {
        format!(
            r#"
[rpc]
url = "http://127.0.0.1:8545"

[accounts]
private_key_a = "{}"
private_key_b = "{}"
"#,
            key_a, key_b
        )
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("PINGPONG_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${PINGPONG_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_env_var_default_used_when_unset() {
        env::remove_var("PINGPONG_TEST_UNSET");
        let result = substitute_env_vars("amount_eth = \"${PINGPONG_TEST_UNSET:-0.01}\"");
        assert_eq!(result, "amount_eth = \"0.01\"");

        let result = substitute_env_vars("url = \"${PINGPONG_TEST_UNSET}\"");
        assert_eq!(result, "url = \"\"");
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::parse(&minimal_config(KEY_A, KEY_B)).unwrap();

        assert_eq!(settings.transfer.amount_eth, "0.01");
        assert_eq!(settings.transfer.min_delay_secs, 1.0);
        assert_eq!(settings.transfer.max_delay_secs, 30.0);
        assert_eq!(settings.confirmation.wait_for_confirmations, 1);
        assert_eq!(settings.confirmation.timeout(), Duration::from_secs(120));
        assert_eq!(settings.confirmation.poll_interval(), Duration::from_secs(2));
        assert_eq!(settings.rpc.request_timeout_secs, 30);
        assert!(!settings.metrics.enabled);
        assert_eq!(
            settings.amount_wei().unwrap(),
            U256::from(10_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_missing_rpc_url_rejected() {
        let raw = minimal_config(KEY_A, KEY_B).replace("http://127.0.0.1:8545", "");
        let err = Settings::parse(&raw).unwrap_err();
        assert!(matches!(err, PingPongError::Config(_)));
    }

    #[test]
    fn test_identical_keys_rejected() {
        let err = Settings::parse(&minimal_config(KEY_A, KEY_A)).unwrap_err();
        assert!(err.to_string().contains("different keys"));
    }

    #[test]
    fn test_invalid_key_not_echoed() {
        let err = Settings::parse(&minimal_config("not-a-key", KEY_B)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("account A"));
        assert!(!message.contains("not-a-key"));
    }

    #[test]
    fn test_inverted_delay_range_rejected() {
        let raw = format!(
            "{}\n[transfer]\namount_eth = \"0.5\"\nmin_delay_secs = 10.0\nmax_delay_secs = 2.0\n",
            minimal_config(KEY_A, KEY_B)
        );
        let err = Settings::parse(&raw).unwrap_err();
        assert!(err.to_string().contains("delay range"));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let raw = format!(
            "{}\n[transfer]\namount_eth = \"0\"\nmin_delay_secs = 1\nmax_delay_secs = 2\n",
            minimal_config(KEY_A, KEY_B)
        );
        assert!(Settings::parse(&raw).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}\n[confirmation]\nwait_for_confirmations = 0\ntimeout_secs = 60\npoll_interval_secs = 1\n",
            minimal_config(KEY_A, KEY_B)
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.confirmation.wait_for_confirmations, 0);
        assert_eq!(settings.confirmation.timeout_secs, 60);
    }

    #[test]
    fn test_debug_output_redacts_keys() {
        let settings = Settings::parse(&minimal_config(KEY_A, KEY_B)).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains(KEY_A));
        assert!(debug.contains("<redacted>"));
    }
}
