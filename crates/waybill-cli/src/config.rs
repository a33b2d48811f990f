use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use serde::Deserialize;
use waybill_core::{ArtifactBundle, ArtifactResolver, ConfirmationPolicy, ForgeOutDir};

pub const CONFIG_FILE: &str = "waybill.toml";

/// Project configuration file structure (waybill.toml)
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Compiled artifacts: a standard-JSON bundle file or a Foundry `out/` directory
    #[serde(default = "default_artifacts")]
    pub artifacts: PathBuf,
    /// Directory holding one `<chainId>.json` ledger per chain
    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: PathBuf,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    /// Network name -> RPC URL, either literal or a whole-value `${VAR}`
    #[serde(default)]
    pub networks: BTreeMap<String, RpcEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// RPC endpoint can be a string or an object with url field
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RpcEndpoint {
    Url(String),
    Object { url: String },
}

impl RpcEndpoint {
    pub fn url(&self) -> &str {
        match self {
            RpcEndpoint::Url(url) => url,
            RpcEndpoint::Object { url } => url,
        }
    }
}

fn default_artifacts() -> PathBuf {
    PathBuf::from("out/dapp.sol.json")
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_confirmations() -> u64 {
    1
}

fn default_timeout_secs() -> u64 {
    ConfirmationPolicy::DEFAULT_TIMEOUT.as_secs()
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            confirmations: default_confirmations(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ConfirmationConfig {
    pub fn policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy::new(self.confirmations, Duration::from_secs(self.timeout_secs))
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            artifacts: default_artifacts(),
            ledger_dir: default_ledger_dir(),
            confirmation: ConfirmationConfig::default(),
            networks: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    /// Load waybill.toml from the current directory, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", CONFIG_FILE);
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("Could not read {}: {}", path.display(), e))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| eyre!("Invalid {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// RPC URL of a named network. A value of the form `${VAR}` is read from
    /// the environment.
    pub fn network_url(&self, name: &str) -> Result<String> {
        let endpoint = self.networks.get(name).ok_or_else(|| {
            eyre!(
                "Network '{}' not found in {} [networks] (known: {})",
                name,
                CONFIG_FILE,
                self.network_names().join(", ")
            )
        })?;

        resolve_env_var(endpoint.url())
    }

    /// Pick the RPC endpoint: `--network` wins over `--rpc-url` / ETH_RPC_URL
    pub fn rpc_url(&self, network: Option<&str>, rpc_url: Option<&str>) -> Result<String> {
        match (network, rpc_url) {
            (Some(name), _) => self.network_url(name),
            (None, Some(url)) => Ok(url.to_string()),
            (None, None) => Err(eyre!(
                "No RPC endpoint. Pass --rpc-url, set ETH_RPC_URL, or use --network <name>"
            )),
        }
    }

    /// Get all network names defined in waybill.toml
    pub fn network_names(&self) -> Vec<&str> {
        self.networks.keys().map(|s| s.as_str()).collect()
    }

    /// Open the configured artifact source
    pub fn artifact_resolver(&self) -> Result<Box<dyn ArtifactResolver>> {
        if self.artifacts.is_dir() {
            return Ok(Box::new(ForgeOutDir::with_dir(self.artifacts.clone())));
        }
        let bundle = ArtifactBundle::load(&self.artifacts)?;
        Ok(Box::new(bundle))
    }
}

/// Resolve environment variable references in a string.
///
/// Only a whole-value `${VAR_NAME}` is substituted. A reference embedded in a
/// longer value (`https://host/${KEY}`) is rejected rather than sent literally.
fn resolve_env_var(value: &str) -> Result<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).map_err(|_| eyre!("Environment variable '{}' not set", var_name))
    } else if value.contains("${") {
        Err(eyre!(
            "'{}' embeds a ${{VAR}} reference; set the whole URL as \"${{VAR}}\" instead",
            value
        ))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_project_config() {
        let toml_content = r#"
artifacts = "out/dapp.sol.json"
ledger_dir = "deployments"

[confirmation]
confirmations = 3
timeout_secs = 120

[networks]
mainnet = "https://eth.llamarpc.com"
goerli = "${GOERLI_RPC_URL}"
"#;

        let config: ProjectConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.ledger_dir, PathBuf::from("deployments"));
        assert_eq!(
            config.confirmation.policy(),
            ConfirmationPolicy::new(3, Duration::from_secs(120))
        );
        assert!(config.networks.contains_key("goerli"));
        assert_eq!(
            config.networks.get("mainnet").unwrap().url(),
            "https://eth.llamarpc.com"
        );
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: ProjectConfig = toml::from_str("").unwrap();

        assert_eq!(config.artifacts, PathBuf::from("out/dapp.sol.json"));
        assert_eq!(config.ledger_dir, PathBuf::from("."));
        assert_eq!(config.confirmation.policy(), ConfirmationPolicy::default());
        assert!(config.networks.is_empty());
    }

    #[test]
    fn test_partial_confirmation_section() {
        let config: ProjectConfig = toml::from_str("[confirmation]\nconfirmations = 2\n").unwrap();
        assert_eq!(config.confirmation.confirmations, 2);
        assert_eq!(config.confirmation.timeout_secs, 600);
    }

    #[test]
    fn test_network_url_from_env() {
        std::env::set_var("WAYBILL_TEST_RPC_URL", "https://rpc.test.xyz");

        let toml_content = r#"
[networks]
testnet = "${WAYBILL_TEST_RPC_URL}"
"#;

        let config: ProjectConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.network_url("testnet").unwrap(), "https://rpc.test.xyz");

        std::env::remove_var("WAYBILL_TEST_RPC_URL");
    }

    #[test]
    fn test_network_not_found() {
        let config: ProjectConfig =
            toml::from_str("[networks]\nmainnet = \"https://eth.rpc\"\n").unwrap();
        assert!(config.network_url("nonexistent").is_err());
    }

    #[test]
    fn test_rpc_endpoint_object_format() {
        let toml_content = r#"
[networks]
mainnet = { url = "https://eth.rpc.xyz" }
"#;

        let config: ProjectConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(
            config.networks.get("mainnet").unwrap().url(),
            "https://eth.rpc.xyz"
        );
    }

    #[test]
    fn test_rpc_url_precedence() {
        let config: ProjectConfig =
            toml::from_str("[networks]\nlocal = \"http://localhost:8545\"\n").unwrap();

        assert_eq!(
            config.rpc_url(Some("local"), Some("http://other:8545")).unwrap(),
            "http://localhost:8545"
        );
        assert_eq!(
            config.rpc_url(None, Some("http://other:8545")).unwrap(),
            "http://other:8545"
        );
        assert!(config.rpc_url(None, None).is_err());
    }

    #[test]
    fn test_resolve_env_var_literal() {
        let result = resolve_env_var("https://literal.url").unwrap();
        assert_eq!(result, "https://literal.url");
    }

    #[test]
    fn test_resolve_env_var_embedded_reference() {
        let err = resolve_env_var("https://eth.rpc.xyz/${WAYBILL_TEST_KEY}").unwrap_err();
        assert!(err.to_string().contains("embeds"));
    }

    #[test]
    fn test_resolve_env_var_missing() {
        let result = resolve_env_var("${NONEXISTENT_VAR_99999}");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "ledger_dir = \"ledgers\"\n").unwrap();

        let config = ProjectConfig::load_from(&path).unwrap();
        assert_eq!(config.ledger_dir, PathBuf::from("ledgers"));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "confirmation = 3\n").unwrap();

        assert!(ProjectConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_artifact_resolver_missing_bundle() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig {
            artifacts: dir.path().join("out/dapp.sol.json"),
            ..ProjectConfig::default()
        };
        assert!(config.artifact_resolver().is_err());
    }

    #[test]
    fn test_artifact_resolver_forge_dir() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig {
            artifacts: dir.path().to_path_buf(),
            ..ProjectConfig::default()
        };
        let resolver = config.artifact_resolver().unwrap();
        assert!(resolver.list().unwrap().is_empty());
    }
}
