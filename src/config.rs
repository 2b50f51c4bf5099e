use anyhow::{Context, Result, bail};
use policykit::{PolicyResource, PolicyStatus, PolicyType};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_TOKEN_ENV: &str = "OKTA_API_TOKEN";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("polsync"))
}

/// Resolve the policies file: an explicit path (tilde-expanded) or the default
pub fn resolve_path(explicit: Option<&str>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).as_ref())),
        None => Ok(config_dir()?.join("policies.toml")),
    }
}

// ============================================================================
// Policies Config
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub org: OrgConfig,
    /// System default policies to discover and report
    #[serde(default)]
    pub defaults: Vec<PolicyType>,
    #[serde(default, rename = "policy")]
    pub policies: Vec<PolicyDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrgConfig {
    pub url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Classic (non Identity Engine) org
    #[serde(default)]
    pub classic: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDecl {
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: PolicyStatus,
    pub priority: Option<u32>,
    pub groups_included: Option<Vec<String>>,
    #[serde(default)]
    pub ensure: Ensure,
}

impl PolicyDecl {
    /// Local record for this declaration, not yet bound
    pub fn to_resource(&self) -> PolicyResource {
        let mut resource =
            PolicyResource::new(self.policy_type, self.name.clone()).status(self.status);
        if let Some(description) = &self.description {
            resource = resource.description(description.clone());
        }
        if let Some(priority) = self.priority {
            resource = resource.priority(priority);
        }
        if let Some(groups) = &self.groups_included {
            resource = resource.groups(groups.iter().cloned());
        }
        resource
    }
}

impl Config {
    /// Load and validate a policies file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let url = self.org.url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            bail!("org.url must be an http(s) URL, got {:?}", self.org.url);
        }
        if self.org.token_env.trim().is_empty() {
            bail!("org.token_env must not be empty");
        }

        let mut seen = HashSet::new();
        for decl in &self.policies {
            if decl.name.trim().is_empty() {
                bail!("{} policy with an empty name", decl.policy_type);
            }
            if decl.status == PolicyStatus::Unknown {
                bail!(
                    "policy {:?}: status must be ACTIVE or INACTIVE",
                    decl.name
                );
            }
            if decl.priority == Some(0) {
                bail!("policy {:?}: priority starts at 1", decl.name);
            }
            if !seen.insert((decl.policy_type, decl.name.as_str())) {
                bail!(
                    "policy {:?} of type {} is declared twice",
                    decl.name,
                    decl.policy_type
                );
            }
        }
        Ok(())
    }

    /// API token from the environment variable named by `org.token_env`
    pub fn token(&self) -> Result<String> {
        self.token_from(|name| std::env::var(name).ok())
    }

    fn token_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        match lookup(&self.org.token_env) {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => bail!(
                "API token not found: set the {} environment variable",
                self.org.token_env
            ),
        }
    }

    /// Declarations, in file order
    pub fn declared(&self) -> impl Iterator<Item = &PolicyDecl> {
        self.policies.iter()
    }
}
