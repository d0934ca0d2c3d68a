use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::RemoteId;
use crate::pipeline::Mode;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_BACKUP_FOLDER: &str = "backup";
pub const DEFAULT_LANGUAGE: &str = "en-us";

const CREDENTIAL_KEYS: [&str; 3] = [
    "zendesk_api_token",
    "zendesk_user_email",
    "zendesk_subdomain",
];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct InstanceCredentials {
    #[serde(default)]
    pub zendesk_api_token: String,
    #[serde(default)]
    pub zendesk_user_email: String,
    #[serde(default)]
    pub zendesk_subdomain: String,
}

impl InstanceCredentials {
    /// Base URL of the instance with trailing slashes removed. Bare subdomains expand to
    /// `https://{subdomain}.zendesk.com`, bare hosts get an `https://` scheme.
    pub fn base_url(&self) -> String {
        let value = self.zendesk_subdomain.trim().trim_end_matches('/');
        if value.contains("://") {
            value.to_string()
        } else if value.contains('.') {
            format!("https://{value}")
        } else {
            format!("https://{value}.zendesk.com")
        }
    }

    fn fill_missing_from(&mut self, other: &InstanceCredentials) {
        if self.zendesk_api_token.trim().is_empty() {
            self.zendesk_api_token = other.zendesk_api_token.clone();
        }
        if self.zendesk_user_email.trim().is_empty() {
            self.zendesk_user_email = other.zendesk_user_email.clone();
        }
        if self.zendesk_subdomain.trim().is_empty() {
            self.zendesk_subdomain = other.zendesk_subdomain.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    Source,
    Target,
}

impl InstanceRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
        }
    }

    fn env_prefix(self) -> &'static str {
        match self {
            Self::Source => "ZENDESK_SOURCE_",
            Self::Target => "ZENDESK_TARGET_",
        }
    }
}

/// Immutable run configuration, built once at startup and shared by reference.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct MigrateConfig {
    #[serde(default)]
    pub source: InstanceCredentials,
    #[serde(default)]
    pub target: InstanceCredentials,
    #[serde(default = "default_backup_folder")]
    pub backup_folder: PathBuf,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub section_id: Option<RemoteId>,
    #[serde(default)]
    pub permission_group_id: Option<RemoteId>,
    #[serde(default)]
    pub user_segment_id: Option<RemoteId>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            source: InstanceCredentials::default(),
            target: InstanceCredentials::default(),
            backup_folder: default_backup_folder(),
            language: default_language(),
            section_id: None,
            permission_group_id: None,
            user_segment_id: None,
        }
    }
}

impl MigrateConfig {
    pub fn credentials(&self, role: InstanceRole) -> &InstanceCredentials {
        match role {
            InstanceRole::Source => &self.source,
            InstanceRole::Target => &self.target,
        }
    }

    /// `{backup_folder}/{language}`, the directory every archive file lives under.
    pub fn archive_dir(&self) -> PathBuf {
        self.backup_folder.join(&self.language)
    }

    /// Every credential the mode needs but the config lacks, one message per gap.
    pub fn validate_for_mode(&self, mode: Mode) -> Vec<String> {
        let mut problems = Vec::new();
        let mut roles = Vec::new();
        if mode.includes_backup() {
            roles.push(InstanceRole::Source);
        }
        if mode.includes_restore() {
            roles.push(InstanceRole::Target);
        }

        for role in roles {
            let credentials = self.credentials(role);
            let fields = [
                ("API token", "API_TOKEN", &credentials.zendesk_api_token),
                ("user email", "USER_EMAIL", &credentials.zendesk_user_email),
                ("subdomain", "SUBDOMAIN", &credentials.zendesk_subdomain),
            ];
            for (label, suffix, value) in fields {
                if value.trim().is_empty() {
                    problems.push(format!(
                        "no {} Zendesk {label} provided (set it in the {} section of the config file or as {}{suffix})",
                        role.as_str(),
                        role.as_str(),
                        role.env_prefix()
                    ));
                }
            }
        }
        problems
    }

    pub fn diagnostics(&self) -> String {
        format!(
            "source.subdomain={}\nsource.user_email={}\nsource.api_token={}\ntarget.subdomain={}\ntarget.user_email={}\ntarget.api_token={}\nbackup_folder={}\nlanguage={}\nsection_id={}\npermission_group_id={}\nuser_segment_id={}",
            display_or_none(&self.source.zendesk_subdomain),
            display_or_none(&self.source.zendesk_user_email),
            redact(&self.source.zendesk_api_token),
            display_or_none(&self.target.zendesk_subdomain),
            display_or_none(&self.target.zendesk_user_email),
            redact(&self.target.zendesk_api_token),
            self.backup_folder.to_string_lossy().replace('\\', "/"),
            self.language,
            format_optional_id(self.section_id),
            format_optional_id(self.permission_group_id),
            format_optional_id(self.user_segment_id),
        )
    }
}

/// Load the config file (JSON, or TOML when the extension is `.toml`) and apply process
/// environment overrides. A missing file yields defaults.
pub fn load_config(config_path: &Path) -> Result<MigrateConfig> {
    load_config_with_lookup(config_path, |key| env::var(key).ok())
}

pub fn load_config_with_lookup<F>(config_path: &Path, lookup_env: F) -> Result<MigrateConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = read_config_file(config_path)?;
    apply_env_overrides(&mut config, lookup_env);
    Ok(config)
}

fn read_config_file(config_path: &Path) -> Result<MigrateConfig> {
    if !config_path.exists() {
        return Ok(MigrateConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let raw: Value = if is_toml_path(config_path) {
        let parsed: toml::Value = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        serde_json::to_value(parsed)
            .with_context(|| format!("failed to convert {}", config_path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?
    };
    let normalized = migrate_legacy_layout(raw);
    serde_json::from_value(normalized)
        .with_context(|| format!("failed to parse {}", config_path.display()))
}

/// Older config files kept one set of credentials at the top level. Move them under
/// `source` and, when no `target` is present, copy them to `target` as well.
fn migrate_legacy_layout(raw: Value) -> Value {
    let Value::Object(mut root) = raw else {
        return raw;
    };
    if root.contains_key("source") {
        return Value::Object(root);
    }

    let mut source = Map::new();
    for key in CREDENTIAL_KEYS {
        let value = root
            .remove(key)
            .unwrap_or_else(|| Value::String(String::new()));
        source.insert(key.to_string(), value);
    }
    if !root.contains_key("target") {
        root.insert("target".to_string(), Value::Object(source.clone()));
    }
    root.insert("source".to_string(), Value::Object(source));
    Value::Object(root)
}

/// Role-specific variables win over the generic ones. Generic variables always fill the
/// source but only fill empty target values; empty target values finally copy the source.
pub fn apply_env_overrides<F>(config: &mut MigrateConfig, lookup_env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| {
        lookup_env(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    for (suffix, key) in [
        ("API_TOKEN", "zendesk_api_token"),
        ("USER_EMAIL", "zendesk_user_email"),
        ("SUBDOMAIN", "zendesk_subdomain"),
    ] {
        let generic = lookup(&format!("ZENDESK_{suffix}"));

        let source_value = field_mut(&mut config.source, key);
        if let Some(value) = lookup(&format!("ZENDESK_SOURCE_{suffix}")) {
            *source_value = value;
        } else if let Some(value) = &generic {
            *source_value = value.clone();
        }

        let target_value = field_mut(&mut config.target, key);
        if let Some(value) = lookup(&format!("ZENDESK_TARGET_{suffix}")) {
            *target_value = value;
        } else if let Some(value) = &generic
            && target_value.trim().is_empty()
        {
            *target_value = value.clone();
        }
    }

    let source = config.source.clone();
    config.target.fill_missing_from(&source);
}

/// Write the default config when nothing exists at `config_path`. Returns `true` on write.
pub fn create_default_config(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }
    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let defaults = MigrateConfig::default();
    let rendered = if is_toml_path(config_path) {
        toml::to_string_pretty(&defaults).context("failed to serialize default config TOML")?
    } else {
        serde_json::to_string_pretty(&defaults).context("failed to serialize default config")?
    };
    fs::write(config_path, rendered)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok(true)
}

fn field_mut<'a>(credentials: &'a mut InstanceCredentials, key: &str) -> &'a mut String {
    match key {
        "zendesk_api_token" => &mut credentials.zendesk_api_token,
        "zendesk_user_email" => &mut credentials.zendesk_user_email,
        _ => &mut credentials.zendesk_subdomain,
    }
}

fn is_toml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("toml"))
}

fn default_backup_folder() -> PathBuf {
    PathBuf::from(DEFAULT_BACKUP_FOLDER)
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn redact(secret: &str) -> &'static str {
    if secret.trim().is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn display_or_none(value: &str) -> &str {
    if value.trim().is_empty() {
        "<unset>"
    } else {
        value
    }
}

fn format_optional_id(value: Option<RemoteId>) -> String {
    value
        .map(|id| id.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}
