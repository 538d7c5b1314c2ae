use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;
use tracing::warn;

use crate::directory::SortOrder;
use crate::picker::PickerConfig;
use crate::record::{ContactRecord, SubtitleField};
use crate::source::InclusionPredicate;
use crate::vdir::AccessPolicy;

const CONFIG_FILE_NAME: &str = "config.toml";

const KNOWN_KEYS: &[&str] = &["vdir", "app_name", "access", "default_sort_order", "picker"];
const KNOWN_PICKER_KEYS: &[&str] = &[
    "multi_select",
    "show_index_bar",
    "subtitle",
    "sort_order",
    "include",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub vdir: PathBuf,
    pub app_name: String,
    pub access: AccessPolicy,
    pub default_sort_order: SortOrder,
    pub picker: PickerSettings,
}

/// Records shown at all, as named in the config file and on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inclusion {
    #[default]
    All,
    HasPhone,
    HasEmail,
}

impl Inclusion {
    pub fn predicate(self) -> Option<InclusionPredicate> {
        let predicate: InclusionPredicate = match self {
            Inclusion::All => return None,
            Inclusion::HasPhone => {
                Arc::new(|record: &ContactRecord| !record.phone_numbers().is_empty())
            }
            Inclusion::HasEmail => Arc::new(|record: &ContactRecord| !record.emails().is_empty()),
        };
        Some(predicate)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PickerSettings {
    pub multi_select: bool,
    pub show_index_bar: bool,
    pub subtitle: SubtitleField,
    pub sort_order: SortOrder,
    pub include: Inclusion,
}

impl Default for PickerSettings {
    fn default() -> Self {
        Self {
            multi_select: false,
            show_index_bar: true,
            subtitle: SubtitleField::PhoneNumber,
            sort_order: SortOrder::SystemDefault,
            include: Inclusion::All,
        }
    }
}

impl PickerSettings {
    pub fn to_picker_config(&self, app_name: &str) -> PickerConfig {
        PickerConfig {
            multi_select: self.multi_select,
            show_index_bar: self.show_index_bar,
            subtitle: self.subtitle,
            sort_order: self.sort_order,
            include: self.include.predicate(),
            app_name: app_name.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    vdir: Option<PathBuf>,
    app_name: Option<String>,
    access: AccessPolicy,
    default_sort_order: SortOrder,
    picker: PickerSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            vdir: None,
            app_name: None,
            access: AccessPolicy::Prompt,
            default_sort_order: SortOrder::GivenName,
            picker: PickerSettings::default(),
        }
    }
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(crate::APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load the configuration from `path`, or from the per-user default location.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };
    if !path.exists() {
        bail!(
            "configuration file not found at {}. Please create it with at least a `vdir` entry.",
            path.display()
        );
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    let config = parse(&raw, path)?;

    if !config.vdir.exists() {
        bail!("configured vdir does not exist: {}", config.vdir.display());
    }
    Ok(config)
}

/// Parse configuration text. Does not touch the filesystem.
pub fn parse(raw: &str, config_path: PathBuf) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", config_path.display()))?;

    for key in unknown_keys(&value) {
        warn!("unknown configuration key `{key}`");
    }

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", config_path.display()))?;

    let vdir = cfg_file
        .vdir
        .ok_or_else(|| anyhow!("`vdir` must be specified in configuration"))?;

    let app_name = cfg_file
        .app_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(crate::APP_NAME)
        .to_string();

    Ok(Config {
        config_path,
        vdir: expand_tilde(&vdir),
        app_name,
        access: cfg_file.access,
        default_sort_order: cfg_file.default_sort_order.resolve(SortOrder::GivenName),
        picker: cfg_file.picker,
    })
}

/// Dotted paths of keys this version does not understand.
fn unknown_keys(value: &toml::Value) -> Vec<String> {
    let Some(table) = value.as_table() else {
        return Vec::new();
    };

    let mut unknown: Vec<String> = table
        .keys()
        .filter(|key| !KNOWN_KEYS.contains(&key.as_str()))
        .cloned()
        .collect();

    if let Some(picker) = table.get("picker").and_then(toml::Value::as_table) {
        unknown.extend(
            picker
                .keys()
                .filter(|key| !KNOWN_PICKER_KEYS.contains(&key.as_str()))
                .map(|key| format!("picker.{key}")),
        );
    }
    unknown
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
