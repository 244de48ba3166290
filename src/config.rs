//! Configuration file handling.
//!
//! The configuration file is stored at `$OPSYNC_HOME/config.json` and holds
//! the Google Sheet URL, the timezone, the locations and name patterns of the
//! exported report batches, and the tab mapping for the destination sheet.

use crate::decide::OverwritePolicy;
use crate::{utils, Result};
use anyhow::{bail, Context};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "opsync";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";

const DEFAULT_TIMEZONE: &str = "America/New_York";
const DEFAULT_SALES_PATTERN: &str = r"^SalesSummary_\d{4}-\d{2}-\d{2}_(\d{4}-\d{2}-\d{2})$";
const DEFAULT_LABOR_PATTERN: &str = r"^LaborSummary_\d{4}-\d{2}-\d{2}_(\d{4}-\d{2}-\d{2})$";
const DEFAULT_LABOR_TAB: &str = "Labor_Input";
const DEFAULT_CLASSIFICATION_COLUMN: &str = "Job Classification";
const DEFAULT_CLASSIFICATION_FORMULA: &str =
    "=IFERROR(VLOOKUP(B{row},Job_Classification_Lookup!A:B,2,FALSE),\"\")";

/// The `Config` object represents the app's configuration. You instantiate it
/// by providing the path to `$OPSYNC_HOME` and from there it loads
/// `$OPSYNC_HOME/config.json`. Patterns and the timezone are validated and
/// compiled at load time so the rest of the program never re-parses them.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
    tz: Tz,
    sales_pattern: Regex,
    labor_pattern: Regex,
}

impl Config {
    /// Creates the data directory and:
    /// - Creates an initial `config.json` using `sheet_url` and defaults
    /// - Moves `secret_file` into its default location in the data dir.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the data directory,
    ///   e.g. `$HOME/opsync`
    /// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON
    ///   needed to start the Google OAuth workflow. This is moved to its
    ///   default location in the data directory.
    /// - `sheet_url` - The URL of the Google Sheet holding the weekly
    ///   operations data.
    pub async fn create(
        dir: impl Into<PathBuf>,
        secret_file: &Path,
        sheet_url: &str,
    ) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the opsync home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;

        let secret_destination = secrets_dir.join(CLIENT_SECRET_JSON);
        utils::rename(secret_file, secret_destination).await?;
        let config_path = root.join(CONFIG_JSON);

        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Self::finish(root, secrets_dir, config_path, config_file)
    }

    /// Validates that `opsync_home` and the config file exist, loads the
    /// config file, and compiles its timezone and patterns.
    pub async fn load(opsync_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = opsync_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Opsync home is missing, run 'opsync init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let secrets = root.join(SECRETS);
        if !secrets.is_dir() {
            bail!("The secrets directory is missing '{}'", secrets.display())
        }
        Self::finish(root, secrets, config_path, config_file)
    }

    fn finish(
        root: PathBuf,
        secrets: PathBuf,
        config_path: PathBuf,
        config_file: ConfigFile,
    ) -> Result<Self> {
        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();
        let tz: Tz = config_file
            .timezone
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {e}", config_file.timezone))?;
        let sales_pattern = Regex::new(&config_file.sales_folder_pattern)
            .context("Invalid sales_folder_pattern")?;
        let labor_pattern =
            Regex::new(&config_file.labor_file_pattern).context("Invalid labor_file_pattern")?;
        ensure_capture_group(&sales_pattern, "sales_folder_pattern")?;
        ensure_capture_group(&labor_pattern, "labor_file_pattern")?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
            spreadsheet_id,
            tz,
            sales_pattern,
            labor_pattern,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn sales_dir(&self) -> &Path {
        &self.config_file.sales_dir
    }

    pub fn labor_dir(&self) -> &Path {
        &self.config_file.labor_dir
    }

    pub fn sales_pattern(&self) -> &Regex {
        &self.sales_pattern
    }

    pub fn labor_pattern(&self) -> &Regex {
        &self.labor_pattern
    }

    /// Source report file stem to destination tab name, in stable order.
    pub fn sales_tabs(&self) -> &BTreeMap<String, String> {
        &self.config_file.sales_tabs
    }

    pub fn labor_tab(&self) -> &str {
        &self.config_file.labor_tab
    }

    /// Destination column names that never receive source values, folded for
    /// case-insensitive matching.
    pub fn reserved_columns(&self) -> std::collections::HashSet<String> {
        self.config_file
            .reserved_columns
            .iter()
            .map(|name| crate::mapper::fold(name))
            .collect()
    }

    pub fn classification_column(&self) -> &str {
        &self.config_file.classification_column
    }

    /// Formula template with a `{row}` placeholder for the absolute row.
    pub fn classification_formula(&self) -> &str {
        &self.config_file.classification_formula
    }

    pub fn overwrite_policy(&self) -> OverwritePolicy {
        self.config_file.overwrite_policy
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise
    /// resolves it relative to the home directory.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves
    /// it relative to the home directory.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.token_path())
    }

    fn resolve_secrets_file_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

fn ensure_capture_group(pattern: &Regex, what: &str) -> Result<()> {
    if pattern.captures_len() < 2 {
        bail!("{what} must have a capture group for the week-ending date");
    }
    Ok(())
}

/// Represents the serialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "opsync",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "timezone": "America/New_York",
///   "sales_dir": "/data/exports/sales",
///   "labor_dir": "/data/exports/labor"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "opsync"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL to the destination Google Sheet
    sheet_url: String,

    /// IANA timezone used to interpret dates and timestamps
    #[serde(default = "default_timezone")]
    timezone: String,

    /// Directory containing sales export batch folders
    #[serde(default)]
    sales_dir: PathBuf,

    /// Directory containing labor export CSV files
    #[serde(default)]
    labor_dir: PathBuf,

    /// Pattern matched against sales batch folder names; the last capture
    /// group is the week-ending date
    #[serde(default = "default_sales_pattern")]
    sales_folder_pattern: String,

    /// Pattern matched against labor CSV file stems; the last capture group
    /// is the week-ending date
    #[serde(default = "default_labor_pattern")]
    labor_file_pattern: String,

    /// Source report file stem to destination tab name
    #[serde(default = "default_sales_tabs")]
    sales_tabs: BTreeMap<String, String>,

    /// Destination tab for labor uploads
    #[serde(default = "default_labor_tab")]
    labor_tab: String,

    /// Destination columns that never receive source values
    #[serde(default = "default_reserved_columns")]
    reserved_columns: Vec<String>,

    /// Column in the labor tab that receives the classification formula
    #[serde(default = "default_classification_column")]
    classification_column: String,

    /// Formula template written into the classification column; `{row}` is
    /// replaced with the absolute row number
    #[serde(default = "default_classification_formula")]
    classification_formula: String,

    /// What to do when a week is already present in a destination tab
    #[serde(default)]
    overwrite_policy: OverwritePolicy,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to
    /// the home directory or absolute)
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative to the home directory
    /// or absolute)
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_sales_pattern() -> String {
    DEFAULT_SALES_PATTERN.to_string()
}

fn default_labor_pattern() -> String {
    DEFAULT_LABOR_PATTERN.to_string()
}

fn default_sales_tabs() -> BTreeMap<String, String> {
    [
        "Sales_Payments",
        "Sales_Revenue",
        "Sales_Category",
        "Sales_Daypart",
    ]
    .iter()
    .map(|name| (name.to_string(), name.to_string()))
    .collect()
}

fn default_labor_tab() -> String {
    DEFAULT_LABOR_TAB.to_string()
}

fn default_reserved_columns() -> Vec<String> {
    vec![DEFAULT_CLASSIFICATION_COLUMN.to_string()]
}

fn default_classification_column() -> String {
    DEFAULT_CLASSIFICATION_COLUMN.to_string()
}

fn default_classification_formula() -> String {
    DEFAULT_CLASSIFICATION_FORMULA.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            timezone: default_timezone(),
            sales_dir: PathBuf::new(),
            labor_dir: PathBuf::new(),
            sales_folder_pattern: default_sales_pattern(),
            labor_file_pattern: default_labor_pattern(),
            sales_tabs: default_sales_tabs(),
            labor_tab: default_labor_tab(),
            reserved_columns: default_reserved_columns(),
            classification_column: default_classification_column(),
            classification_formula: default_classification_formula(),
            overwrite_policy: OverwritePolicy::default(),
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// Gets the client secret path, relative paths are interpreted as
    /// relative to the home directory.
    pub fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    /// Gets the token path, relative paths are interpreted as relative to the
    /// home directory.
    pub fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL, e.g.
/// `https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit`.
fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    if url.is_empty() {
        return Ok(url);
    }

    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            // Strip any query parameters or fragments
            let id_part = parts[i + 1];
            let id = id_part
                .split('?')
                .next()
                .unwrap_or(id_part)
                .split('#')
                .next()
                .unwrap_or(id_part);
            return Ok(id);
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}
