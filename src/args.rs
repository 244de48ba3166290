//! These structs provide the CLI interface for the opsync CLI.

use crate::decide::OverwritePolicy;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// opsync: A command-line tool for moving weekly restaurant reports into a
/// Google Sheet.
///
/// Point-of-sale exports land on disk as CSV batches, one batch per week.
/// This program finds the batch to upload, reconciles its week against what
/// the sheet already holds, and appends the rows to the right tabs.
///
/// You will need to set up a Google Sheets API key and OAuth for this. See
/// the README for documentation on how to set this up.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration files.
    ///
    /// This is the first command you should run when setting up the opsync
    /// CLI. You need a few things ready beforehand.
    ///
    /// - Decide what directory you want to store configuration in and pass
    ///   this as --opsync-home. By default, it will be $HOME/opsync.
    ///
    /// - Get the URL of the destination Google Sheet and pass it as
    ///   --sheet-url.
    ///
    /// - Set up your Google Sheets API access credentials and download them
    ///   to a file. You will pass this as --api-key.
    ///
    /// After init, edit config.json to point sales_dir and labor_dir at the
    /// directories where your exports land.
    Init(InitArgs),
    /// Authenticate with Google Sheets via OAuth.
    Auth(AuthArgs),
    /// Upload a batch of sales and/or labor reports to the sheet.
    Upload(UploadArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate
    /// for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where opsync configuration is held. Defaults to ~/opsync
    #[arg(long, env = "OPSYNC_HOME", default_value_t = default_opsync_home())]
    opsync_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, opsync_home: PathBuf) -> Self {
        Self {
            log_level,
            opsync_home: opsync_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn opsync_home(&self) -> &DisplayPath {
        &self.opsync_home
    }
}

/// Args for the `opsync init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL of the destination Google Sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The path to your downloaded OAuth API credentials. This file will be
    /// moved to the default secrets location in the data directory.
    #[arg(long)]
    api_key: PathBuf,
}

impl InitArgs {
    pub fn new(sheet_url: impl Into<String>, api_key: impl Into<PathBuf>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn api_key(&self) -> &Path {
        &self.api_key
    }
}

/// Args for the `opsync auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify the saved token instead of running the consent flow.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// Which export source to upload.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Sales,
    Labor,
    #[default]
    All,
}

serde_plain::derive_display_from_serialize!(SourceKind);
serde_plain::derive_fromstr_from_deserialize!(SourceKind);

/// How to pick a batch when more than one is on disk.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectMode {
    /// The batch with the most recent week-ending date.
    #[default]
    Latest,
    /// The oldest batch whose week is not yet in the sheet.
    OldestMissing,
}

serde_plain::derive_display_from_serialize!(SelectMode);
serde_plain::derive_fromstr_from_deserialize!(SelectMode);

/// Args for the `opsync upload` command.
#[derive(Debug, Parser, Clone)]
pub struct UploadArgs {
    /// The source to upload: "sales", "labor" or "all"
    #[arg(default_value_t = SourceKind::All)]
    source: SourceKind,

    /// How to choose a batch: "latest" or "oldest-missing"
    #[arg(long, default_value_t = SelectMode::Latest)]
    select: SelectMode,

    /// Run the full decision pipeline but write nothing to the sheet.
    #[arg(long)]
    dry_run: bool,

    /// Never prompt. Ties and overwrite confirmations resolve from policy.
    #[arg(long)]
    batch: bool,

    /// Override the configured overwrite policy for this run.
    #[arg(long)]
    policy: Option<OverwritePolicy>,
}

impl UploadArgs {
    pub fn new(
        source: SourceKind,
        select: SelectMode,
        dry_run: bool,
        batch: bool,
        policy: Option<OverwritePolicy>,
    ) -> Self {
        Self {
            source,
            select,
            dry_run,
            batch,
            policy,
        }
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn select(&self) -> SelectMode {
        self.select
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn batch(&self) -> bool {
        self.batch
    }

    pub fn policy(&self) -> Option<OverwritePolicy> {
        self.policy
    }
}

fn default_opsync_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("opsync"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --opsync-home or OPSYNC_HOME instead of relying on the default \
                opsync home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("opsync")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
