//! External collaborators: the spreadsheet backend, OAuth token handling, and
//! local batch enumeration. The core engine only sees the [`Sheet`] trait and
//! the batch listing functions.

pub(crate) mod batches;
mod google;
mod memory;
mod oauth;

use crate::model::Cell;
use crate::{Config, Result};

pub(crate) use memory::MemorySheet;
pub(crate) use oauth::TokenProvider;

/// OAuth scopes required for Sheets API access.
const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// Selects the spreadsheet backend. When `OPSYNC_IN_TEST_MODE` is set and
/// non-empty, the in-memory backend is used so the whole program can run
/// top-to-bottom without touching Google.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Google,
    Test,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var("OPSYNC_IN_TEST_MODE") {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Google,
        }
    }
}

/// The destination spreadsheet, one named tab at a time.
///
/// The contract is deliberately narrow: read the header, read column 1 of the
/// data rows, append at the end, delete rows by absolute position, and write
/// targeted formulas. No other cell access exists.
#[async_trait::async_trait]
pub trait Sheet: Send {
    /// The header row (row 1) of a tab.
    async fn header(&mut self, tab: &str) -> Result<Vec<String>>;

    /// Column 1 values for rows 2..N, in row order.
    async fn key_column(&mut self, tab: &str) -> Result<Vec<String>>;

    /// Appends `rows` after the current last row.
    async fn append_rows(&mut self, tab: &str, rows: &[Vec<Cell>]) -> Result<()>;

    /// Deletes rows by 1-based absolute position. Callers pass positions
    /// sorted descending so earlier deletes cannot shift later ones.
    async fn delete_rows(&mut self, tab: &str, positions: &[u64]) -> Result<()>;

    /// Writes one formula per row into `column` (1-based), starting at
    /// 1-based absolute row `start_row`.
    async fn write_formulas(
        &mut self,
        tab: &str,
        start_row: u64,
        column: usize,
        formulas: &[String],
    ) -> Result<()>;
}

/// Creates the spreadsheet backend for the given mode.
pub async fn sheet(config: &Config, mode: Mode) -> Result<Box<dyn Sheet>> {
    match mode {
        Mode::Google => {
            let token_provider =
                TokenProvider::load(&config.client_secret_path(), &config.token_path()).await?;
            Ok(Box::new(google::GoogleSheet::new(
                config.spreadsheet_id().to_string(),
                token_provider,
            )))
        }
        Mode::Test => Ok(Box::new(MemorySheet::default())),
    }
}
