use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory and:
/// - Creates an initial `config.json` file using `sheet_url` along with
///   default settings
/// - Moves `secret_file` into its default location in the data dir.
///
/// The generated config uses default batch naming patterns and tab mappings;
/// `sales_dir` and `labor_dir` start empty and must be edited before the
/// first upload.
pub async fn init(opsync_home: &Path, secret_file: &Path, url: &str) -> Result<Out<()>> {
    let config = Config::create(opsync_home, secret_file, url)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Created the opsync directory and config. Edit {} to set sales_dir and labor_dir, \
         then run 'opsync auth'",
        config.config_path().display()
    )
    .into())
}
