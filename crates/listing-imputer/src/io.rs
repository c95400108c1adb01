//! Delimited-file boundary of the engine.
//!
//! Reading happens before the schema is checked, writing after the run
//! succeeded; neither step knows anything about imputation.

use crate::error::{Result, ResultExt};
use crate::utils::NULL_TOKENS;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

/// Load a CSV file with a header row.
///
/// Empty fields and the tokens in [`NULL_TOKENS`] are read as nulls so a
/// numeric column with textual gaps keeps its numeric dtype. Any other text,
/// including "Unknown" or "None", stays a label. Falls back to reading without
/// quote handling when the quoted parse fails.
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let context = format!("Reading '{}'", path.display());

    let quoted = CsvParseOptions::default()
        .with_quote_char(Some(b'"'))
        .with_null_values(Some(null_values()));
    match read_with(path, quoted) {
        Ok(df) => {
            info!("Loaded {} rows x {} columns from {}", df.height(), df.width(), path.display());
            return Ok(df);
        }
        Err(e) => debug!("Quoted loading failed: {}", e),
    }

    let unquoted = CsvParseOptions::default()
        .with_quote_char(None)
        .with_null_values(Some(null_values()));
    let df = read_with(path, unquoted).context(context)?;
    info!("Loaded {} rows x {} columns from {}", df.height(), df.width(), path.display());
    Ok(df)
}

/// Persist `df` as a comma-separated file with a header row, creating the
/// parent directory if needed.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(df)
        .context(format!("Writing '{}'", path.display()))?;

    info!("Dataset saved: {}", path.display());
    Ok(())
}

fn read_with(path: &Path, parse_options: CsvParseOptions) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

fn null_values() -> NullValues {
    NullValues::AllColumns(NULL_TOKENS.iter().map(|t| PlSmallStr::from(*t)).collect())
}
