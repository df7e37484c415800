//! Station file header detection.
//!
//! Met Office station files open with a free-text preamble (station name,
//! location, column titles, units) of no fixed length. The data starts at
//! the first line whose whitespace separated tokens are all numeric.

use crate::error::Result;
use crate::models::DataBoundaries;
use crate::numeric::all_numeric;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Find how many lines must be skipped before the data starts in a file
pub fn find_first_valid_data(file_path: &Path) -> Result<DataBoundaries> {
    let file = File::open(file_path)?;
    let boundaries = count_header_lines(BufReader::new(file))?;

    debug!(
        "Header for {}: skip_rows={}, data_found={}",
        file_path.display(),
        boundaries.skip_rows,
        boundaries.data_found
    );

    Ok(boundaries)
}

/// Count the leading lines that are not fully numeric.
///
/// Scanning stops at the first fully numeric line; anything after it is
/// never read. A header is tens of lines, so a linear scan is fine.
pub fn count_header_lines<R: BufRead>(reader: R) -> Result<DataBoundaries> {
    let mut skip_rows = 0;

    for line in reader.lines() {
        let line = line?;

        if all_numeric(line.split_whitespace()) {
            return Ok(DataBoundaries {
                skip_rows,
                lines_scanned: skip_rows + 1,
                data_found: true,
            });
        }

        skip_rows += 1;
    }

    Ok(DataBoundaries {
        skip_rows,
        lines_scanned: skip_rows,
        data_found: false,
    })
}
