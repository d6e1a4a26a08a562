//! Splitting of ipmitool's pipe-delimited sensor table into rows.
//!
//! `ipmitool sensor` prints one line per sensor:
//!
//! ```text
//! CPU Temp         | 34.000     | degrees C  | ok    | 0.000 | ...
//! ```
//!
//! Fields follow quoted-CSV rules with `|` as separator, lines starting with
//! `#` are comments, and every field is trimmed.

use csv::{ReaderBuilder, Trim};
use std::collections::{HashMap, HashSet};

use crate::{Error, Result};

/// Field separator used by ipmitool's table output.
const DELIMITER: u8 = b'|';

/// Lines starting with this byte are ignored.
const COMMENT: u8 = b'#';

/// A row needs at least name, value and unit.
const MIN_FIELDS: usize = 3;

/// Splits raw command output into rows of trimmed fields.
///
/// All rows must have the same number of fields. Any structural problem
/// fails the whole table.
pub fn split_output(output: &[u8]) -> Result<Vec<Vec<String>>> {
    if has_unterminated_quote(output) {
        return Err(Error::UnterminatedQuote);
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .comment(Some(COMMENT))
        .has_headers(false)
        .flexible(false)
        .trim(Trim::All)
        .from_reader(output);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() < MIN_FIELDS {
            return Err(Error::ShortRow {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                fields: record.len(),
            });
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    dedupe_names(&mut rows);
    Ok(rows)
}

/// Renames repeated sensor names so every row has a distinct first field.
///
/// The first occurrence keeps its name, the Nth one becomes `name` + N
/// (`Temp`, `Temp2`, `Temp3`). If that name is already in use the ordinal
/// keeps counting up until it is free.
pub fn dedupe_names(rows: &mut [Vec<String>]) {
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();

    for row in rows.iter_mut() {
        let Some(name) = row.first_mut() else {
            continue;
        };

        let key = name.clone();
        let count = occurrences.entry(key.clone()).or_insert(0);
        *count += 1;

        let mut candidate = if *count == 1 {
            key.clone()
        } else {
            format!("{}{}", key, count)
        };
        while taken.contains(&candidate) {
            *count += 1;
            candidate = format!("{}{}", key, count);
        }

        taken.insert(candidate.clone());
        *name = candidate;
    }
}

/// Detects an odd number of quote characters outside comment lines.
///
/// The CSV reader closes an open quote at end of input instead of failing,
/// which would silently swallow the rest of the table into one field.
fn has_unterminated_quote(output: &[u8]) -> bool {
    let quotes: usize = output
        .split(|&b| b == b'\n')
        .filter(|line| line.first() != Some(&COMMENT))
        .map(|line| line.iter().filter(|&&b| b == b'"').count())
        .sum();
    quotes % 2 == 1
}
