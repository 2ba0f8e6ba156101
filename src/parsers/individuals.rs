// ==============================================================================
// parsers/individuals.rs - Individual List Parser
// ==============================================================================
// Description: Loads newline-delimited lists of individual identifiers
// Author: Matt Barham
// Created: 2026-10-13
// Modified: 2026-10-13
// Version: 1.0.0
// ==============================================================================
// Format: one identifier per line; surrounding whitespace and blank lines are
// ignored.
// ==============================================================================

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndividualListError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Individual list contains no identifiers")]
    EmptyFile,
}

/// Load individual identifiers in file order
pub fn load_individuals(path: impl AsRef<Path>) -> Result<Vec<String>, IndividualListError> {
    let reader = BufReader::new(File::open(path.as_ref())?);

    let mut individuals = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if !id.is_empty() {
            individuals.push(id.to_string());
        }
    }

    if individuals.is_empty() {
        return Err(IndividualListError::EmptyFile);
    }

    Ok(individuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "HG00096").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  HG00097  ").unwrap();

        let ids = load_individuals(file.path()).unwrap();
        assert_eq!(ids, vec!["HG00096", "HG00097"]);
    }

    #[test]
    fn test_empty_list_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            load_individuals(file.path()),
            Err(IndividualListError::EmptyFile)
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_individuals("/nonexistent/individuals.txt"),
            Err(IndividualListError::IoError(_))
        ));
    }
}
