// ==============================================================================
// output.rs - Covariance Output Writer
// ==============================================================================
// Description: Streams flattened covariance entries to a gzip-compressed
//              long-format text file
// Author: Matt Barham
// Created: 2025-11-06
// Modified: 2026-10-18
// Version: 2.1.0
// ==============================================================================
// Format (space separated, gzip compressed):
//   GENE RSID1 RSID2 VALUE
//   ENSG00000107937.14 chr10_100_A_G chr10_100_A_G 0.2475
//   ENSG00000107937.14 chr10_100_A_G chr10_250_C_T -0.0132
// ==============================================================================

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::CovarianceEntry;

/// First line of every covariance file
pub const HEADER: &str = "GENE RSID1 RSID2 VALUE";

/// True when a previous run already produced `path`
pub fn output_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Suffix of the staging file a run writes before it completes
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Staging path for `path` (`<output>.partial`)
pub fn partial_path(path: impl AsRef<Path>) -> PathBuf {
    let mut name = path.as_ref().as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Gzip-compressed covariance writer
///
/// Rows are streamed into `<output>.partial`. Only [`CovarianceWriter::finish`]
/// renames it to the output path, so a file at the output path is always a
/// completed run. A stale staging file left by a crashed run is overwritten.
pub struct CovarianceWriter {
    path: PathBuf,
    partial: PathBuf,
    encoder: GzEncoder<BufWriter<File>>,
    header_written: bool,
    rows_written: usize,
}

impl CovarianceWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if output_exists(&path) {
            anyhow::bail!("Covariance output {:?} already exists", path);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }

        let partial = partial_path(&path);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&partial)
            .with_context(|| format!("Failed to create covariance staging file {:?}", partial))?;

        debug!("Staging covariance output in {:?}", partial);

        Ok(Self {
            path,
            partial,
            encoder: GzEncoder::new(BufWriter::new(file), Compression::default()),
            header_written: false,
            rows_written: 0,
        })
    }

    pub fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            anyhow::bail!("Covariance header already written to {:?}", self.partial);
        }

        writeln!(self.encoder, "{}", HEADER).context("Failed to write covariance header")?;
        self.header_written = true;
        Ok(())
    }

    /// Append entries, one line each; returns the number written
    pub fn write_entries<'a, I>(&mut self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a CovarianceEntry>,
    {
        if !self.header_written {
            anyhow::bail!("Covariance header must be written before entries");
        }

        let mut count = 0;
        for entry in entries {
            writeln!(
                self.encoder,
                "{} {} {} {}",
                entry.gene, entry.id1, entry.id2, entry.value
            )
            .with_context(|| format!("Failed to write covariance entry for gene {}", entry.gene))?;
            count += 1;
        }

        self.rows_written += count;
        Ok(count)
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Finish the gzip stream and move it to the output path
    pub fn finish(self) -> Result<PathBuf> {
        let Self {
            path,
            partial,
            encoder,
            rows_written,
            ..
        } = self;
        close_stream(encoder)?;

        // Another run may have completed while this one was streaming
        if output_exists(&path) {
            anyhow::bail!(
                "Covariance output {:?} appeared during the run; staged rows left in {:?}",
                path,
                partial
            );
        }
        std::fs::rename(&partial, &path)
            .with_context(|| format!("Failed to move {:?} to {:?}", partial, path))?;

        info!(
            "Covariance output complete: {} rows written to {:?}",
            rows_written, path
        );

        Ok(path)
    }

    /// Finish the gzip stream but leave it at the staging path
    pub fn abandon(self) -> Result<PathBuf> {
        close_stream(self.encoder)?;
        warn!(
            "Covariance output incomplete: {} rows left in {:?}",
            self.rows_written, self.partial
        );
        Ok(self.partial)
    }

    /// Drop the staging file without producing any output
    pub fn discard(self) {
        drop(self.encoder);

        match std::fs::remove_file(&self.partial) {
            Ok(()) => debug!("Removed covariance staging file {:?}", self.partial),
            Err(e) => warn!("Failed to remove covariance staging file {:?}: {}", self.partial, e),
        }
    }
}

fn close_stream(encoder: GzEncoder<BufWriter<File>>) -> Result<()> {
    let mut inner = encoder
        .finish()
        .context("Failed to finalize covariance gzip compression")?;
    inner.flush().context("Failed to flush covariance output")?;
    Ok(())
}
