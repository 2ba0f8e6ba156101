// ==============================================================================
// genotype_registry.rs - Per-Chromosome Genotype Archive Registry
// ==============================================================================
// Description: Discovers chromosome-partitioned Parquet genotypes and serves
//              variant columns on demand
// Author: Matt Barham
// Created: 2026-10-12
// Modified: 2026-10-18
// Version: 1.1.0
// ==============================================================================
// Layout:
//   One Parquet file per chromosome, one column per variant (column name is
//   the variant identifier), one row per individual. Only the file footer is
//   read during discovery; column data is decoded in `fetch`.
// ==============================================================================

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extension that marks a file as a genotype archive candidate
pub const GENOTYPE_EXTENSION: &str = "parquet";

/// Errors raised while discovering or reading genotype archives
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to scan genotype folder {path:?}: {source}")]
    FolderScan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Invalid genotype filename pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Genotype filename pattern '{pattern}' must have exactly one capture group, found {found}")]
    CaptureGroupCount { pattern: String, found: usize },

    #[error("Genotype files do not match pattern '{pattern}': {}", .files.join(", "))]
    UnmatchedFiles { pattern: String, files: Vec<String> },

    #[error("Chromosome '{chromosome}' is matched by both {first:?} and {second:?}")]
    DuplicateChromosome {
        chromosome: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Failed to open genotype file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read Parquet genotype file {path:?}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("Failed to decode genotype batch from {path:?}: {source}")]
    Arrow {
        path: PathBuf,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("Genotype column '{column}' in {path:?} is not numeric ({data_type})")]
    NonNumericColumn {
        path: PathBuf,
        column: String,
        data_type: DataType,
    },

    #[error("Genotype column '{column}' in {path:?} has {nulls} missing values")]
    MissingValues {
        path: PathBuf,
        column: String,
        nulls: usize,
    },
}

/// One chromosome's genotype archive
#[derive(Debug, Clone)]
pub struct GenotypeDataset {
    chromosome: String,
    path: PathBuf,
    /// Column name -> root column index
    columns: HashMap<String, usize>,
    num_individuals: usize,
}

impl GenotypeDataset {
    /// Open a genotype archive, reading only its schema and row count
    pub fn open(chromosome: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let builder = open_builder(&path)?;

        let columns = builder
            .schema()
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, field)| (field.name().clone(), idx))
            .collect();
        let num_individuals = builder.metadata().file_metadata().num_rows().max(0) as usize;

        Ok(Self {
            chromosome: chromosome.into(),
            path,
            columns,
            num_individuals,
        })
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_individuals(&self) -> usize {
        self.num_individuals
    }

    pub fn contains(&self, variant_id: &str) -> bool {
        self.columns.contains_key(variant_id)
    }

    /// Read the requested variant columns as `f64` vectors
    ///
    /// Identifiers that are not columns of this archive are left out of the
    /// result. Any integer or floating point column type is accepted.
    pub fn fetch(&self, variant_ids: &[&str]) -> Result<HashMap<String, Vec<f64>>, RegistryError> {
        let mut selected: Vec<(usize, &str)> = variant_ids
            .iter()
            .filter_map(|id| self.columns.get(*id).map(|idx| (*idx, *id)))
            .collect();
        selected.sort_unstable();
        selected.dedup();

        if selected.is_empty() {
            return Ok(HashMap::new());
        }

        let mut vectors: HashMap<String, Vec<f64>> = selected
            .iter()
            .map(|(_, id)| (id.to_string(), Vec::with_capacity(self.num_individuals)))
            .collect();

        let builder = open_builder(&self.path)?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), selected.iter().map(|(idx, _)| *idx));
        let reader = builder
            .with_projection(mask)
            .build()
            .map_err(|source| RegistryError::Parquet {
                path: self.path.clone(),
                source,
            })?;

        for batch in reader {
            let batch = batch.map_err(|source| RegistryError::Arrow {
                path: self.path.clone(),
                source,
            })?;
            let schema = batch.schema();

            for (field, column) in schema.fields().iter().zip(batch.columns()) {
                let values = self.column_values(field.name(), column)?;
                if let Some(vector) = vectors.get_mut(field.name()) {
                    vector.extend_from_slice(&values);
                }
            }
        }

        debug!(
            "Fetched {} of {} requested columns from chromosome {}",
            vectors.len(),
            variant_ids.len(),
            self.chromosome
        );

        Ok(vectors)
    }

    fn column_values(&self, name: &str, column: &ArrayRef) -> Result<Vec<f64>, RegistryError> {
        if !column.data_type().is_numeric() {
            return Err(RegistryError::NonNumericColumn {
                path: self.path.clone(),
                column: name.to_string(),
                data_type: column.data_type().clone(),
            });
        }
        if column.null_count() > 0 {
            return Err(RegistryError::MissingValues {
                path: self.path.clone(),
                column: name.to_string(),
                nulls: column.null_count(),
            });
        }

        let casted = cast(column.as_ref(), &DataType::Float64).map_err(|source| RegistryError::Arrow {
            path: self.path.clone(),
            source,
        })?;

        Ok(casted.as_primitive::<Float64Type>().values().to_vec())
    }
}

fn open_builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>, RegistryError> {
    let file = File::open(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    ParquetRecordBatchReaderBuilder::try_new(file).map_err(|source| RegistryError::Parquet {
        path: path.to_path_buf(),
        source,
    })
}

/// Chromosome label -> genotype archive, built once per run
#[derive(Debug, Clone, Default)]
pub struct GenotypeRegistry {
    datasets: BTreeMap<String, GenotypeDataset>,
}

impl GenotypeRegistry {
    /// Scan `folder` for genotype archives named by `pattern`
    ///
    /// The pattern's single capture group is the chromosome label, e.g.
    /// `chr(\w+)\.variants\.parquet`. Every `.parquet` file in the folder must
    /// match; other files are included only when they match and are ignored
    /// otherwise. A folder without candidates yields an empty registry.
    pub fn discover(folder: impl AsRef<Path>, pattern: &str) -> Result<Self, RegistryError> {
        let folder = folder.as_ref();
        let regex = Regex::new(pattern).map_err(|source| RegistryError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        // captures_len() counts the implicit whole-match group
        let groups = regex.captures_len() - 1;
        if groups != 1 {
            return Err(RegistryError::CaptureGroupCount {
                pattern: pattern.to_string(),
                found: groups,
            });
        }

        debug!("Scanning genotype folder {:?}", folder);

        let mut matched: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut unmatched = Vec::new();

        let walker = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|source| RegistryError::FolderScan {
                path: folder.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            let label = regex
                .captures(&file_name)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());

            match label {
                Some(chromosome) => {
                    if let Some(first) = matched.get(&chromosome) {
                        return Err(RegistryError::DuplicateChromosome {
                            chromosome,
                            first: first.clone(),
                            second: entry.path().to_path_buf(),
                        });
                    }
                    matched.insert(chromosome, entry.path().to_path_buf());
                }
                None if has_genotype_extension(entry.path()) => unmatched.push(file_name),
                None => debug!("Ignoring non-genotype file {}", file_name),
            }
        }

        if !unmatched.is_empty() {
            return Err(RegistryError::UnmatchedFiles {
                pattern: pattern.to_string(),
                files: unmatched,
            });
        }

        let mut datasets = BTreeMap::new();
        for (chromosome, path) in matched {
            debug!("Loading chromosome {}: {:?}", chromosome, path);
            let dataset = GenotypeDataset::open(chromosome.clone(), &path)?;
            debug!(
                "  {} variant columns, {} individuals",
                dataset.num_columns(),
                dataset.num_individuals()
            );
            datasets.insert(chromosome, dataset);
        }

        if datasets.is_empty() {
            warn!("No genotype files found in {:?} matching '{}'", folder, pattern);
        } else {
            info!(
                "Registered {} genotype files (chromosomes: {})",
                datasets.len(),
                datasets.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }

        Ok(Self { datasets })
    }

    pub fn get(&self, chromosome: &str) -> Option<&GenotypeDataset> {
        self.datasets.get(chromosome)
    }

    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn has_genotype_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(GENOTYPE_EXTENSION))
        .unwrap_or(false)
}


#[cfg(test)]
mod tests {
    use super::test_support::write_genotypes;
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::tempdir;

    const PATTERN: &str = r"chr(\w+)\.variants\.parquet";

    #[test]
    fn test_discover_maps_chromosome_labels() {
        let dir = tempdir().unwrap();
        write_genotypes(&dir.path().join("chr1.variants.parquet"), &[("chr1_100_A_G", vec![0.0, 1.0])]);
        write_genotypes(&dir.path().join("chrX.variants.parquet"), &[("chrX_200_C_T", vec![2.0, 1.0])]);
        std::fs::write(dir.path().join("README.txt"), "notes").unwrap();

        let registry = GenotypeRegistry::discover(dir.path(), PATTERN).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.chromosomes().collect::<Vec<_>>(), vec!["1", "X"]);
        let chr1 = registry.get("1").unwrap();
        assert_eq!(chr1.chromosome(), "1");
        assert_eq!(chr1.num_individuals(), 2);
        assert!(chr1.contains("chr1_100_A_G"));
        assert!(registry.get("2").is_none());
    }

    #[test]
    fn test_discover_empty_folder() {
        let dir = tempdir().unwrap();
        let registry = GenotypeRegistry::discover(dir.path(), PATTERN).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_discover_rejects_unmatched_parquet() {
        let dir = tempdir().unwrap();
        write_genotypes(&dir.path().join("chr1.variants.parquet"), &[("chr1_100_A_G", vec![0.0, 1.0])]);
        write_genotypes(&dir.path().join("chromosome2.parquet"), &[("chr2_100_A_G", vec![0.0, 1.0])]);

        let err = GenotypeRegistry::discover(dir.path(), PATTERN).unwrap_err();
        match &err {
            RegistryError::UnmatchedFiles { files, .. } => {
                assert_eq!(files, &vec!["chromosome2.parquet".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("chromosome2.parquet"));
    }

    #[test]
    fn test_discover_requires_single_capture_group() {
        let dir = tempdir().unwrap();
        let err = GenotypeRegistry::discover(dir.path(), r"chr\w+\.parquet").unwrap_err();
        assert!(matches!(err, RegistryError::CaptureGroupCount { found: 0, .. }));

        let err = GenotypeRegistry::discover(dir.path(), r"(chr)(\w+)\.parquet").unwrap_err();
        assert!(matches!(err, RegistryError::CaptureGroupCount { found: 2, .. }));

        let err = GenotypeRegistry::discover(dir.path(), r"chr(\w+").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPattern { .. }));
    }

    #[test]
    fn test_discover_rejects_duplicate_chromosome() {
        let dir = tempdir().unwrap();
        write_genotypes(&dir.path().join("chr1.a.parquet"), &[("chr1_100_A_G", vec![0.0, 1.0])]);
        write_genotypes(&dir.path().join("chr1.b.parquet"), &[("chr1_200_A_G", vec![1.0, 0.0])]);

        let err = GenotypeRegistry::discover(dir.path(), r"chr(\w+)\..*parquet").unwrap_err();
        match err {
            RegistryError::DuplicateChromosome { chromosome, first, second } => {
                assert_eq!(chromosome, "1");
                assert_eq!(first, dir.path().join("chr1.a.parquet"));
                assert_eq!(second, dir.path().join("chr1.b.parquet"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_discover_missing_folder() {
        let err = GenotypeRegistry::discover("/nonexistent/genotypes", PATTERN).unwrap_err();
        assert!(matches!(err, RegistryError::FolderScan { .. }));
    }

    #[test]
    fn test_fetch_omits_absent_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chr7.variants.parquet");
        write_genotypes(
            &path,
            &[
                ("chr7_100_A_G", vec![0.0, 1.0, 2.0]),
                ("chr7_200_C_T", vec![1.0, 1.0, 0.5]),
                ("chr7_300_G_A", vec![2.0, 2.0, 2.0]),
            ],
        );

        let dataset = GenotypeDataset::open("7", &path).unwrap();
        let fetched = dataset.fetch(&["chr7_300_G_A", "chr7_999_T_C", "chr7_100_A_G"]).unwrap();

        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched["chr7_100_A_G"], vec![0.0, 1.0, 2.0]);
        assert_eq!(fetched["chr7_300_G_A"], vec![2.0, 2.0, 2.0]);
        assert!(!fetched.contains_key("chr7_999_T_C"));

        assert!(dataset.fetch(&["chr7_999_T_C"]).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_spans_record_batches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chr2.variants.parquet");
        // Well past the reader's default batch size
        let rows = 5000;
        let first: Vec<f64> = (0..rows).map(|i| (i % 3) as f64).collect();
        let second: Vec<f64> = (0..rows).map(|i| i as f64 * 0.5).collect();
        write_genotypes(&path, &[("chr2_10_A_G", first.clone()), ("chr2_20_C_T", second.clone())]);

        let dataset = GenotypeDataset::open("2", &path).unwrap();
        assert_eq!(dataset.num_individuals(), rows);

        let fetched = dataset.fetch(&["chr2_20_C_T", "chr2_10_A_G"]).unwrap();
        assert_eq!(fetched["chr2_10_A_G"], first);
        assert_eq!(fetched["chr2_20_C_T"], second);
    }

    #[test]
    fn test_fetch_casts_integer_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chr3.variants.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("individual", DataType::Utf8, false),
            Field::new("chr3_500_A_C", DataType::Int32, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["HG00096", "HG00097"])),
                Arc::new(Int32Array::from(vec![0, 2])),
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let dataset = GenotypeDataset::open("3", &path).unwrap();
        let fetched = dataset.fetch(&["chr3_500_A_C"]).unwrap();
        assert_eq!(fetched["chr3_500_A_C"], vec![0.0, 2.0]);

        let err = dataset.fetch(&["individual"]).unwrap_err();
        assert!(matches!(err, RegistryError::NonNumericColumn { .. }));
    }

    #[test]
    fn test_fetch_rejects_missing_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chr4.variants.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new("chr4_10_A_C", DataType::Float64, true)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(arrow::array::Float64Array::from(vec![Some(1.0), None]))],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let dataset = GenotypeDataset::open("4", &path).unwrap();
        let err = dataset.fetch(&["chr4_10_A_C"]).unwrap_err();
        assert!(matches!(err, RegistryError::MissingValues { nulls: 1, .. }));
    }
}
