// ==============================================================================
// gene_model.rs - Gene Model Database Reader
// ==============================================================================
// Description: Reads gene metadata and variant weights from a SQLite model db
// Author: Matt Barham
// Created: 2025-11-12
// Modified: 2026-10-15
// Version: 2.0.0
// ==============================================================================
// Tables:
//   extra   (gene TEXT, n_snps_in_model INTEGER, ...)
//   weights (gene TEXT, varID TEXT, rsid TEXT, weight REAL, ...)
// ==============================================================================

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use tracing::{debug, info};

use crate::models::{GeneMetadata, WeightRecord};
use crate::parsers::VariantId;

/// Gene model database reader
pub struct GeneModelReader {
    conn: Connection,
}

impl GeneModelReader {
    /// Open gene model database (read-only)
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open gene model database {:?}", path.as_ref()))?;

        Ok(Self { conn })
    }

    /// Genes with at least one variant in their model, ordered by gene id
    pub fn list_genes(&self) -> Result<Vec<GeneMetadata>> {
        let mut stmt = self.conn.prepare(
            "SELECT gene, n_snps_in_model
             FROM extra
             WHERE n_snps_in_model > 0
             ORDER BY gene",
        )?;

        let gene_iter = stmt.query_map([], |row| {
            Ok(GeneMetadata {
                gene: row.get(0)?,
                n_snps_in_model: row.get(1)?,
            })
        })?;

        let mut genes = Vec::new();
        for gene in gene_iter {
            genes.push(gene.context("Malformed row in extra table")?);
        }

        info!("Loaded {} genes with non-empty models", genes.len());

        Ok(genes)
    }

    /// Weights for one gene in storage order
    ///
    /// Every variant identifier is parsed; a malformed identifier fails the
    /// call with the gene and identifier in the error.
    pub fn weights_for(&self, gene: &str) -> Result<Vec<WeightRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT gene, varID, rsid, weight
             FROM weights
             WHERE gene = ?1
             ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![gene], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut weights = Vec::new();
        for row in rows {
            let (gene_id, var_id, rsid, weight) =
                row.with_context(|| format!("Malformed weight row for gene {}", gene))?;

            let variant = VariantId::parse(&var_id)
                .with_context(|| format!("Invalid variant identifier in weights for gene {}", gene))?;

            weights.push(WeightRecord {
                gene: gene_id,
                variant,
                rsid,
                weight,
            });
        }

        debug!("Loaded {} weights for gene {}", weights.len(), gene);

        Ok(weights)
    }

    /// Get total gene count in the metadata table (including empty models)
    pub fn get_total_gene_count(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare("SELECT COUNT(*) FROM extra")?;
        let count: usize = stmt.query_row([], |row| row.get(0))?;
        Ok(count)
    }

    /// Check if database is properly formatted
    pub fn validate(&self) -> Result<()> {
        let genes = self
            .get_total_gene_count()
            .context("Gene model database has no readable extra table")?;

        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM weights")
            .context("Gene model database has no readable weights table")?;
        let weights: usize = stmt.query_row([], |row| row.get(0))?;

        info!(
            "Gene model database validated: {} genes, {} weights",
            genes, weights
        );

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::write_model_db;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_genes_filters_and_orders() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("model.db");
        write_model_db(
            &db,
            &[("ENSG0003", 2), ("ENSG0001", 1), ("ENSG0002", 0)],
            &[],
        );

        let reader = GeneModelReader::open(&db).unwrap();
        let genes = reader.list_genes().unwrap();

        assert_eq!(
            genes,
            vec![
                GeneMetadata { gene: "ENSG0001".to_string(), n_snps_in_model: 1 },
                GeneMetadata { gene: "ENSG0003".to_string(), n_snps_in_model: 2 },
            ]
        );
        assert_eq!(reader.get_total_gene_count().unwrap(), 3);
    }

    #[test]
    fn test_weights_for_preserves_order() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("model.db");
        write_model_db(
            &db,
            &[("ENSG0001", 2), ("ENSG0002", 1)],
            &[
                ("ENSG0001", "chr1_300_A_G", Some("rs3"), 0.5),
                ("ENSG0002", "chr2_100_C_T", Some("rs9"), 1.0),
                ("ENSG0001", "chr1_100_A_G", None, -0.25),
            ],
        );

        let reader = GeneModelReader::open(&db).unwrap();
        reader.validate().unwrap();
        let weights = reader.weights_for("ENSG0001").unwrap();

        assert_eq!(weights.len(), 2);
        assert_eq!(weights[0].variant.as_str(), "chr1_300_A_G");
        assert_eq!(weights[0].rsid.as_deref(), Some("rs3"));
        assert_eq!(weights[1].variant.as_str(), "chr1_100_A_G");
        assert_eq!(weights[1].rsid, None);
        assert_eq!(weights[1].weight, -0.25);

        assert!(reader.weights_for("ENSG9999").unwrap().is_empty());
    }

    #[test]
    fn test_weights_for_rejects_malformed_variant() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("model.db");
        write_model_db(&db, &[("ENSG0001", 1)], &[("ENSG0001", "rs12345", None, 0.1)]);

        let reader = GeneModelReader::open(&db).unwrap();
        let err = reader.weights_for("ENSG0001").unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("ENSG0001"));
        assert!(message.contains("rs12345"));
    }

    #[test]
    fn test_validate_missing_tables() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("empty.db");
        Connection::open(&db)
            .unwrap()
            .execute_batch("CREATE TABLE unrelated (x INTEGER);")
            .unwrap();

        let reader = GeneModelReader::open(&db).unwrap();
        assert!(reader.validate().is_err());
    }
}
