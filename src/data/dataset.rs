//! Simulated datasets: counts, planted truth and their tabular file format.

use crate::data::CountMatrix;
use crate::error::{BenchError, Result};
use crate::tree::ConditionKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

/// Prefix of the synthetic gene symbols (`LOC1`, `LOC2`, ...).
pub const GENE_SYMBOL_PREFIX: &str = "LOC";

/// Number of leading annotation columns in a dataset file.
const ANNOTATION_COLUMNS: usize = 3;

/// Planted truth of a gene, also used for method calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Higher in treatment.
    #[serde(rename = "up")]
    Up,
    /// Lower in treatment.
    #[serde(rename = "dn")]
    Down,
    /// Not differentially expressed.
    #[serde(rename = "ns")]
    NotSignificant,
}

impl Label {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "dn",
            Self::NotSignificant => "ns",
        }
    }

    /// Whether the label marks a DE gene (either direction).
    #[inline]
    pub fn is_de(&self) -> bool {
        !matches!(self, Self::NotSignificant)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Label {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "dn" | "down" => Ok(Self::Down),
            "ns" | "" => Ok(Self::NotSignificant),
            other => Err(BenchError::InvalidParameter(format!("unknown label '{}'", other))),
        }
    }
}

/// One simulated replicate: counts and planted labels.
///
/// Columns are all treatment samples (`TRT-k`) followed by all controls
/// (`CTRL-k`); genes are numbered `1..=N`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Condition axes the dataset was simulated under.
    pub condition: ConditionKey,
    /// Seed of the replicate's random stream.
    pub seed: u64,
    /// Counts (genes × samples).
    pub counts: CountMatrix,
    /// Truth label per gene, in row order.
    pub labels: Vec<Label>,
}

impl Dataset {
    /// Create a dataset; labels must cover every gene.
    pub fn new(condition: ConditionKey, seed: u64, counts: CountMatrix, labels: Vec<Label>) -> Result<Self> {
        if labels.len() != counts.n_genes() {
            return Err(BenchError::DimensionMismatch {
                expected: counts.n_genes(),
                actual: labels.len(),
            });
        }
        Ok(Self {
            condition,
            seed,
            counts,
            labels,
        })
    }

    /// Sample names for `nsample` samples per group.
    pub fn sample_names(nsample: usize) -> Vec<String> {
        (1..=nsample)
            .map(|k| format!("TRT-{}", k))
            .chain((1..=nsample).map(|k| format!("CTRL-{}", k)))
            .collect()
    }

    /// Gene identifiers `1..=n_genes`.
    pub fn gene_names(n_genes: usize) -> Vec<String> {
        (1..=n_genes).map(|i| i.to_string()).collect()
    }

    #[inline]
    pub fn n_genes(&self) -> usize {
        self.counts.n_genes()
    }

    /// Number of genes labelled up or down.
    pub fn n_de(&self) -> usize {
        self.labels.iter().filter(|l| l.is_de()).count()
    }

    /// Number of genes with the given label.
    pub fn count_label(&self, label: Label) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    /// Path of this dataset under an output root.
    pub fn path_in<P: AsRef<Path>>(&self, root: P) -> PathBuf {
        root.as_ref().join(self.condition.dataset_path(self.seed))
    }

    /// Write the dataset as tab-separated text.
    ///
    /// Header: `Gene_ID  Gene_Symbol  Description  TRT-1 .. CTRL-n`.
    pub fn to_tsv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = BufWriter::new(writer);

        write!(writer, "Gene_ID\tGene_Symbol\tDescription")?;
        for sample_id in self.counts.sample_ids() {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, gene_id) in self.counts.gene_ids().iter().enumerate() {
            write!(
                writer,
                "{}\t{}{}\t{}",
                gene_id, GENE_SYMBOL_PREFIX, gene_id, self.labels[row_idx]
            )?;
            for col_idx in 0..self.counts.n_samples() {
                write!(writer, "\t{}", self.counts.get(row_idx, col_idx))?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Persist under `root` at the dataset's keyed path.
    ///
    /// The file is written to a temporary file in the target directory and
    /// renamed into place, so readers never observe a partial dataset.
    pub fn write_to<P: AsRef<Path>>(&self, root: P) -> Result<PathBuf> {
        let path = self.path_in(root);
        let dir = path
            .parent()
            .ok_or_else(|| BenchError::InvalidParameter(format!("no parent for {:?}", path)))?;
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        self.to_tsv(tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| BenchError::Io(e.error))?;
        Ok(path)
    }

    /// Read a dataset file; the condition and seed are recovered from its name.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let (condition, seed) = ConditionKey::parse_dataset_path(path)?;

        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| BenchError::EmptyData(format!("empty dataset file {:?}", path)))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() <= ANNOTATION_COLUMNS || header[..ANNOTATION_COLUMNS] != ["Gene_ID", "Gene_Symbol", "Description"] {
            return Err(BenchError::MissingColumn(
                "Gene_ID/Gene_Symbol/Description header".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[ANNOTATION_COLUMNS..].iter().map(|s| s.to_string()).collect();
        let n_samples = sample_ids.len();

        let mut gene_ids = Vec::new();
        let mut labels = Vec::new();
        let mut rows = Vec::new();
        for (row_idx, line) in lines.enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != ANNOTATION_COLUMNS + n_samples {
                return Err(BenchError::DimensionMismatch {
                    expected: ANNOTATION_COLUMNS + n_samples,
                    actual: fields.len(),
                });
            }
            gene_ids.push(fields[0].to_string());
            labels.push(fields[2].parse()?);

            let row = fields[ANNOTATION_COLUMNS..]
                .iter()
                .enumerate()
                .map(|(col_idx, value)| {
                    value.trim().parse::<u64>().map_err(|_| BenchError::InvalidCount {
                        value: value.to_string(),
                        row: row_idx,
                        col: col_idx,
                    })
                })
                .collect::<Result<Vec<u64>>>()?;
            rows.push(row);
        }

        if gene_ids.is_empty() {
            return Err(BenchError::EmptyData(format!("no genes in {:?}", path)));
        }

        let counts = CountMatrix::from_rows(&rows, gene_ids, sample_ids)?;
        Self::new(condition, seed, counts, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{DispType, OutlierMode, SimulSource};
    use tempfile::TempDir;

    fn small_dataset() -> Dataset {
        let condition = ConditionKey {
            simul_data: SimulSource::Bottomly,
            disp_type: DispType::Different,
            frac_up: 0.5,
            nsample: 3,
            outlier_mode: OutlierMode::Randomized,
            pde: 30.0,
        };
        let rows = vec![
            vec![5, 0, 12, 7, 8, 9],
            vec![0, 0, 0, 1, 0, 0],
            vec![300, 290, 310, 101, 99, 120],
        ];
        let counts = CountMatrix::from_rows(&rows, Dataset::gene_names(3), Dataset::sample_names(3)).unwrap();
        Dataset::new(
            condition,
            99,
            counts,
            vec![Label::Up, Label::NotSignificant, Label::Down],
        )
        .unwrap()
    }

    #[test]
    fn test_sample_names() {
        assert_eq!(
            Dataset::sample_names(2),
            vec!["TRT-1", "TRT-2", "CTRL-1", "CTRL-2"]
        );
    }

    #[test]
    fn test_file_layout() {
        let mut buf = Vec::new();
        small_dataset().to_tsv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Gene_ID\tGene_Symbol\tDescription\tTRT-1\tTRT-2\tTRT-3\tCTRL-1\tCTRL-2\tCTRL-3"
        );
        assert_eq!(lines.next().unwrap(), "1\tLOC1\tup\t5\t0\t12\t7\t8\t9");
        assert_eq!(lines.nth(1).unwrap(), "3\tLOC3\tdn\t300\t290\t310\t101\t99\t120");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let dataset = small_dataset();
        let path = dataset.write_to(dir.path()).unwrap();
        assert!(path.ends_with(
            "Bottomly_different_upFrac0.5_3spc_R_30DE/Bottomly_different_upFrac0.5_3spc_R_30DE_rep99.tsv"
        ));

        let loaded = Dataset::from_tsv(&path).unwrap();
        assert_eq!(loaded, dataset);
        assert_eq!(loaded.n_de(), 2);
    }

    #[test]
    fn test_label_length_checked() {
        let dataset = small_dataset();
        let err = Dataset::new(dataset.condition, 1, dataset.counts.clone(), vec![Label::Up]).unwrap_err();
        assert!(matches!(err, BenchError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_label_parse() {
        assert_eq!("dn".parse::<Label>().unwrap(), Label::Down);
        assert_eq!("Down".parse::<Label>().unwrap(), Label::Down);
        assert_eq!("ns".parse::<Label>().unwrap(), Label::NotSignificant);
        assert!("maybe".parse::<Label>().is_err());
    }
}
