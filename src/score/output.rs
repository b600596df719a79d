//! Reading a DE method's per-gene results table.

use crate::condition::ScoringOptions;
use crate::data::Label;
use crate::error::{BenchError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// One gene row of a method output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputGene {
    pub gene_id: String,
    /// DE score, smaller is stronger; NaN when missing.
    pub score: f64,
    /// Method call, if the table has a call column.
    pub call: Option<Label>,
    /// Planted label echoed by the method, if present.
    pub label: Option<Label>,
}

/// Parsed method output, indexed by gene id.
#[derive(Debug, Clone, Default)]
pub struct MethodOutput {
    genes: Vec<OutputGene>,
    index: HashMap<String, usize>,
    has_calls: bool,
}

fn parse_score(raw: &str) -> f64 {
    match raw.trim() {
        "" | "NA" | "NaN" | "nan" | "null" => f64::NAN,
        value => value.parse().unwrap_or(f64::NAN),
    }
}

impl MethodOutput {
    /// Build from parsed rows; later duplicates of a gene id are rejected.
    pub fn new(genes: Vec<OutputGene>) -> Result<Self> {
        let mut index = HashMap::with_capacity(genes.len());
        for (i, gene) in genes.iter().enumerate() {
            if index.insert(gene.gene_id.clone(), i).is_some() {
                return Err(BenchError::InvalidParameter(format!(
                    "gene '{}' appears twice in method output",
                    gene.gene_id
                )));
            }
        }
        let has_calls = genes.iter().any(|g| g.call.is_some());
        Ok(Self {
            genes,
            index,
            has_calls,
        })
    }

    /// Read a results table using the configured column names.
    pub fn from_path<P: AsRef<Path>>(path: P, options: &ScoringOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, options)
    }

    pub fn from_reader<R: Read>(reader: R, options: &ScoringOptions) -> Result<Self> {
        let delimiter = u8::try_from(options.delimiter).map_err(|_| {
            BenchError::InvalidParameter(format!("delimiter {:?} is not ASCII", options.delimiter))
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let gene_col = find(&options.gene_column)
            .ok_or_else(|| BenchError::MissingColumn(options.gene_column.clone()))?;
        let score_col = find(&options.score_column)
            .ok_or_else(|| BenchError::MissingColumn(options.score_column.clone()))?;
        let call_col = match &options.call_column {
            Some(name) => Some(find(name).ok_or_else(|| BenchError::MissingColumn(name.clone()))?),
            None => None,
        };
        let label_col = find(&options.label_column);

        let mut genes = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |col: usize| record.get(col).unwrap_or("");
            let gene_id = field(gene_col).trim().to_string();
            if gene_id.is_empty() {
                continue;
            }
            let call = call_col.map(|col| field(col).parse::<Label>()).transpose()?;
            let label = label_col.and_then(|col| field(col).parse::<Label>().ok());
            genes.push(OutputGene {
                gene_id,
                score: parse_score(field(score_col)),
                call,
                label,
            });
        }
        Self::new(genes)
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn genes(&self) -> &[OutputGene] {
        &self.genes
    }

    pub fn get(&self, gene_id: &str) -> Option<&OutputGene> {
        self.index.get(gene_id).map(|&i| &self.genes[i])
    }

    /// Whether calls come from a call column rather than the threshold alone.
    pub fn has_calls(&self) -> bool {
        self.has_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "Gene_ID\tGene_Symbol\tDescription\tlog2FC\tpvalue\n\
                         1\tLOC1\tup\t2.1\t0.001\n\
                         2\tLOC2\tns\t0.1\tNA\n\
                         3\tLOC3\tdn\t-1.5\t0.04\n";

    #[test]
    fn test_read_default_columns() {
        let output = MethodOutput::from_reader(TABLE.as_bytes(), &ScoringOptions::default()).unwrap();
        assert_eq!(output.len(), 3);
        assert!(!output.has_calls());
        let gene = output.get("1").unwrap();
        assert_eq!(gene.score, 0.001);
        assert_eq!(gene.label, Some(Label::Up));
        assert!(output.get("2").unwrap().score.is_nan());
        assert!(output.get("4").is_none());
    }

    #[test]
    fn test_call_column() {
        let table = "gene,padj,call\na,0.01,up\nb,0.2,ns\n";
        let options = ScoringOptions {
            gene_column: "gene".to_string(),
            score_column: "padj".to_string(),
            call_column: Some("call".to_string()),
            delimiter: ',',
            ..ScoringOptions::default()
        };
        let output = MethodOutput::from_reader(table.as_bytes(), &options).unwrap();
        assert!(output.has_calls());
        assert_eq!(output.get("b").unwrap().call, Some(Label::NotSignificant));
        assert_eq!(output.get("a").unwrap().label, None);
    }

    #[test]
    fn test_missing_score_column() {
        let options = ScoringOptions {
            score_column: "padj".to_string(),
            ..ScoringOptions::default()
        };
        let err = MethodOutput::from_reader(TABLE.as_bytes(), &options).unwrap_err();
        assert!(matches!(err, BenchError::MissingColumn(c) if c == "padj"));
    }

    #[test]
    fn test_duplicate_gene_rejected() {
        let table = "Gene_ID\tpvalue\n1\t0.1\n1\t0.2\n";
        assert!(MethodOutput::from_reader(table.as_bytes(), &ScoringOptions::default()).is_err());
    }
}
