//! Replicate tables and the final result table.

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use itertools::Itertools;
use prettytable::{Cell, Row, Table};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::sensitivity::{calculate_sensitivity, ReferenceSelection};
use crate::organize::classifier::REPLICATE_PREFIX;
use crate::report::locate::RESULT_PREFIX;
use crate::report::metrics::{process_treatment_folder, MetricsRecord};
use crate::report::parse::ReferenceSequences;
use crate::utils::display::{reads, OptionalPercent};
use crate::utils::walk::{file_name, subdirectories};

/// Column names of the final table, in order. Matches the serialized field
/// order of [`ResultRow`].
pub const COLUMNS: [&str; 18] = [
    "Replicate",
    "Treatment",
    "WT/Unmodified%",
    "Reads (WT/Unmodified)",
    "MUT%",
    "Reads (MUT)",
    "WT*%",
    "Reads (WT*)",
    "Frameshift%",
    "Reads (Frameshift)",
    "In-frame%",
    "Reads (In-frame)",
    "Indel%",
    "Reads (Indel)",
    "MUT/WT*%",
    "Total Reads",
    "Report",
    "Sensitivity",
];

/// One row of a replicate table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    /// Name of the replicate directory.
    #[serde(rename = "Replicate")]
    pub replicate: String,

    /// The parsed metrics.
    #[serde(flatten)]
    pub metrics: MetricsRecord,

    /// Mutant ratio relative to the replicate's reference row.
    #[serde(rename = "Sensitivity")]
    pub sensitivity: Option<f64>,
}

fn number<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ResultRow {
    /// The row's values as text in [`COLUMNS`] order. Missing values are
    /// empty strings.
    pub fn cells(&self) -> Vec<String> {
        let m = &self.metrics;
        vec![
            self.replicate.clone(),
            m.treatment.clone(),
            number(m.unmodified_percent),
            m.unmodified_reads.to_string(),
            number(m.mutant_percent),
            m.mutant_reads.to_string(),
            number(m.wild_type_percent),
            m.wild_type_reads.to_string(),
            number(m.frameshift_percent),
            m.frameshift_reads.to_string(),
            number(m.in_frame_percent),
            m.in_frame_reads.to_string(),
            number(m.indel_percent),
            m.indel_reads.to_string(),
            number(m.mutant_ratio),
            m.total_reads.to_string(),
            m.report
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            number(self.sensitivity),
        ]
    }
}

//===================//
// Replicate tables //
//===================//

/// The rows parsed for one replicate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplicateTable {
    /// Name of the replicate directory.
    pub replicate: String,

    /// One row per treatment that produced results.
    pub rows: Vec<ResultRow>,
}

fn replicates_or_all(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let (replicates, others): (Vec<_>, Vec<_>) = dirs
        .into_iter()
        .partition(|d| file_name(d).starts_with(REPLICATE_PREFIX));

    if replicates.is_empty() {
        others
    } else {
        replicates
    }
}

/// The treatment directories of a replicate. Result directories written by
/// the tool itself are not treatments.
fn treatment_directories(replicate: &Path) -> anyhow::Result<Vec<PathBuf>> {
    Ok(subdirectories(replicate)?
        .into_iter()
        .filter(|d| !file_name(d).starts_with(RESULT_PREFIX))
        .collect())
}

/// Lists the replicates in an output tree: the `Replica-*` directories, or
/// every directory if there are none. Sorted by name.
pub fn list_replicates(out_root: &Path) -> anyhow::Result<Vec<String>> {
    Ok(replicates_or_all(subdirectories(out_root)?)
        .iter()
        .map(|d| file_name(d))
        .collect())
}

/// Lists every treatment seen in any replicate, sorted by name. Without
/// replicate directories, the top-level directories are the treatments.
pub fn list_treatments(out_root: &Path) -> anyhow::Result<Vec<String>> {
    let dirs = subdirectories(out_root)?;
    if !dirs
        .iter()
        .any(|d| file_name(d).starts_with(REPLICATE_PREFIX))
    {
        return Ok(dirs.iter().map(|d| file_name(d)).collect());
    }

    let mut treatments = Vec::new();
    for replicate in replicates_or_all(dirs) {
        treatments.extend(treatment_directories(&replicate)?.iter().map(|d| file_name(d)));
    }

    Ok(treatments.into_iter().unique().sorted().collect())
}

/// Parses every treatment of one replicate and computes its sensitivities.
///
/// A replicate without treatment directories is parsed as a single sample.
/// Treatments without usable results are left out.
pub fn build_replicate_table(
    out_root: &Path,
    replicate: &str,
    references: &ReferenceSequences,
    selection: &ReferenceSelection,
) -> anyhow::Result<ReplicateTable> {
    let path = out_root.join(replicate);
    let treatments = treatment_directories(&path)?;

    let records: Vec<MetricsRecord> = if treatments.is_empty() {
        process_treatment_folder(&path, references).into_iter().collect()
    } else {
        treatments
            .iter()
            .filter_map(|t| {
                let record = process_treatment_folder(t, references);
                if record.is_none() {
                    debug!("no results for {}", t.display());
                }
                record
            })
            .collect()
    };

    let sensitivities = calculate_sensitivity(&records, selection);
    let rows = records
        .into_iter()
        .zip(sensitivities)
        .map(|(metrics, sensitivity)| ResultRow {
            replicate: replicate.to_string(),
            metrics,
            sensitivity,
        })
        .collect();

    Ok(ReplicateTable {
        replicate: replicate.to_string(),
        rows,
    })
}

/// Builds one table per replicate, in the order given.
pub fn build_tables(
    out_root: &Path,
    replicates: &[String],
    references: &ReferenceSequences,
    selection: &ReferenceSelection,
) -> anyhow::Result<Vec<ReplicateTable>> {
    let mut tables = Vec::with_capacity(replicates.len());
    for replicate in replicates {
        let table = build_replicate_table(out_root, replicate, references, selection)?;
        info!("{}: {} treatments with results.", replicate, table.rows.len());
        tables.push(table);
    }

    Ok(tables)
}

//==============//
// Result table //
//==============//

/// The rows of several replicate tables, concatenated.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultTable {
    /// Rows in display order.
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    /// Concatenates replicate tables, keeping their row order.
    pub fn concat(tables: &[ReplicateTable]) -> Self {
        ResultTable {
            rows: tables.iter().flat_map(|t| t.rows.iter().cloned()).collect(),
        }
    }

    /// Concatenates only the chosen replicates, in discovery order. With no
    /// choice, every replicate is kept. Unknown names are logged.
    pub fn select(tables: &[ReplicateTable], chosen: Option<&[String]>) -> Self {
        let chosen = match chosen {
            Some(names) => names,
            None => return Self::concat(tables),
        };

        for name in chosen {
            if !tables.iter().any(|t| &t.replicate == name) {
                warn!("replicate {} was selected but has no table", name);
            }
        }

        let kept: Vec<ReplicateTable> = tables
            .iter()
            .filter(|t| chosen.contains(&t.replicate))
            .cloned()
            .collect();
        Self::concat(&kept)
    }

    /// Treatments in order of first appearance.
    pub fn treatments(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.metrics.treatment.as_str())
            .unique()
            .collect()
    }

    /// Sorts rows by replicate, then by treatment. Treatments named in
    /// `order` come first, in that order; the rest follow in order of first
    /// appearance. The sort is stable.
    pub fn ordered(&self, order: &[String]) -> Self {
        let rank: IndexSet<&str> = order
            .iter()
            .map(String::as_str)
            .chain(self.treatments())
            .collect();

        let rank_of = |r: &ResultRow| rank.get_index_of(r.metrics.treatment.as_str());
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            a.replicate
                .cmp(&b.replicate)
                .then_with(|| rank_of(a).cmp(&rank_of(b)))
        });

        ResultTable { rows }
    }

    /// Writes the table as CSV with a header row. Missing values are empty
    /// fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(COLUMNS)?;
        for row in &self.rows {
            writer.write_record(row.cells())?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Writes the table as a JSON array of row objects. Missing values are
    /// `null`.
    pub fn write_json<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Renders the table for the terminal. The report path is left out.
    pub fn to_pretty_table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(Row::new(
            COLUMNS[..COLUMNS.len() - 2]
                .iter()
                .chain(COLUMNS.last())
                .map(|c| Cell::new(c))
                .collect(),
        ));

        for row in &self.rows {
            let m = &row.metrics;
            let cells = [
                row.replicate.clone(),
                m.treatment.clone(),
                OptionalPercent(m.unmodified_percent).to_string(),
                reads(m.unmodified_reads),
                OptionalPercent(m.mutant_percent).to_string(),
                reads(m.mutant_reads),
                OptionalPercent(m.wild_type_percent).to_string(),
                reads(m.wild_type_reads),
                OptionalPercent(m.frameshift_percent).to_string(),
                reads(m.frameshift_reads),
                OptionalPercent(m.in_frame_percent).to_string(),
                reads(m.in_frame_reads),
                OptionalPercent(m.indel_percent).to_string(),
                reads(m.indel_reads),
                OptionalPercent(m.mutant_ratio).to_string(),
                reads(m.total_reads),
                OptionalPercent(row.sensitivity).to_string(),
            ];
            table.add_row(Row::new(cells.iter().map(|c| Cell::new(c)).collect()));
        }

        table
    }
}
