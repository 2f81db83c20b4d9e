//! Assembly of one metrics record per sample output directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, warn};

use crate::report::locate::{self, ReportFiles};
use crate::report::parse::{
    self, AlleleCounts, EditingCounts, FrameCounts, ReferenceSequences,
};
use crate::utils::display::percent_of;
use crate::utils::walk::file_name;

/// The parsed metrics for one treatment of one replicate. Field names
/// serialize to the column names of the final table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsRecord {
    /// Name of the treatment directory.
    #[serde(rename = "Treatment")]
    pub treatment: String,

    /// Unmodified reads as a percentage of the total.
    #[serde(rename = "WT/Unmodified%")]
    pub unmodified_percent: Option<f64>,

    /// Unmodified reads.
    #[serde(rename = "Reads (WT/Unmodified)")]
    pub unmodified_reads: u64,

    /// Mutant reads as a percentage of the total.
    #[serde(rename = "MUT%")]
    pub mutant_percent: Option<f64>,

    /// Reads supporting the mutant allele.
    #[serde(rename = "Reads (MUT)")]
    pub mutant_reads: u64,

    /// Wild-type reads as a percentage of the total.
    #[serde(rename = "WT*%")]
    pub wild_type_percent: Option<f64>,

    /// Reads supporting the edited wild-type allele.
    #[serde(rename = "Reads (WT*)")]
    pub wild_type_reads: u64,

    /// Frameshifted reads as a percentage of the total.
    #[serde(rename = "Frameshift%")]
    pub frameshift_percent: Option<f64>,

    /// Reads with a frameshift mutation.
    #[serde(rename = "Reads (Frameshift)")]
    pub frameshift_reads: u64,

    /// In-frame mutated reads as a percentage of the total.
    #[serde(rename = "In-frame%")]
    pub in_frame_percent: Option<f64>,

    /// Reads with an in-frame mutation.
    #[serde(rename = "Reads (In-frame)")]
    pub in_frame_reads: u64,

    /// Modified reads as a percentage of the total.
    #[serde(rename = "Indel%")]
    pub indel_percent: Option<f64>,

    /// Modified reads.
    #[serde(rename = "Reads (Indel)")]
    pub indel_reads: u64,

    /// Mutant reads over mutant plus wild-type reads.
    #[serde(rename = "MUT/WT*%")]
    pub mutant_ratio: Option<f64>,

    /// Aligned reads.
    #[serde(rename = "Total Reads")]
    pub total_reads: u64,

    /// The HTML summary for the sample, if any.
    #[serde(rename = "Report")]
    pub report: Option<PathBuf>,
}

impl MetricsRecord {
    /// Derives every percentage from the raw counts. With zero total reads,
    /// every percentage is [`None`].
    pub fn from_counts(
        treatment: String,
        total_reads: u64,
        editing: EditingCounts,
        frames: FrameCounts,
        alleles: AlleleCounts,
        report: Option<PathBuf>,
    ) -> Self {
        let of_total = |n: u64| percent_of(n, total_reads);
        let mutant_ratio = if total_reads == 0 {
            None
        } else {
            percent_of(alleles.mutant, alleles.mutant + alleles.wild_type)
        };

        MetricsRecord {
            treatment,
            unmodified_percent: of_total(editing.unmodified),
            unmodified_reads: editing.unmodified,
            mutant_percent: of_total(alleles.mutant),
            mutant_reads: alleles.mutant,
            wild_type_percent: of_total(alleles.wild_type),
            wild_type_reads: alleles.wild_type,
            frameshift_percent: of_total(frames.frameshift),
            frameshift_reads: frames.frameshift,
            in_frame_percent: of_total(frames.in_frame),
            in_frame_reads: frames.in_frame,
            indel_percent: of_total(editing.modified),
            indel_reads: editing.modified,
            mutant_ratio,
            total_reads,
            report,
        }
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn parse_reports(
    treatment: String,
    files: &ReportFiles,
    references: &ReferenceSequences,
) -> anyhow::Result<Option<MetricsRecord>> {
    let total_reads = match parse::total_reads(&read(&files.mapping_statistics)?) {
        Some(n) => n,
        None => {
            warn!(
                "no aligned read count in {}",
                files.mapping_statistics.display()
            );
            return Ok(None);
        }
    };

    let editing = match parse::editing_counts(&read(&files.editing_quantification)?) {
        Some(counts) => counts,
        None => {
            warn!(
                "no unmodified or modified read counts in {}",
                files.editing_quantification.display()
            );
            return Ok(None);
        }
    };

    let frames = parse::frame_counts(&read(&files.frameshift_analysis)?);
    let alleles = parse::allele_counts(&read(&files.allele_table)?, references)
        .with_context(|| format!("parsing {}", files.allele_table.display()))?;

    debug!(
        "{}: {} reads, {:?}, {:?}, {:?}",
        treatment, total_reads, editing, frames, alleles
    );

    Ok(Some(MetricsRecord::from_counts(
        treatment,
        total_reads,
        editing,
        frames,
        alleles,
        files.report_html.clone(),
    )))
}

/// Parses the results found under one treatment directory (or a replicate
/// directory standing in for a single sample).
///
/// Returns [`None`] when the results are missing, which is the normal state
/// for a sample whose job failed, or when they cannot be parsed; the latter
/// is logged as a warning.
pub fn process_treatment_folder(
    path: &Path,
    references: &ReferenceSequences,
) -> Option<MetricsRecord> {
    let files = match locate::locate(path) {
        Ok(Some(files)) => files,
        Ok(None) => return None,
        Err(e) => {
            warn!("could not search {} for results: {:#}", path.display(), e);
            return None;
        }
    };

    match parse_reports(file_name(path), &files, references) {
        Ok(record) => record,
        Err(e) => {
            warn!("skipping {}: {:#}", path.display(), e);
            None
        }
    }
}
