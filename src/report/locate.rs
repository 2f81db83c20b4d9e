//! Discovery of the report files within a sample's output directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::utils::walk::{file_name, glob_sorted};

/// Mapping statistics (total read counts).
pub const MAPPING_STATISTICS: &str = "CRISPResso_mapping_statistics.txt";

/// Quantification of editing frequency (unmodified and modified reads).
pub const EDITING_QUANTIFICATION: &str = "CRISPResso_quantification_of_editing_frequency.txt";

/// Frameshift analysis (in-frame and frameshift reads).
pub const FRAMESHIFT_ANALYSIS: &str = "Frameshift_analysis.txt";

/// Candidate names for the allele frequency table, most specific first. The
/// file name embeds the guide or cut site, so it is matched by pattern.
pub const ALLELE_TABLE_PATTERNS: [&str; 3] = [
    "Alleles_frequency_table_around_sgRNA_*.txt",
    "Alleles_frequency_table_around_cut_site_*.txt",
    "Alleles_frequency_table*.txt",
];

/// Prefix of the directories and HTML summaries the tool creates.
pub const RESULT_PREFIX: &str = "CRISPResso_on_";

/// The report files of one sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportFiles {
    /// Directory that directly holds the report files.
    pub result_directory: PathBuf,

    /// See [`MAPPING_STATISTICS`].
    pub mapping_statistics: PathBuf,

    /// See [`EDITING_QUANTIFICATION`].
    pub editing_quantification: PathBuf,

    /// See [`FRAMESHIFT_ANALYSIS`].
    pub frameshift_analysis: PathBuf,

    /// The chosen allele frequency table.
    pub allele_table: PathBuf,

    /// The HTML summary, if one was written.
    pub report_html: Option<PathBuf>,
}

/// Finds the directory that directly holds the report files: `dir` itself, or
/// otherwise the first nested directory (in path order) that contains the
/// mapping statistics file.
pub fn result_directory(dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    if dir.join(MAPPING_STATISTICS).is_file() {
        return Ok(Some(dir.to_path_buf()));
    }

    let nested = glob_sorted(dir, &format!("**/{}", MAPPING_STATISTICS))?;
    Ok(nested
        .into_iter()
        .find(|p| p.is_file())
        .and_then(|p| p.parent().map(PathBuf::from)))
}

/// Chooses the allele frequency table within `dir`.
///
/// Patterns are tried in [`ALLELE_TABLE_PATTERNS`] order and the first pattern
/// with any match decides. Within that pattern the lexicographically first
/// file wins; if there were several, a warning names the ones passed over.
pub fn allele_table(dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    for pattern in ALLELE_TABLE_PATTERNS {
        let mut matches = glob_sorted(dir, pattern)?;
        matches.retain(|p| p.is_file());

        if matches.is_empty() {
            continue;
        }

        let chosen = matches.remove(0);
        if !matches.is_empty() {
            warn!(
                "{} holds {} allele tables matching `{}`; using {} and ignoring {}",
                dir.display(),
                matches.len() + 1,
                pattern,
                file_name(&chosen),
                matches
                    .iter()
                    .map(|p| file_name(p))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        return Ok(Some(chosen));
    }

    Ok(None)
}

/// Finds the HTML summary for a result directory. The tool writes it next to
/// its `CRISPResso_on_*` directory, so that is where we look when the result
/// directory carries the prefix.
pub fn report_html(result_directory: &Path) -> anyhow::Result<Option<PathBuf>> {
    let sample_directory = match result_directory.parent() {
        Some(parent) if file_name(result_directory).starts_with(RESULT_PREFIX) => parent,
        _ => result_directory,
    };

    let matches = glob_sorted(sample_directory, &format!("{}*.html", RESULT_PREFIX))?;
    Ok(matches.into_iter().next())
}

/// Locates every report file for the sample output in `dir`. Returns [`None`]
/// when any required file is missing, which is the expected state for a job
/// that failed.
pub fn locate(dir: &Path) -> anyhow::Result<Option<ReportFiles>> {
    let result_directory = match result_directory(dir)? {
        Some(d) => d,
        None => {
            debug!("no results found under {}", dir.display());
            return Ok(None);
        }
    };

    let allele_table = match allele_table(&result_directory)? {
        Some(p) => p,
        None => {
            debug!("no allele table found in {}", result_directory.display());
            return Ok(None);
        }
    };

    let files = ReportFiles {
        mapping_statistics: result_directory.join(MAPPING_STATISTICS),
        editing_quantification: result_directory.join(EDITING_QUANTIFICATION),
        frameshift_analysis: result_directory.join(FRAMESHIFT_ANALYSIS),
        allele_table,
        report_html: report_html(&result_directory)?,
        result_directory,
    };

    for required in [
        &files.mapping_statistics,
        &files.editing_quantification,
        &files.frameshift_analysis,
    ] {
        if !required.is_file() {
            debug!("missing report file {}", required.display());
            return Ok(None);
        }
    }

    Ok(Some(files))
}
