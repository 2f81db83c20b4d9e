//! The end-to-end pipeline: archive extraction, reorganization, pairing, job
//! execution and aggregation over one scratch directory.
//!
//! A [`PipelineContext`] owns the scratch directory the input archive is
//! extracted into. The directory is removed when the context is dropped (or
//! explicitly with [`PipelineContext::close`]), so nothing is left behind
//! between runs.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use indicatif::ProgressBar;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::aggregate::command::{collect_results, ReportArgs};
use crate::aggregate::table::ResultTable;
use crate::errors::PipelineError;
use crate::organize::classifier::{reorganize, ReorganizeSummary};
use crate::pair::matcher::{pair_fastqs, SamplePair};
use crate::report::parse::ReferenceSequences;
use crate::run::orchestrator::{run_jobs, CancellationToken, RunReport, SchedulerOptions};
use crate::run::tool::ToolConfig;

/// Extracts a ZIP archive into `dest`, creating it if needed. Returns the
/// number of entries in the archive. Entries whose names would escape `dest`
/// are rejected by the archive reader.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize, PipelineError> {
    let wrap = |source: zip::result::ZipError| PipelineError::Archive {
        path: archive.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(|e| wrap(e.into()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(wrap)?;
    fs::create_dir_all(dest).map_err(|e| wrap(e.into()))?;
    zip.extract(dest).map_err(wrap)?;

    Ok(zip.len())
}

/// State carried through one pipeline run.
#[derive(Debug)]
pub struct PipelineContext {
    scratch: TempDir,
    input_root: PathBuf,
    out_root: PathBuf,
    warnings: Vec<String>,
}

impl PipelineContext {
    /// Extracts `archive` into a fresh scratch directory. Results will be
    /// written beneath `out_root`.
    pub fn from_archive(archive: &Path, out_root: PathBuf) -> anyhow::Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("editbatch-")
            .tempdir()
            .context("creating scratch directory")?;
        let input_root = scratch.path().join("input");

        let entries = extract_archive(archive, &input_root)?;
        info!(
            "Extracted {} entries from {} into {}.",
            entries,
            archive.display(),
            input_root.display()
        );

        Ok(PipelineContext {
            scratch,
            input_root,
            out_root,
            warnings: Vec::new(),
        })
    }

    /// Where the archive was extracted.
    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    /// Where results are written.
    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    /// Every non-fatal problem seen so far, in the order it was seen.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Sorts the extracted FASTQ files into the replicate and treatment
    /// hierarchy.
    pub fn organize(&mut self) -> anyhow::Result<ReorganizeSummary> {
        let summary = reorganize(&self.input_root)?;
        self.warnings
            .extend(summary.warnings.iter().map(ToString::to_string));

        Ok(summary)
    }

    /// Pairs the organized FASTQ files. Finding no pair at all is an error.
    pub fn pair(&mut self) -> anyhow::Result<Vec<SamplePair>> {
        let result = pair_fastqs(&self.input_root)?;

        self.warnings.extend(
            result
                .orphans
                .iter()
                .map(|p| format!("{}: no matching read one file", p.display())),
        );

        if result.pairs.is_empty() {
            return Err(PipelineError::NoPairs(self.input_root.clone()).into());
        }

        info!("Found {} samples.", result.pairs.len());
        Ok(result.pairs)
    }

    /// Records the run parameters in the output directory and runs one job
    /// per sample.
    pub async fn run(
        &self,
        pairs: Vec<SamplePair>,
        config: Arc<ToolConfig>,
        options: &SchedulerOptions,
        cancel: CancellationToken,
        progress: &ProgressBar,
    ) -> anyhow::Result<RunReport> {
        fs::create_dir_all(&self.out_root)
            .with_context(|| format!("creating output directory {}", self.out_root.display()))?;
        let params = config.write(&self.out_root)?;
        info!("Recorded run parameters in {}.", params.display());

        run_jobs(pairs, config, &self.out_root, options, cancel, progress).await
    }

    /// Parses the results in the output directory into the final table.
    pub fn aggregate(
        &self,
        references: &ReferenceSequences,
        report: &ReportArgs,
    ) -> anyhow::Result<ResultTable> {
        collect_results(&self.out_root, references, report)
    }

    /// Removes the scratch directory, reporting any failure to do so.
    pub fn close(self) -> anyhow::Result<()> {
        if !self.warnings.is_empty() {
            warn!(
                "{} input files were skipped; see the warnings above.",
                self.warnings.len()
            );
        }

        let path = self.scratch.path().to_path_buf();
        self.scratch
            .close()
            .with_context(|| format!("removing scratch directory {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, names: &[&str]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = FileOptions::default();
        for name in names {
            zip.start_file(*name, options).unwrap();
            zip.write_all(b"").unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(&archive, &["reads/a_R1.fastq.gz", "reads/a_R2.fastq.gz"]);

        let dest = dir.path().join("out");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), 2);
        assert!(dest.join("reads/a_R1.fastq.gz").is_file());
    }

    #[test]
    fn test_bad_archives() {
        let dir = tempfile::tempdir().unwrap();

        let missing = extract_archive(&dir.path().join("missing.zip"), dir.path());
        assert!(matches!(missing, Err(PipelineError::Archive { .. })));

        let junk = dir.path().join("junk.zip");
        fs::write(&junk, "not a zip file").unwrap();
        let err = extract_archive(&junk, &dir.path().join("out")).unwrap_err();
        assert!(err.to_string().contains("junk.zip"));
    }

    #[test]
    fn test_scratch_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(&archive, &["notes.txt"]);

        let mut ctx = PipelineContext::from_archive(&archive, dir.path().join("out")).unwrap();
        let scratch = ctx.input_root().to_path_buf();
        assert!(scratch.join("notes.txt").is_file());

        let err = ctx.pair().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoPairs(_))
        ));

        ctx.close().unwrap();
        assert!(!scratch.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_end_to_end() {
        use crate::testing;

        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bundle.zip");
        write_zip(
            &archive,
            &[
                "Day0_KRAS_untreated_1_R1.fastq.gz",
                "Day0_KRAS_untreated_1_R2.fastq.gz",
                "nested/Day7_KRAS_drug_1_R1.fastq.gz",
                "nested/Day7_KRAS_drug_1_R2.fastq.gz",
                "Day0_KRAS_untreated_2_R1.fastq.gz",
                "Day0_KRAS_untreated_2_R2.fastq.gz",
                "Day7_KRAS_drug_2_FAILME_R1.fastq.gz",
                "Day7_KRAS_drug_2_FAILME_R2.fastq.gz",
                "Day9_KRAS_drug_3_R2.fastq.gz",
            ],
        );

        let out = dir.path().join("results");
        let mut ctx = PipelineContext::from_archive(&archive, out.clone()).unwrap();
        let summary = ctx.organize().unwrap();
        assert_eq!(summary.moved, 9);

        let pairs = ctx.pair().unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(ctx.warnings().len(), 1);

        let config = Arc::new(testing::fake_tool_config(dir.path()));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let report = runtime
            .block_on(ctx.run(
                pairs,
                Arc::clone(&config),
                &SchedulerOptions::default(),
                CancellationToken::never(),
                &ProgressBar::hidden(),
            ))
            .unwrap();

        let failures: Vec<&String> = report
            .messages
            .iter()
            .filter(|m| m.starts_with("[ERROR]"))
            .collect();
        assert_eq!(failures, vec!["[ERROR] Day7_KRAS_drug_2_FAILME failed."]);
        assert_eq!(
            report
                .messages
                .iter()
                .filter(|m| m.starts_with("All jobs completed"))
                .count(),
            1
        );
        assert_eq!(ToolConfig::read(&out).unwrap(), *config);

        let table = ctx
            .aggregate(&testing::reference_sequences(), &ReportArgs::default())
            .unwrap();
        let keys: Vec<(&str, &str)> = table
            .rows
            .iter()
            .map(|r| (r.replicate.as_str(), r.metrics.treatment.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Replica-1", "Day0_untreated"),
                ("Replica-1", "Day7_drug"),
                ("Replica-2", "Day0_untreated"),
            ]
        );
        assert!(table.rows.iter().all(|r| r.sensitivity == Some(100.0)));

        ctx.close().unwrap();
    }
}
