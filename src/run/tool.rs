//! The contract with the external per-sample analysis tool.

use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::organize::classifier::REPLICATE_PREFIX;
use crate::pair::matcher::SamplePair;
use crate::utils::walk::file_name;

/// The program invoked when no other command is configured.
pub const DEFAULT_PROGRAM: &str = "CRISPResso";

/// Name of the file the run parameters are recorded in, within the output
/// root.
pub const PARAMS_FILE_NAME: &str = "run_params.json";

/// Fixed configuration shared by every job of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// The program followed by any leading arguments (for instance a
    /// `conda run -n env` wrapper). Must hold at least the program.
    pub command: Vec<String>,

    /// Amplicon sequence.
    pub amplicon: String,

    /// Guide sequence.
    pub guide: String,

    /// Coding sequence within the amplicon, if any.
    pub coding_seq: Option<String>,

    /// Minimum alignment score for a read to be aligned to the amplicon.
    pub min_aln_score: u32,

    /// Number of bases shown on either side of the cut site in plots.
    pub plot_window: u32,

    /// Processes each job may use.
    pub threads_per_job: usize,

    /// Free-form arguments appended to every invocation.
    pub extra_args: Vec<String>,
}

impl ToolConfig {
    /// Creates a configuration that invokes [`DEFAULT_PROGRAM`] with the
    /// default alignment score (60), plot window (20) and thread count (4).
    pub fn new(amplicon: String, guide: String) -> Self {
        ToolConfig {
            command: vec![String::from(DEFAULT_PROGRAM)],
            amplicon,
            guide,
            coding_seq: None,
            min_aln_score: 60,
            plot_window: 20,
            threads_per_job: 4,
            extra_args: Vec::new(),
        }
    }

    /// The program to execute.
    pub fn program(&self) -> anyhow::Result<&str> {
        match self.command.first() {
            Some(p) => Ok(p.as_str()),
            None => bail!("no analysis program configured"),
        }
    }

    /// The full argument list (excluding the program) for one sample.
    pub fn arguments(&self, pair: &SamplePair, output_directory: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.command.iter().skip(1).map(OsString::from).collect();

        args.push("-r1".into());
        args.push(pair.r1.clone().into_os_string());
        if let Some(r2) = &pair.r2 {
            args.push("-r2".into());
            args.push(r2.clone().into_os_string());
        }

        args.push("-a".into());
        args.push((&self.amplicon).into());
        args.push("-g".into());
        args.push((&self.guide).into());
        args.push("-o".into());
        args.push(output_directory.as_os_str().to_os_string());
        args.push("--n_processes".into());
        args.push(self.threads_per_job.to_string().into());

        if let Some(coding_seq) = &self.coding_seq {
            args.push("--coding_seq".into());
            args.push(coding_seq.into());
        }

        args.push("--default_min_aln_score".into());
        args.push(self.min_aln_score.to_string().into());
        args.push("--plot_window_size".into());
        args.push(self.plot_window.to_string().into());

        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }

    /// Records the configuration in `<out_root>/run_params.json`.
    pub fn write(&self, out_root: &Path) -> anyhow::Result<PathBuf> {
        let path = out_root.join(PARAMS_FILE_NAME);
        let mut file =
            File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let output = serde_json::to_string_pretty(&self)?;
        file.write_all(output.as_bytes())?;

        Ok(path)
    }

    /// Reads back a configuration recorded by [`ToolConfig::write`].
    pub fn read(out_root: &Path) -> anyhow::Result<ToolConfig> {
        let path = out_root.join(PARAMS_FILE_NAME);
        let contents =
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// The directory a sample's results are written to.
///
/// Samples organized into `<Replica-N>/<treatment>/` keep that hierarchy under
/// `out_root`; anything else lands directly in `<out_root>/<sample>`.
pub fn sample_output_directory(pair: &SamplePair, out_root: &Path) -> PathBuf {
    let parent = pair.r1.parent();
    let replicate = parent.and_then(Path::parent).map(file_name);

    match (parent, replicate) {
        (Some(treatment), Some(replicate)) if replicate.starts_with(REPLICATE_PREFIX) => out_root
            .join(replicate)
            .join(file_name(treatment))
            .join(&pair.sample_name),
        _ => out_root.join(&pair.sample_name),
    }
}
