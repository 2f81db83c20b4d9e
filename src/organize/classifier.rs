//! Filename-based classification of samples into replicates and treatments.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::utils::walk::{file_name, glob_sorted};

/// Prefix carried by every replicate directory name.
pub const REPLICATE_PREFIX: &str = "Replica-";

/// Replicate directory for files that do not follow the naming grammar.
pub const UNKNOWN_REPLICATE: &str = "Replica-unknown";

/// Treatment directory for files that do not follow the naming grammar.
pub const UNKNOWN_TREATMENT: &str = "Day-unknown";

/// Treatment used when a name carries no treatment token.
pub const DEFAULT_TREATMENT: &str = "untreated";

lazy_static! {
    // DayN_[generation_]variant_treatment_repM[_rerun]...fastq[.gz]
    static ref SAMPLE_NAME_REGEX: Regex = RegexBuilder::new(
        r"^Day(?P<day>\d+)_(?:(?P<generation>[^_]+)_)?(?P<variant>[^_]+)_(?P<treatment>[^_]+)_(?P<replicate>\d+)(?P<rerun>_rerun)?.*\.fastq(?:\.gz)?$"
    )
    .case_insensitive(true)
    .build()
    .unwrap();
}

/// The replicate and treatment a read file belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReplicateTreatmentTag {
    /// Replicate identifier, e.g. `Replica-2`.
    pub replicate: String,

    /// Treatment identifier, e.g. `Day7_drug` or `Day7_drug_rerun`.
    pub treatment: String,
}

impl ReplicateTreatmentTag {
    /// The tag given to files that could not be classified.
    pub fn unknown() -> Self {
        ReplicateTreatmentTag {
            replicate: String::from(UNKNOWN_REPLICATE),
            treatment: String::from(UNKNOWN_TREATMENT),
        }
    }

    /// The directory under `root` where files with this tag belong.
    pub fn directory(&self, root: &Path) -> PathBuf {
        root.join(&self.replicate).join(&self.treatment)
    }
}

impl fmt::Display for ReplicateTreatmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.replicate, self.treatment)
    }
}

/// Classifies a file name into its replicate and treatment. Returns [`None`]
/// when the name does not follow the naming grammar.
///
/// ```
/// use editbatch::organize::classifier::classify;
///
/// let tag = classify("Day7_G2_KRAS_Drug_3_rerun_R1.fastq.gz").unwrap();
/// assert_eq!(tag.replicate, "Replica-3");
/// assert_eq!(tag.treatment, "Day7_drug_rerun");
/// assert!(classify("undetermined_R1.fastq.gz").is_none());
/// ```
pub fn classify(name: &str) -> Option<ReplicateTreatmentTag> {
    let caps = SAMPLE_NAME_REGEX.captures(name)?;

    let day = caps.name("day")?.as_str();
    let replicate = caps.name("replicate")?.as_str();
    let treatment = caps
        .name("treatment")
        .map(|m| m.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TREATMENT)
        .to_lowercase();

    let treatment = match caps.name("rerun") {
        Some(_) => format!("Day{}_{}_rerun", day, treatment),
        None => format!("Day{}_{}", day, treatment),
    };

    Some(ReplicateTreatmentTag {
        replicate: format!("{}{}", REPLICATE_PREFIX, replicate),
        treatment,
    })
}

/// A file that could not be moved during reorganization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveWarning {
    /// The file that stayed where it was.
    pub path: PathBuf,

    /// Why it was not moved.
    pub reason: String,
}

impl fmt::Display for MoveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not move {}: {}", self.path.display(), self.reason)
    }
}

/// The outcome of a reorganization pass.
#[derive(Debug, Default, Serialize)]
pub struct ReorganizeSummary {
    /// Number of files moved into the hierarchy.
    pub moved: usize,

    /// Number of files that were already where they belong.
    pub already_in_place: usize,

    /// Number of files that did not follow the naming grammar.
    pub unclassified: usize,

    /// Files that were left untouched because of a filesystem problem.
    pub warnings: Vec<MoveWarning>,
}

/// Lists the read files beneath `root` that take part in reorganization.
fn read_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    glob_sorted(root, "**/*.fastq.gz")
}

/// Whether `path` already lives in `directory`.
fn already_in(path: &Path, directory: &Path) -> bool {
    let parent = match path.parent().map(fs::canonicalize) {
        Some(Ok(p)) => p,
        _ => return false,
    };

    match fs::canonicalize(directory) {
        Ok(d) => d == parent,
        Err(_) => false,
    }
}

/// Moves every gzipped read file under `root` into
/// `<root>/<replicate>/<treatment>/<name>`. Files that do not follow the naming
/// grammar go to `<root>/Replica-unknown/Day-unknown/`.
///
/// Files that already sit in their destination are left alone, so running this
/// twice performs no additional moves. A file that cannot be moved never stops
/// the batch; it is recorded as a [`MoveWarning`] instead.
pub fn reorganize(root: &Path) -> anyhow::Result<ReorganizeSummary> {
    let mut summary = ReorganizeSummary::default();

    for path in read_files(root)? {
        let name = file_name(&path);
        let tag = match classify(&name) {
            Some(tag) => tag,
            None => {
                debug!("{} does not follow the sample naming grammar", name);
                summary.unclassified += 1;
                ReplicateTreatmentTag::unknown()
            }
        };

        let destination = tag.directory(root);
        if let Err(e) = fs::create_dir_all(&destination) {
            summary.warnings.push(MoveWarning {
                path,
                reason: format!("creating {}: {}", destination.display(), e),
            });
            continue;
        }

        if already_in(&path, &destination) {
            summary.already_in_place += 1;
            continue;
        }

        let target = destination.join(&name);
        if target.exists() {
            summary.warnings.push(MoveWarning {
                path,
                reason: format!("{} already exists", target.display()),
            });
            continue;
        }

        match fs::rename(&path, &target) {
            Ok(()) => {
                debug!("moved {} into {}", name, tag);
                summary.moved += 1;
            }
            Err(e) => summary.warnings.push(MoveWarning {
                path,
                reason: e.to_string(),
            }),
        }
    }

    for warning in &summary.warnings {
        warn!("{}", warning);
    }

    info!(
        "Reorganized read files: {} moved, {} already in place, {} unclassified, {} warnings.",
        summary.moved,
        summary.already_in_place,
        summary.unclassified,
        summary.warnings.len()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tag(replicate: &str, treatment: &str) -> Option<ReplicateTreatmentTag> {
        Some(ReplicateTreatmentTag {
            replicate: replicate.to_string(),
            treatment: treatment.to_string(),
        })
    }

    #[test]
    fn test_classify_with_generation() {
        assert_eq!(
            classify("Day7_G2_KRAS_DMSO_1_R1.fastq.gz"),
            tag("Replica-1", "Day7_dmso")
        );
    }

    #[test]
    fn test_classify_without_generation() {
        assert_eq!(
            classify("Day14_KRAS_Sotorasib_2_R2_001.fastq.gz"),
            tag("Replica-2", "Day14_sotorasib")
        );
    }

    #[test]
    fn test_classify_rerun_and_case() {
        assert_eq!(
            classify("day0_kras_Untreated_4_RERUN_R1.FASTQ"),
            tag("Replica-4", "Day0_untreated_rerun")
        );
        assert_eq!(
            classify("Day3_KRAS_drug_1_rerun_R1.fastq"),
            tag("Replica-1", "Day3_drug_rerun")
        );
    }

    #[test]
    fn test_tag_display() {
        let tag = classify("Day7_G2_KRAS_DMSO_1_rerun_R1.fastq.gz").unwrap();
        assert_eq!(tag.to_string(), "Replica-1/Day7_dmso_rerun");
        assert_eq!(
            ReplicateTreatmentTag::unknown().to_string(),
            "Replica-unknown/Day-unknown"
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let name = "Day7_G2_KRAS_DMSO_1_R1.fastq.gz";
        assert_eq!(classify(name), classify(name));
    }

    #[test]
    fn test_unclassified_names() {
        for name in [
            "sample_R1.fastq.gz",
            "Day7_KRAS_1_R1.fastq.gz",
            "Day7_G2_KRAS_DMSO_1_R1.bam",
            "",
            "DayX_KRAS_DMSO_1_R1.fastq.gz",
        ] {
            assert_eq!(classify(name), None, "{}", name);
        }
    }

    #[test]
    fn test_reorganize_moves_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("upload/nested")).unwrap();
        std::fs::write(root.join("upload/Day0_KRAS_untreated_1_R1.fastq.gz"), "").unwrap();
        std::fs::write(root.join("upload/nested/Day0_KRAS_untreated_1_R2.fastq.gz"), "").unwrap();
        std::fs::write(root.join("Day7_G1_KRAS_drug_2_R1.fastq.gz"), "").unwrap();
        std::fs::write(root.join("mystery_R1.fastq.gz"), "").unwrap();
        std::fs::write(root.join("README.txt"), "").unwrap();

        let summary = reorganize(root).unwrap();
        assert_eq!(summary.moved, 4);
        assert_eq!(summary.unclassified, 1);
        assert!(summary.warnings.is_empty());

        assert!(root
            .join("Replica-1/Day0_untreated/Day0_KRAS_untreated_1_R1.fastq.gz")
            .exists());
        assert!(root
            .join("Replica-1/Day0_untreated/Day0_KRAS_untreated_1_R2.fastq.gz")
            .exists());
        assert!(root
            .join("Replica-2/Day7_drug/Day7_G1_KRAS_drug_2_R1.fastq.gz")
            .exists());
        assert!(root
            .join("Replica-unknown/Day-unknown/mystery_R1.fastq.gz")
            .exists());
        assert!(root.join("README.txt").exists());

        let again = reorganize(root).unwrap();
        assert_eq!(again.moved, 0);
        assert_eq!(again.already_in_place, 4);
        assert!(again.warnings.is_empty());
    }

    #[test]
    fn test_reorganize_moves_only_what_can_be_paired() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in [
            "Day0_KRAS_untreated_1_R1.fastq.gz",
            "Day0_KRAS_untreated_1_R2.fastq.gz",
            "Day7_KRAS_drug_1_R1.fastq",
            "Day7_KRAS_drug_1_R2.fastq",
        ] {
            std::fs::write(root.join(name), "").unwrap();
        }

        let summary = reorganize(root).unwrap();
        assert_eq!(summary.moved, 2);
        assert!(root.join("Day7_KRAS_drug_1_R1.fastq").exists());
        assert!(!root.join("Replica-1/Day7_drug").exists());

        let pairing = crate::pair::matcher::pair_fastqs(root).unwrap();
        assert_eq!(pairing.pairs.len(), 1);
        assert_eq!(
            pairing.pairs[0].r1,
            root.join("Replica-1/Day0_untreated/Day0_KRAS_untreated_1_R1.fastq.gz")
        );
    }

    #[test]
    fn test_reorganize_reports_collisions_instead_of_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        std::fs::write(root.join("a/Day0_KRAS_untreated_1_R1.fastq.gz"), "first").unwrap();
        std::fs::write(root.join("b/Day0_KRAS_untreated_1_R1.fastq.gz"), "second").unwrap();

        let summary = reorganize(root).unwrap();
        assert_eq!(summary.moved, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(
            summary.warnings[0].path,
            root.join("b/Day0_KRAS_untreated_1_R1.fastq.gz")
        );

        let kept = std::fs::read_to_string(
            root.join("Replica-1/Day0_untreated/Day0_KRAS_untreated_1_R1.fastq.gz"),
        )
        .unwrap();
        assert_eq!(kept, "first");
    }
}
