//! Reconstruction of paired-end samples from a directory of FASTQ files.
//!
//! Two naming conventions are recognized: `<base>_R1.fastq.gz` /
//! `<base>_R2.fastq.gz` and `<base>_1.fastq.gz` / `<base>_2.fastq.gz`, each
//! with an optional run-chunk suffix (`_001`, `-01`, ...) that is ignored.
//! Files are paired by their parent directory and base name, so identical base
//! names in different folders do not collide.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::utils::walk::{file_name, glob_sorted};

lazy_static! {
    static ref READ_FILE_REGEX: Regex =
        RegexBuilder::new(r"^(?P<base>.+?)_(?:R)?(?P<read>[12])(?:[_-]?\d+)?\.fastq\.gz$")
            .case_insensitive(true)
            .build()
            .unwrap();
}

/// Which member of a read pair a file holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ReadIndex {
    /// Read one.
    One,

    /// Read two.
    Two,
}

/// The unit files are paired on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleKey {
    /// Directory that holds the file.
    pub directory: PathBuf,

    /// File name with the read marker and extension removed.
    pub base_name: String,
}

/// A single member of a read pair discovered on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawReadFile {
    /// The pairing key of the file.
    pub key: SampleKey,

    /// Which read the file holds.
    pub read_index: ReadIndex,

    /// Full path to the file.
    pub path: PathBuf,
}

impl RawReadFile {
    /// Attempts to interpret `path` as one member of a read pair. Returns
    /// [`None`] for files that follow neither naming convention.
    pub fn new(path: impl AsRef<Path>) -> Option<RawReadFile> {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?;
        let caps = READ_FILE_REGEX.captures(name)?;

        let read_index = match caps.name("read")?.as_str() {
            "1" => ReadIndex::One,
            _ => ReadIndex::Two,
        };

        Some(RawReadFile {
            key: SampleKey {
                directory: path.parent().map(PathBuf::from).unwrap_or_default(),
                base_name: caps.name("base")?.as_str().to_string(),
            },
            read_index,
            path: path.to_path_buf(),
        })
    }
}

/// One sample ready to be handed to the external tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SamplePair {
    /// Displayed sample name (the base name; the directory is not part of it).
    pub sample_name: String,

    /// Read one.
    pub r1: PathBuf,

    /// Read two, if present.
    pub r2: Option<PathBuf>,
}

/// Everything the pair matcher found beneath a directory.
#[derive(Debug, Default, Serialize)]
pub struct PairingResult {
    /// Samples with at least a read one, sorted by directory then base name.
    pub pairs: Vec<SamplePair>,

    /// Read two files without a read one. These are not run.
    pub orphans: Vec<PathBuf>,

    /// Files discarded because an earlier file already claimed the same key
    /// and read.
    pub duplicates: Vec<PathBuf>,
}

/// Recursively finds `*.fastq.gz` files beneath `root` and pairs read one with
/// read two files.
///
/// At most one read one and one read two are kept per key; on duplicates the
/// first file in sorted path order wins. Files that do not match either naming
/// convention are skipped silently.
pub fn pair_fastqs(root: &Path) -> anyhow::Result<PairingResult> {
    let mut r1_map: BTreeMap<SampleKey, PathBuf> = BTreeMap::new();
    let mut r2_map: BTreeMap<SampleKey, PathBuf> = BTreeMap::new();
    let mut result = PairingResult::default();

    for path in glob_sorted(root, "**/*.fastq.gz")? {
        let file = match RawReadFile::new(&path) {
            Some(f) => f,
            None => {
                debug!("{} is not a recognized read file", file_name(&path));
                continue;
            }
        };

        let map = match file.read_index {
            ReadIndex::One => &mut r1_map,
            ReadIndex::Two => &mut r2_map,
        };

        if map.contains_key(&file.key) {
            debug!(
                "ignoring {}: another file already provides this read",
                file.path.display()
            );
            result.duplicates.push(file.path);
        } else {
            map.insert(file.key, file.path);
        }
    }

    for (key, r1) in r1_map {
        let r2 = r2_map.remove(&key);
        result.pairs.push(SamplePair {
            sample_name: key.base_name,
            r1,
            r2,
        });
    }

    result.orphans = r2_map.into_values().collect();
    for orphan in &result.orphans {
        warn!(
            "{} has no matching read one file and will not be analyzed",
            orphan.display()
        );
    }

    info!(
        "Found {} samples ({} paired-end) under {}.",
        result.pairs.len(),
        result.pairs.iter().filter(|p| p.r2.is_some()).count(),
        root.display()
    );

    Ok(result)
}
