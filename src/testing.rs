//! Fixtures shared by the unit tests: report files in the layout the analysis
//! tool writes, and a shell script standing in for the tool.

use std::fs;
use std::path::{Path, PathBuf};

use crate::pair::matcher::SamplePair;
use crate::report::parse::ReferenceSequences;
use crate::run::tool::ToolConfig;

pub const AMPLICON: &str = "GATTACAGGCATTCCGAGTAC";
pub const GUIDE: &str = "GATTACAGGCATTCCG";
pub const MUTANT: &str = "GGCATTC";
pub const WILD_TYPE: &str = "GGCTTTC";

pub const MAPPING_STATISTICS: &str = "READS IN INPUTS\tREADS AFTER PREPROCESSING\tREADS ALIGNED\tN_COMPUTED_ALN\tN_CACHED_ALN\tN_COMPUTED_NOTALN\tN_CACHED_NOTALN\n\
1000\t1000\t800\t12\t788\t200\t0\n";

pub const EDITING_QUANTIFICATION: &str = "Amplicon\tUnmodified%\tModified%\tReads_in_input\tReads_aligned_all_amplicons\tReads_aligned\tUnmodified\tModified\tDiscarded\tInsertions\tDeletions\tSubstitutions\n\
Reference\t75.0\t25.0\t1000\t800\t800\t600\t200\t0\t10\t150\t40\n";

pub const FRAMESHIFT_ANALYSIS: &str = "Frameshift analysis:\n\
\tNoncoding mutation:0 reads\n\
\tIn-frame mutation:40 reads\n\
\tFrameshift mutation:160 reads\n";

pub const ALLELE_TABLE_NAME: &str = "Alleles_frequency_table_around_sgRNA_GATTACAGGCATTCCG.txt";

pub const ALLELE_TABLE: &str = "Aligned_Sequence\tReference_Sequence\tUnedited\tn_deleted\tn_inserted\tn_mutated\t#Reads\t%Reads\n\
GATTACAGGCATTCCGAGTAC\tGATTACAGGCATTCCGAGTAC\tTrue\t0\t0\t0\t500\t62.5\n\
GATTACAGGCTTTCCGAGTAC\tGATTACAGGCATTCCGAGTAC\tFalse\t0\t0\t1\t200\t25.0\n\
GATTACAGG--TTCCGAGTAC\tGATTACAGGCATTCCGAGTAC\tFalse\t2\t0\t0\t60\t7.5\n\
GATTACAGGCTTTCCG-GTAC\tGATTACAGGCATTCCGAGTAC\tFalse\t1\t0\t1\t40\t5.0\n";

pub fn reference_sequences() -> ReferenceSequences {
    ReferenceSequences {
        amplicon: String::from(AMPLICON),
        mutant: String::from(MUTANT),
        wild_type: String::from(WILD_TYPE),
    }
}

/// Writes a complete set of reports into `dir`, plus the HTML summary next to
/// it when `dir` is a `CRISPResso_on_*` directory.
pub fn write_reports(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("CRISPResso_mapping_statistics.txt"), MAPPING_STATISTICS).unwrap();
    fs::write(
        dir.join("CRISPResso_quantification_of_editing_frequency.txt"),
        EDITING_QUANTIFICATION,
    )
    .unwrap();
    fs::write(dir.join("Frameshift_analysis.txt"), FRAMESHIFT_ANALYSIS).unwrap();
    fs::write(dir.join(ALLELE_TABLE_NAME), ALLELE_TABLE).unwrap();

    let name = dir.file_name().unwrap().to_string_lossy().into_owned();
    if name.starts_with("CRISPResso_on_") {
        fs::write(dir.with_file_name(format!("{}.html", name)), "<html></html>").unwrap();
    }
}

const FAKE_TOOL: &str = r#"out=""
r1=""
while [ $# -gt 0 ]; do
    case "$1" in
        -o) out="$2"; shift ;;
        -r1) r1="$2"; shift ;;
    esac
    shift
done

case "$r1" in
    *_FAILME_*) echo "simulated failure" >&2; exit 3 ;;
    *_SLOWME_*) echo "started $r1"; sleep 30 ;;
esac

name=$(basename "$out")
mkdir -p "$out/CRISPResso_on_$name"
cp "$(dirname "$0")"/fixture/*.txt "$out/CRISPResso_on_$name/"
echo "<html></html>" > "$out/CRISPResso_on_$name.html"
echo "Analysis of $name finished"
"#;

/// Writes the stand-in tool into `dir` and returns a configuration that runs
/// it through `sh`. The tool copies the fixture reports into its output
/// directory, fails with exit code 3 for samples whose read file contains
/// `_FAILME_`, and prints a line then sleeps for thirty seconds for `_SLOWME_`.
pub fn fake_tool_config(dir: &Path) -> ToolConfig {
    write_reports(&dir.join("fixture"));

    let script = dir.join("fake_tool.sh");
    fs::write(&script, FAKE_TOOL).unwrap();

    let mut config = ToolConfig::new(String::from(AMPLICON), String::from(GUIDE));
    config.command = vec![
        String::from("sh"),
        script.to_string_lossy().into_owned(),
    ];
    config
}

/// Creates empty read files for a sample under `inputs/<directory>` and
/// returns the pair.
pub fn sample_pair(inputs: &Path, directory: &str, name: &str) -> SamplePair {
    let dir = inputs.join(directory);
    fs::create_dir_all(&dir).unwrap();

    let read = |n: u8| -> PathBuf {
        let path = dir.join(format!("{}_R{}.fastq.gz", name, n));
        fs::write(&path, "").unwrap();
        path
    };

    SamplePair {
        sample_name: String::from(name),
        r1: read(1),
        r2: Some(read(2)),
    }
}
