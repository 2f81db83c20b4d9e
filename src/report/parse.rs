//! Extraction of read counts from the individual report files.
//!
//! Every report is accepted in two shapes: the tab-separated table the tool
//! writes (a header row naming the columns, followed by value rows), and a
//! plain `Label: value` listing. Counts may carry thousands separators.

use anyhow::Context;
use csv::StringRecord;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TOTAL_READS_LINE: Regex =
        Regex::new(r"(?im)^\W*(?:total\s+reads|reads\s+aligned)\s*[:=]\s*([\d,]+)").unwrap();
    static ref UNMODIFIED_LINE: Regex =
        Regex::new(r"(?im)^\W*unmodified\s*[:=]\s*([\d,]+)").unwrap();
    static ref MODIFIED_LINE: Regex =
        Regex::new(r"(?im)^\W*(?:modified|nhej)\s*[:=]\s*([\d,]+)").unwrap();
    static ref IN_FRAME_LINE: Regex =
        Regex::new(r"(?im)^\W*in-frame\s+mutation\s*[:=]\s*([\d,]+)").unwrap();
    static ref FRAMESHIFT_LINE: Regex =
        Regex::new(r"(?im)^\W*frameshift\s+mutation\s*[:=]\s*([\d,]+)").unwrap();
}

//================//
// Shared helpers //
//================//

/// Parses a read count, ignoring thousands separators. Counts written as
/// floats (`"800.0"`) are accepted when they are whole.
fn parse_count(raw: &str) -> Option<u64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }

    match cleaned.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 => Some(f as u64),
        _ => None,
    }
}

/// A reader over a tab-separated table whose first row names the columns.
/// Rows may carry fewer or more fields than the header.
fn tsv_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

/// Sums the named count columns of a tab-separated table across every row.
///
/// Returns [`None`] if the table has none of the columns. A column that is
/// present but holds no readable count sums to [`None`].
fn column_sums<const N: usize>(text: &str, names: [&str; N]) -> Option<[Option<u64>; N]> {
    let mut reader = tsv_reader(text);
    let columns = {
        let headers = reader.headers().ok()?;
        names.map(|name| column(headers, name))
    };

    if columns.iter().all(Option::is_none) {
        return None;
    }

    let mut sums = [None; N];
    for record in reader.records().filter_map(Result::ok) {
        for (sum, column) in sums.iter_mut().zip(columns) {
            if let Some(n) = column.and_then(|c| record.get(c)).and_then(parse_count) {
                *sum = Some(sum.unwrap_or(0) + n);
            }
        }
    }

    Some(sums)
}

/// Sums every match of a `Label: value` pattern.
fn sum_labeled(text: &str, pattern: &Regex) -> Option<u64> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| parse_count(m.as_str())))
        .fold(None, |acc, n| Some(acc.unwrap_or(0) + n))
}

//===================//
// Individual reports //
//===================//

/// Reads the total number of aligned reads from the mapping statistics.
pub fn total_reads(text: &str) -> Option<u64> {
    column_sums(text, ["READS ALIGNED"])
        .and_then(|[aligned]| aligned)
        .or_else(|| sum_labeled(text, &TOTAL_READS_LINE))
}

/// Unmodified and modified read counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditingCounts {
    /// Reads matching the amplicon.
    pub unmodified: u64,

    /// Reads carrying any modification.
    pub modified: u64,
}

/// Reads the editing quantification. When the table lists several amplicons,
/// their counts are summed. [`None`] if neither count can be found.
pub fn editing_counts(text: &str) -> Option<EditingCounts> {
    let (unmodified, modified) = match column_sums(text, ["Unmodified", "Modified"]) {
        Some([unmodified, modified]) => (unmodified, modified),
        None => (
            sum_labeled(text, &UNMODIFIED_LINE),
            sum_labeled(text, &MODIFIED_LINE),
        ),
    };

    if unmodified.is_none() && modified.is_none() {
        return None;
    }

    Some(EditingCounts {
        unmodified: unmodified.unwrap_or_default(),
        modified: modified.unwrap_or_default(),
    })
}

/// Reads by effect on the coding frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCounts {
    /// Modified reads that keep the reading frame.
    pub in_frame: u64,

    /// Modified reads that shift the reading frame.
    pub frameshift: u64,
}

/// Reads the frameshift analysis. Counts that are not reported are zero.
pub fn frame_counts(text: &str) -> FrameCounts {
    FrameCounts {
        in_frame: sum_labeled(text, &IN_FRAME_LINE).unwrap_or_default(),
        frameshift: sum_labeled(text, &FRAMESHIFT_LINE).unwrap_or_default(),
    }
}

//==================//
// Allele frequency //
//==================//

/// The allele a read supports at the site of interest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allele {
    /// The mutant allele.
    Mutant,

    /// The edited wild-type allele.
    WildType,
}

/// The sequences reads are classified against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceSequences {
    /// Full amplicon.
    pub amplicon: String,

    /// Window carrying the mutant allele.
    pub mutant: String,

    /// Window carrying the edited wild-type allele.
    pub wild_type: String,
}

impl ReferenceSequences {
    /// The allele carried by the amplicon itself, which is what an unedited
    /// read supports. [`None`] if the amplicon carries both windows or
    /// neither.
    pub fn amplicon_allele(&self) -> Option<Allele> {
        let has = |window: &str| !window.is_empty() && self.amplicon.contains(window);
        match (has(&self.mutant), has(&self.wild_type)) {
            (true, false) => Some(Allele::Mutant),
            (false, true) => Some(Allele::WildType),
            _ => None,
        }
    }

    /// Classifies one aligned read sequence.
    ///
    /// A read supports an allele when it contains the allele's window. A read
    /// shorter than the window supports it when it lies inside that window and
    /// not inside the other one. Mutant is tested before wild-type. Reads that
    /// match neither fall back to the amplicon's allele when `unedited`.
    pub fn classify(&self, aligned: &str, unedited: bool) -> Option<Allele> {
        let sequence: String = aligned
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if supports(&sequence, &self.mutant, &self.wild_type) {
            Some(Allele::Mutant)
        } else if supports(&sequence, &self.wild_type, &self.mutant) {
            Some(Allele::WildType)
        } else if unedited {
            self.amplicon_allele()
        } else {
            None
        }
    }
}

fn supports(sequence: &str, window: &str, other: &str) -> bool {
    if sequence.is_empty() || window.is_empty() {
        return false;
    }

    sequence.contains(window)
        || (sequence.len() < window.len() && window.contains(sequence) && !other.contains(sequence))
}

/// Reads per allele in an allele frequency table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlleleCounts {
    /// Reads supporting the mutant allele.
    pub mutant: u64,

    /// Reads supporting the wild-type allele.
    pub wild_type: u64,

    /// Reads supporting neither.
    pub unassigned: u64,
}

fn is_true(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Classifies every row of an allele frequency table.
///
/// The table must have `Aligned_Sequence` and `#Reads` columns. Whether a row
/// is unedited comes from the `Unedited` column, or else from comparing the
/// aligned and reference sequences.
pub fn allele_counts(text: &str, references: &ReferenceSequences) -> anyhow::Result<AlleleCounts> {
    let mut reader = tsv_reader(text);
    let headers = reader
        .headers()
        .context("reading the allele table header")?
        .clone();

    let aligned = column(&headers, "Aligned_Sequence")
        .ok_or_else(|| anyhow::anyhow!("the allele table has no Aligned_Sequence column"))?;
    let reads = column(&headers, "#Reads")
        .ok_or_else(|| anyhow::anyhow!("the allele table has no #Reads column"))?;
    let unedited = column(&headers, "Unedited");
    let reference = column(&headers, "Reference_Sequence");

    let mut counts = AlleleCounts::default();
    for record in reader.records() {
        let record = record.context("reading the allele table")?;
        let (sequence, n) = match (record.get(aligned), record.get(reads).and_then(parse_count)) {
            (Some(s), Some(n)) => (s, n),
            _ => anyhow::bail!(
                "line {} of the allele table is malformed",
                record.position().map(|p| p.line()).unwrap_or_default()
            ),
        };

        let is_unedited = match (unedited, reference) {
            (Some(column), _) => record.get(column).map(is_true).unwrap_or(false),
            (None, Some(column)) => record
                .get(column)
                .map(|r| r.eq_ignore_ascii_case(sequence))
                .unwrap_or(false),
            (None, None) => false,
        };

        match references.classify(sequence, is_unedited) {
            Some(Allele::Mutant) => counts.mutant += n,
            Some(Allele::WildType) => counts.wild_type += n,
            None => counts.unassigned += n,
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("800"), Some(800));
        assert_eq!(parse_count(" 1,234 "), Some(1234));
        assert_eq!(parse_count("800.0"), Some(800));
        assert_eq!(parse_count("1.5"), None);
        assert_eq!(parse_count("n/a"), None);
    }

    #[test]
    fn test_total_reads() {
        assert_eq!(total_reads(testing::MAPPING_STATISTICS), Some(800));
        assert_eq!(total_reads("Total reads: 1,500\n"), Some(1500));
        assert_eq!(total_reads("READS IN INPUTS\tREADS ALIGNED\n10\tnone\n"), None);
        assert_eq!(total_reads(""), None);
    }

    #[test]
    fn test_tables_tolerate_ragged_rows() {
        assert_eq!(
            total_reads("READS IN INPUTS\tREADS ALIGNED\r\n1000\t800\t12\r\n\r\n"),
            Some(800)
        );
        assert_eq!(
            editing_counts("Amplicon\tUnmodified\tModified\nReference\t5\t1\nHDR\t2\n"),
            Some(EditingCounts {
                unmodified: 7,
                modified: 1
            })
        );
    }

    #[test]
    fn test_editing_counts() {
        assert_eq!(
            editing_counts(testing::EDITING_QUANTIFICATION),
            Some(EditingCounts {
                unmodified: 600,
                modified: 200
            })
        );
        assert_eq!(
            editing_counts("Unmodified:10 reads\nNHEJ:5 reads\n"),
            Some(EditingCounts {
                unmodified: 10,
                modified: 5
            })
        );
        assert_eq!(editing_counts("nothing to see"), None);
    }

    #[test]
    fn test_frame_counts() {
        assert_eq!(
            frame_counts(testing::FRAMESHIFT_ANALYSIS),
            FrameCounts {
                in_frame: 40,
                frameshift: 160
            }
        );
        assert_eq!(frame_counts(""), FrameCounts::default());
    }

    #[test]
    fn test_classify() {
        let refs = testing::reference_sequences();
        assert_eq!(refs.amplicon_allele(), Some(Allele::Mutant));
        assert_eq!(refs.classify("GATTACAGGCATTCCGAGTAC", false), Some(Allele::Mutant));
        assert_eq!(refs.classify("gattacaggctttccgagtac", false), Some(Allele::WildType));
        assert_eq!(refs.classify("GATTACAGG--TTCCGAGTAC", false), None);
        assert_eq!(refs.classify("GATTACAGG--TTCCGAGTAC", true), Some(Allele::Mutant));

        // Shorter than the window and inside only one of them.
        assert_eq!(refs.classify("GCTT", false), Some(Allele::WildType));
        // Inside both windows.
        assert_eq!(refs.classify("GGC", false), None);
        assert_eq!(refs.classify("---", true), Some(Allele::Mutant));
        assert_eq!(refs.classify("---", false), None);
    }

    #[test]
    fn test_allele_counts() {
        let counts =
            allele_counts(testing::ALLELE_TABLE, &testing::reference_sequences()).unwrap();
        assert_eq!(
            counts,
            AlleleCounts {
                mutant: 500,
                wild_type: 240,
                unassigned: 60
            }
        );
    }

    #[test]
    fn test_allele_counts_without_unedited_column() {
        let table = "Aligned_Sequence\tReference_Sequence\t#Reads\n\
                     GATTACAGG--TTCCGAGTAC\tGATTACAGG--TTCCGAGTAC\t7\n\
                     GATTACAGG--TTCCGAGTAC\tGATTACAGGCATTCCGAGTAC\t3\n";
        let counts = allele_counts(table, &testing::reference_sequences()).unwrap();
        assert_eq!(counts.mutant, 7);
        assert_eq!(counts.unassigned, 3);
    }

    #[test]
    fn test_allele_counts_rejects_bad_tables() {
        let refs = testing::reference_sequences();
        assert!(allele_counts("", &refs).is_err());
        assert!(allele_counts("Sequence\tCount\nACGT\t1\n", &refs).is_err());
        assert!(allele_counts("Aligned_Sequence\t#Reads\nACGT\tmany\n", &refs).is_err());
    }
}
