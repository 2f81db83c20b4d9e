//! Normalization of the mutant ratio against a reference row.

use tracing::debug;

use crate::report::metrics::MetricsRecord;
use crate::utils::display::round2;

/// How the reference row of a replicate table is chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceSelection {
    /// An explicit treatment name. Takes precedence over `day`.
    pub treatment: Option<String>,

    /// A day whose untreated sample serves as the reference.
    pub day: Option<u32>,
}

impl ReferenceSelection {
    /// Finds the index of the reference row among `treatments`.
    ///
    /// * With an explicit treatment, the first row with that exact name.
    /// * With a day, the `Day{N}_untreated` row, or else the first row whose
    ///   treatment starts with `Day{N}_`.
    /// * Otherwise, the first row.
    pub fn find<'a, I>(&self, treatments: I) -> Option<usize>
    where
        I: IntoIterator<Item = &'a str>,
        I::IntoIter: Clone,
    {
        let treatments = treatments.into_iter();

        if let Some(name) = &self.treatment {
            return treatments.clone().position(|t| t == name.as_str());
        }

        if let Some(day) = self.day {
            let untreated = format!("Day{}_untreated", day);
            let prefix = format!("Day{}_", day);
            return treatments
                .clone()
                .position(|t| t == untreated)
                .or_else(|| treatments.clone().position(|t| t.starts_with(&prefix)));
        }

        treatments.clone().next().map(|_| 0)
    }
}

/// Computes the sensitivity of every record: its mutant ratio as a
/// percentage of the reference row's ratio, rounded to two decimals.
///
/// If no reference row is found, or its ratio is missing or zero, every
/// sensitivity is [`None`]. Records without a ratio of their own also get
/// [`None`].
pub fn calculate_sensitivity(
    records: &[MetricsRecord],
    selection: &ReferenceSelection,
) -> Vec<Option<f64>> {
    let reference = selection
        .find(records.iter().map(|r| r.treatment.as_str()))
        .and_then(|i| records[i].mutant_ratio)
        .filter(|value| *value != 0.0);

    let reference = match reference {
        Some(value) => value,
        None => {
            debug!("no usable reference row among {} records", records.len());
            return vec![None; records.len()];
        }
    };

    records
        .iter()
        .map(|r| r.mutant_ratio.map(|value| round2(value / reference * 100.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(treatment: &str, ratio: Option<f64>) -> MetricsRecord {
        MetricsRecord {
            treatment: String::from(treatment),
            unmodified_percent: None,
            unmodified_reads: 0,
            mutant_percent: None,
            mutant_reads: 0,
            wild_type_percent: None,
            wild_type_reads: 0,
            frameshift_percent: None,
            frameshift_reads: 0,
            in_frame_percent: None,
            in_frame_reads: 0,
            indel_percent: None,
            indel_reads: 0,
            mutant_ratio: ratio,
            total_reads: 100,
            report: None,
        }
    }

    fn by_day(day: u32) -> ReferenceSelection {
        ReferenceSelection {
            treatment: None,
            day: Some(day),
        }
    }

    #[test]
    fn test_find_reference() {
        let treatments = ["Day0_drug", "Day7_drug", "Day7_untreated", "Day14_untreated"];
        let find = |s: &ReferenceSelection| s.find(treatments.iter().copied());

        assert_eq!(find(&ReferenceSelection::default()), Some(0));
        assert_eq!(find(&by_day(7)), Some(2));
        assert_eq!(find(&by_day(0)), Some(0));
        assert_eq!(find(&by_day(1)), None);
        assert_eq!(find(&by_day(14)), Some(3));

        let named = ReferenceSelection {
            treatment: Some(String::from("Day7_drug")),
            day: Some(14),
        };
        assert_eq!(find(&named), Some(1));

        let missing = ReferenceSelection {
            treatment: Some(String::from("Day3_drug")),
            day: None,
        };
        assert_eq!(find(&missing), None);
        assert_eq!(ReferenceSelection::default().find(std::iter::empty()), None);
    }

    #[test]
    fn test_reference_row_is_one_hundred() {
        let records = vec![
            record("Day0_untreated", Some(67.57)),
            record("Day7_drug", Some(33.79)),
            record("Day7_other", Some(67.57)),
        ];

        let sensitivity = calculate_sensitivity(&records, &ReferenceSelection::default());
        assert_eq!(sensitivity, vec![Some(100.0), Some(50.01), Some(100.0)]);
    }

    #[test]
    fn test_unusable_reference_nulls_the_table() {
        let records = vec![record("Day0_untreated", Some(0.0)), record("Day7_drug", Some(10.0))];
        assert_eq!(
            calculate_sensitivity(&records, &ReferenceSelection::default()),
            vec![None, None]
        );

        let records = vec![record("Day0_untreated", Some(5.0)), record("Day7_drug", Some(10.0))];
        let missing = ReferenceSelection {
            treatment: Some(String::from("Day9_untreated")),
            day: None,
        };
        assert_eq!(calculate_sensitivity(&records, &missing), vec![None, None]);

        let records = vec![record("Day0_untreated", None), record("Day7_drug", Some(10.0))];
        assert_eq!(
            calculate_sensitivity(&records, &ReferenceSelection::default()),
            vec![None, None]
        );
    }

    #[test]
    fn test_rows_without_ratio() {
        let records = vec![record("Day0_untreated", Some(20.0)), record("Day7_drug", None)];
        assert_eq!(
            calculate_sensitivity(&records, &by_day(0)),
            vec![Some(100.0), None]
        );
        assert!(calculate_sensitivity(&[], &ReferenceSelection::default()).is_empty());
    }
}
