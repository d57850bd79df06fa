use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::aggregation::KeyNames;
use crate::container::ProfileContainer;
use crate::error::Error;

/// How the deviation of a profile from the baseline is measured, per entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMetric {
    /// `baseline - other`
    Difference,
    AbsoluteDifference,
    /// The difference relative to the baseline value.
    RelativeError,
    AbsoluteError,
    /// The relative error, weighted by the baseline entry's share of the
    /// baseline total.
    WeightedError,
    #[default]
    WeightedAbsoluteError,
}

impl ErrorMetric {
    pub const ALL: [ErrorMetric; 6] = [
        ErrorMetric::Difference,
        ErrorMetric::AbsoluteDifference,
        ErrorMetric::RelativeError,
        ErrorMetric::AbsoluteError,
        ErrorMetric::WeightedError,
        ErrorMetric::WeightedAbsoluteError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorMetric::Difference => "difference",
            ErrorMetric::AbsoluteDifference => "absolute-difference",
            ErrorMetric::RelativeError => "error",
            ErrorMetric::AbsoluteError => "absolute-error",
            ErrorMetric::WeightedError => "weighted-error",
            ErrorMetric::WeightedAbsoluteError => "weighted-absolute-error",
        }
    }

    /// The error of `other` against `baseline`, where `total` is the sum of
    /// all baseline values. A zero baseline has no relative error.
    pub fn apply(self, baseline: f64, other: f64, total: f64) -> f64 {
        let difference = baseline - other;
        let relative = if baseline != 0.0 {
            difference / baseline
        } else {
            0.0
        };
        let weighted = if total != 0.0 {
            relative * baseline / total
        } else {
            0.0
        };
        match self {
            ErrorMetric::Difference => difference,
            ErrorMetric::AbsoluteDifference => difference.abs(),
            ErrorMetric::RelativeError => relative,
            ErrorMetric::AbsoluteError => relative.abs(),
            ErrorMetric::WeightedError => weighted,
            ErrorMetric::WeightedAbsoluteError => weighted.abs(),
        }
    }
}

impl fmt::Display for ErrorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.name() == s)
            .ok_or_else(|| Error::InvalidErrorMetric(s.to_string()))
    }
}

/// The error of one entry present in both the baseline and the compared profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Deviation {
    pub label: String,
    pub baseline: f64,
    pub other: f64,
    pub error: f64,
}

/// Compare the energy of every entry of `other` with the same entry in `baseline`.
///
/// Entries are matched by the names behind their keys, so the profiles don't
/// need to share symbol tables. Entries missing from either profile are
/// skipped. With a nonzero `limit`, only errors of at least that magnitude
/// are reported. The result is sorted by ascending error.
pub fn compare_profiles(
    baseline: &ProfileContainer,
    other: &ProfileContainer,
    metric: ErrorMetric,
    limit: f64,
) -> Result<Vec<Deviation>, Error> {
    if !(limit >= 0.0) {
        return Err(Error::InvalidLimit(limit));
    }
    if baseline.uses_volts() != other.uses_volts() {
        return Err(Error::UnitModeMismatch(baseline.volts, other.volts));
    }

    let baseline_table = baseline.aggregation_table()?;
    let other_table = other.aggregation_table()?;
    if baseline_table.projection() != other_table.projection() {
        return Err(Error::ProjectionMismatch(
            baseline_table.projection().to_string(),
            other_table.projection().to_string(),
        ));
    }

    let other_tables = other.symbol_tables();
    let mut other_energies: HashMap<KeyNames, f64> = HashMap::new();
    for entry in &other_table {
        other_energies.insert(entry.key().names(&other_tables)?, entry.energy);
    }

    let baseline_tables = baseline.symbol_tables();
    let total = baseline_table.total().energy;
    let mut deviations = Vec::new();
    for entry in &baseline_table {
        let Some(&other_energy) = other_energies.get(&entry.key().names(&baseline_tables)?)
        else {
            continue;
        };
        let error = metric.apply(entry.energy, other_energy, total);
        if limit == 0.0 || error.abs() >= limit {
            deviations.push(Deviation {
                label: entry.label.clone(),
                baseline: entry.energy,
                other: other_energy,
                error,
            });
        }
    }
    deviations.sort_by(|a, b| a.error.total_cmp(&b.error));
    Ok(deviations)
}
