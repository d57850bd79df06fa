use std::collections::HashMap;
use std::ops::{Add, AddAssign};

use super::key::{AggregationKey, KeyProjection};
use crate::error::Error;

/// What one thread observation adds to its aggregation entry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Contribution {
    /// Fractional after weighting.
    pub samples: f64,
    /// Seconds.
    pub time: f64,
    /// Joules, or coulombs if the profile was recorded without a voltage.
    pub energy: f64,
}

impl Contribution {
    pub fn scaled(self, weight: f64) -> Self {
        Self {
            samples: self.samples * weight,
            time: self.time * weight,
            energy: self.energy * weight,
        }
    }
}

impl Add for Contribution {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            samples: self.samples + other.samples,
            time: self.time + other.time,
            energy: self.energy + other.energy,
        }
    }
}

impl AddAssign for Contribution {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// The accumulated statistics of one aggregation key.
#[derive(Clone, PartialEq, ::prost_derive::Message)]
pub struct AggregateEntry {
    #[prost(uint32, optional, tag = "1")]
    pub binary: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub function: Option<u32>,
    #[prost(uint32, optional, tag = "3")]
    pub file: Option<u32>,
    #[prost(uint32, optional, tag = "4")]
    pub line: Option<u32>,
    #[prost(double, tag = "5")]
    pub samples: f64,
    #[prost(double, tag = "6")]
    pub time: f64,
    #[prost(double, tag = "7")]
    pub energy: f64,
    /// Sanitized display label, computed when the entry was created.
    #[prost(string, tag = "8")]
    pub label: String,
}

impl AggregateEntry {
    pub fn key(&self) -> AggregationKey {
        AggregationKey {
            binary: self.binary,
            function: self.function,
            file: self.file,
            line: self.line,
        }
    }

    pub fn contribution(&self) -> Contribution {
        Contribution {
            samples: self.samples,
            time: self.time,
            energy: self.energy,
        }
    }

    /// Average power (or current) while this entry was running.
    pub fn power(&self) -> f64 {
        if self.time > 0.0 {
            self.energy / self.time
        } else {
            0.0
        }
    }

    fn add(&mut self, contribution: Contribution) {
        self.samples += contribution.samples;
        self.time += contribution.time;
        self.energy += contribution.energy;
    }
}

/// Running statistics per [`AggregationKey`].
///
/// Entries are created on the first contribution to their key and updated
/// additively afterwards, so the final totals don't depend on the order in
/// which contributions arrive.
#[derive(Debug, Clone, Default)]
pub struct AggregationTable {
    projection: KeyProjection,
    entries: Vec<AggregateEntry>,
    index: HashMap<AggregationKey, usize>,
}

impl AggregationTable {
    pub fn new(projection: KeyProjection) -> Self {
        Self {
            projection,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild a table from serialized entries. Entries with the same key are merged.
    pub fn from_entries(projection: KeyProjection, entries: Vec<AggregateEntry>) -> Self {
        let mut table = Self::new(projection);
        for entry in entries {
            let contribution = entry.contribution();
            let label = entry.label.clone();
            table.accumulate(entry.key(), contribution, || label);
        }
        table
    }

    pub fn projection(&self) -> KeyProjection {
        self.projection
    }

    /// Add `contribution` to the entry for `key`. `label` is only called if
    /// the entry doesn't exist yet.
    pub fn accumulate(
        &mut self,
        key: AggregationKey,
        contribution: Contribution,
        label: impl FnOnce() -> String,
    ) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].add(contribution),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(AggregateEntry {
                    binary: key.binary,
                    function: key.function,
                    file: key.file,
                    line: key.line,
                    samples: contribution.samples,
                    time: contribution.time,
                    energy: contribution.energy,
                    label: label(),
                });
            }
        }
    }

    pub fn get(&self, key: &AggregationKey) -> Option<&AggregateEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order their keys were first seen.
    pub fn iter(&self) -> std::slice::Iter<'_, AggregateEntry> {
        self.entries.iter()
    }

    pub fn total(&self) -> Contribution {
        self.entries
            .iter()
            .fold(Contribution::default(), |total, entry| {
                total + entry.contribution()
            })
    }

    /// Entries in ascending order of energy. Ties keep insertion order.
    pub fn sorted_by_energy(&self) -> Vec<&AggregateEntry> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.energy.total_cmp(&b.energy));
        entries
    }

    /// Entries in descending order of energy.
    pub fn hottest_first(&self) -> Vec<&AggregateEntry> {
        let mut entries = self.sorted_by_energy();
        entries.reverse();
        entries
    }

    /// The hottest entries which together account for at least `fraction` of
    /// the total energy.
    pub fn top_fraction(&self, fraction: f64) -> Result<Vec<&AggregateEntry>, Error> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::InvalidFraction(fraction));
        }
        let threshold = fraction * self.total().energy;
        let mut sum = 0.0;
        let mut selected = Vec::new();
        for entry in self.hottest_first() {
            if sum >= threshold {
                break;
            }
            sum += entry.energy;
            selected.push(entry);
        }
        Ok(selected)
    }

    pub fn into_entries(self) -> Vec<AggregateEntry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a AggregationTable {
    type Item = &'a AggregateEntry;
    type IntoIter = std::slice::Iter<'a, AggregateEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn function_key(function: u32) -> AggregationKey {
        AggregationKey {
            binary: None,
            function: Some(function),
            file: None,
            line: None,
        }
    }

    fn energy(energy: f64) -> Contribution {
        Contribution {
            samples: 1.0,
            time: 0.001,
            energy,
        }
    }

    #[test]
    fn accumulate_creates_then_adds() {
        let mut table = AggregationTable::default();
        table.accumulate(function_key(2), energy(1.0), || "main".into());
        table.accumulate(function_key(2), energy(0.5), || unreachable!());
        let entry = table.get(&function_key(2)).unwrap();
        assert_eq!(entry.samples, 2.0);
        assert_eq!(entry.energy, 1.5);
        assert_eq!(entry.label, "main");
        assert!((entry.power() - 750.0).abs() < 1e-9);
    }

    #[test]
    fn sorting_is_stable() {
        let mut table = AggregationTable::default();
        for (function, e) in [(2, 3.0), (3, 1.0), (4, 3.0), (5, 2.0)] {
            table.accumulate(function_key(function), energy(e), String::new);
        }
        let order: Vec<_> = table
            .sorted_by_energy()
            .iter()
            .map(|e| e.function.unwrap())
            .collect();
        assert_eq!(order, vec![3, 5, 2, 4]);
    }

    #[test]
    fn top_fraction_cutoff() {
        let mut table = AggregationTable::default();
        for (function, e) in [(2, 1.0), (3, 2.0), (4, 3.0), (5, 4.0)] {
            table.accumulate(function_key(function), energy(e), String::new);
        }
        let top: Vec<_> = table
            .top_fraction(0.5)
            .unwrap()
            .iter()
            .map(|e| e.energy)
            .collect();
        assert_eq!(top, vec![4.0, 3.0]);
        assert!(table.top_fraction(0.0).unwrap().is_empty());
        assert_eq!(table.top_fraction(1.0).unwrap().len(), 4);
        assert!(matches!(
            table.top_fraction(1.5),
            Err(Error::InvalidFraction(_))
        ));
    }
}
