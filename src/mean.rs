use crate::aggregate::Aggregator;
use crate::container::{ProfileContainer, AGGREGATED_PROFILE_VERSION};
use crate::error::Error;

/// Combine aggregated profiles of separate runs into their weighted mean.
///
/// Each input is weighted by the number of runs it already represents, so
/// combining `mean(a, b)` with `c` gives the same result as `mean(a, b, c)`.
/// All inputs must be aggregated by the same key and share a unit mode.
pub fn combine(profiles: &[ProfileContainer]) -> Result<ProfileContainer, Error> {
    let first = profiles.first().ok_or(Error::NoProfiles)?;
    let projection = first.aggregation_table()?.projection();

    let total_runs = total_runs(profiles)?;
    let mut aggregator = Aggregator::new(projection);

    for (i, profile) in profiles.iter().enumerate() {
        if profile.version != AGGREGATED_PROFILE_VERSION {
            return Err(Error::VersionMismatch {
                expected: AGGREGATED_PROFILE_VERSION,
                found: profile.version.clone(),
            });
        }
        let table = profile.aggregation_table()?;
        if table.projection() != projection {
            return Err(Error::ProjectionMismatch(
                projection.to_string(),
                table.projection().to_string(),
            ));
        }

        let weight = f64::from(runs(profile)) / f64::from(total_runs);
        log::info!(
            "Processing profile {}/{}, contribution {weight}",
            i + 1,
            profiles.len()
        );
        aggregator.begin_profile(&profile.metadata(), weight)?;
        let tables = profile.symbol_tables();
        for entry in &table {
            aggregator.add_entry(entry, &tables, weight)?;
        }
    }

    Ok(aggregator.finish(total_runs))
}

/// Profiles written before run counts were tracked count as one run.
pub(crate) fn runs(profile: &ProfileContainer) -> u32 {
    profile.mean.max(1)
}

/// The number of runs `profiles` represent together.
pub(crate) fn total_runs(profiles: &[ProfileContainer]) -> Result<u32, Error> {
    profiles
        .iter()
        .try_fold(0u32, |total, profile| total.checked_add(runs(profile)))
        .ok_or(Error::RunCountOverflow)
}
