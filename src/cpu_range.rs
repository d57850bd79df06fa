use crate::error::Error;

/// Parse a cpu list like `0-3,7` into the sorted set of cpu indices it names.
///
/// Duplicates are removed, so `0-3,2` names four cpus.
pub fn parse_cpu_range(spec: &str) -> Result<Vec<u32>, Error> {
    let invalid = || Error::InvalidCpuRange(spec.to_string());
    let mut cpus = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if let Some((first, last)) = part.split_once('-') {
            let first: u32 = first.trim().parse().map_err(|_| invalid())?;
            let last: u32 = last.trim().parse().map_err(|_| invalid())?;
            if last < first {
                return Err(invalid());
            }
            cpus.extend(first..=last);
        } else {
            cpus.push(part.parse().map_err(|_| invalid())?);
        }
    }
    cpus.sort_unstable();
    cpus.dedup();
    Ok(cpus)
}
