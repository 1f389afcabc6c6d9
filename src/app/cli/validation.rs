//! Value parsers for CLI arguments

use std::time::Duration;

/// A named simulated cleanup step: `NAME:MS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub name: String,
    pub duration: Duration,
}

/// Validate a strictly positive millisecond count
pub fn validate_positive_millis(value: &str) -> Result<u64, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid number of milliseconds", value)),
    }
}

/// Parse `NAME:MS`; the duration may be zero
pub fn parse_step(value: &str) -> Result<StepSpec, String> {
    let (name, millis) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("'{}' must have the form NAME:MS", value))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("'{}' has an empty step name", value));
    }

    let millis = millis
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("'{}' is not a valid number of milliseconds", millis))?;

    Ok(StepSpec {
        name: name.to_string(),
        duration: Duration::from_millis(millis),
    })
}
