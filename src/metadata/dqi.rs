// 🎯 DQI strings - "(1;2;3;1;2)" pedigree scores

use crate::errors::{PipelineError, PipelineResult};

/// Format indicator scores as an openLCA DQ entry; missing scores stay blank
pub fn format_dqi_score<I>(scores: I) -> String
where
    I: IntoIterator<Item = Option<u32>>,
{
    let parts: Vec<String> = scores
        .into_iter()
        .map(|s| s.map(|v| v.to_string()).unwrap_or_default())
        .collect();
    format!("({})", parts.join(";"))
}

/// Add one to the score at 1-based `position`
pub fn increment_dqi_value(dqi: &str, position: usize) -> PipelineResult<String> {
    let inner = dqi.trim().trim_start_matches('(').trim_end_matches(')');
    let mut scores: Vec<u32> = inner
        .split(';')
        .map(|s| s.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|_| PipelineError::invalid(format!("Invalid DQI string `{}`", dqi)))?;

    let slot = position
        .checked_sub(1)
        .and_then(|i| scores.get_mut(i))
        .ok_or_else(|| {
            PipelineError::invalid(format!("DQI position {} out of range for `{}`", position, dqi))
        })?;
    *slot += 1;

    Ok(format_dqi_score(scores.into_iter().map(Some)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(format_dqi_score([Some(1), Some(2), Some(3)]), "(1;2;3)");
        assert_eq!(format_dqi_score([Some(4), None, Some(2)]), "(4;;2)");
    }

    #[test]
    fn test_increment() {
        assert_eq!(increment_dqi_value("(1;2;3;1;2)", 2).unwrap(), "(1;3;3;1;2)");
        assert_eq!(increment_dqi_value("(1;2;3)", 3).unwrap(), "(1;2;4)");
    }

    #[test]
    fn test_increment_out_of_range() {
        assert!(increment_dqi_value("(1;2;3)", 4).is_err());
        assert!(increment_dqi_value("(1;2;3)", 0).is_err());
        assert!(increment_dqi_value("(1;x;3)", 1).is_err());
    }
}
