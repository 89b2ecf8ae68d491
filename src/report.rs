//! Plain-text rendering of solution variables for logs and the CLI.

use std::fmt::Write as _;

use crate::data::{DataInterface, Schema};
use crate::types::{format_indices, optional, DataError};

/// Values closer to zero than this are left out.
const ZERO: f64 = 1e-9;

/// One block per variable listing its non-zero values:
///
/// ```text
/// x
///   i=1,j=0,l=0,rho=0          10.0000
/// ```
pub fn format_solution(
    data: &dyn DataInterface,
    schema: &Schema,
    variables: &[&str],
) -> Result<String, DataError> {
    let mut out = String::new();
    for variable in variables {
        let mut rows = Vec::new();
        for at in schema.iter_variable_named(variable)? {
            let Some(value) = optional(data.data(variable, &at))? else {
                continue;
            };
            if value.abs() > ZERO {
                rows.push((format_indices(&at), value));
            }
        }

        // Writing into a String cannot fail.
        let _ = writeln!(out, "{variable}");
        if rows.is_empty() {
            let _ = writeln!(out, "  (all zero)");
        }
        for (at, value) in rows {
            let _ = writeln!(out, "  {at:<24} {value:>12.4}");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RamDataProvider;
    use crate::network::NetworkData;

    #[test]
    fn test_lists_non_zero_values() {
        let ram = RamDataProvider::from_rows(&[
            ("nodes", &[], 2.0),
            ("virtualized_environments", &[], 1.0),
            ("structural_stability_intervals", &[], 1.0),
            ("x", &[0, 1, 0, 0], 10.0),
            ("g", &[1, 0, 0], 2.5),
        ]);
        let data = NetworkData::from_provider(ram).unwrap();
        let text = format_solution(&data, data.schema(), &["x", "g", "z"]).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "x");
        assert!(lines[1].contains("i=1,j=0,l=0,rho=0"));
        assert!(lines[1].trim_end().ends_with("10.0000"));
        assert_eq!(lines[2], "g");
        assert!(lines[3].trim_end().ends_with("2.5000"));
        assert_eq!(lines[4], "z");
        assert_eq!(lines[5], "  (all zero)");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_unknown_variable() {
        let data = NetworkData::new(RamDataProvider::new(), crate::network::network_schema(1, 1, 1));
        assert!(format_solution(&data, data.schema(), &["nope"]).is_err());
    }
}
