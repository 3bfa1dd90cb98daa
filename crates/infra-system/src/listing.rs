// Shared parsing for process listings
use cascade_core::domain::ProcessId;
use cascade_core::port::ListingError;

/// Parse listing entries (one pid each) into process IDs
///
/// Blank entries are skipped; anything else that is not a positive integer
/// rejects the whole listing.
pub(crate) fn parse_pids<'a, I>(parent: ProcessId, entries: I) -> Result<Vec<ProcessId>, ListingError>
where
    I: IntoIterator<Item = &'a str>,
{
    entries
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<ProcessId>().map_err(|_| ListingError::Malformed {
                parent,
                line: entry.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: i32) -> ProcessId {
        ProcessId::new(n).unwrap()
    }

    #[test]
    fn test_parse_lines_skips_blanks() {
        let parsed = parse_pids(pid(1), "12\n\n 34 \n".lines()).unwrap();
        assert_eq!(parsed, vec![pid(12), pid(34)]);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        let err = parse_pids(pid(1), "12\nsleep\n".lines()).unwrap_err();
        assert_eq!(
            err,
            ListingError::Malformed {
                parent: pid(1),
                line: "sleep".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_zero_pid() {
        assert!(parse_pids(pid(1), ["0"]).is_err());
    }
}
