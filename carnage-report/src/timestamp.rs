use chrono::{NaiveDate, NaiveDateTime};

/// Length of a `YYYY-MM-DD-HH-MM-SS` token.
const TOKEN_LEN: usize = 19;

/// Extract the first valid `YYYY-MM-DD-HH-MM-SS` token from a filename.
///
/// Returns `None` when no token is present or every candidate encodes an
/// impossible date (month 13, etc.).
pub fn parse_filename_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let bytes = filename.as_bytes();
    if bytes.len() < TOKEN_LEN {
        return None;
    }
    (0..=bytes.len() - TOKEN_LEN).find_map(|start| parse_token(&bytes[start..start + TOKEN_LEN]))
}

fn parse_token(window: &[u8]) -> Option<NaiveDateTime> {
    // Dashes at fixed positions, digits everywhere else.
    const DASHES: [usize; 5] = [4, 7, 10, 13, 16];
    for (i, b) in window.iter().enumerate() {
        let ok = if DASHES.contains(&i) {
            *b == b'-'
        } else {
            b.is_ascii_digit()
        };
        if !ok {
            return None;
        }
    }

    let num = |range: std::ops::Range<usize>| -> u32 {
        window[range]
            .iter()
            .fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
    };

    let year = i32::try_from(num(0..4)).ok()?;
    NaiveDate::from_ymd_opt(year, num(5..7), num(8..10))?.and_hms_opt(
        num(11..13),
        num(14..16),
        num(17..19),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_embedded_in_report_name() {
        let ts = parse_filename_timestamp("CYR1X-2026-01-20-18-14-04-mpcarnagereport1_3528_0_0.xml")
            .unwrap();
        assert_eq!(ts.to_string(), "2026-01-20 18:14:04");
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(parse_filename_timestamp("mpcarnagereport1.xml"), None);
        assert_eq!(parse_filename_timestamp(""), None);
    }

    #[test]
    fn impossible_date_is_skipped() {
        assert_eq!(parse_filename_timestamp("2026-13-40-18-14-04.xml"), None);
    }

    #[test]
    fn later_valid_token_is_found_after_invalid_one() {
        let ts = parse_filename_timestamp("2026-13-01-00-00-00_2025-06-01-12-30-00.xml").unwrap();
        assert_eq!(ts.to_string(), "2025-06-01 12:30:00");
    }

    #[test]
    fn non_ascii_prefix_does_not_panic() {
        let ts = parse_filename_timestamp("ñandú-2026-01-20-18-14-04.xml").unwrap();
        assert_eq!(ts.to_string(), "2026-01-20 18:14:04");
    }
}
