// src/datetime.rs
use arrow::array::{Array, StringArray};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{Error, Result};

/// A parsed cell: either wall-clock time or an instant normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed {
    Naive(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl Parsed {
    fn nanos(self) -> Option<i64> {
        match self {
            Parsed::Naive(n) => n.and_utc().timestamp_nanos_opt(),
            Parsed::Utc(u) => u.timestamp_nanos_opt(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Rfc3339,
    Offset(&'static str),
    /// Wall-clock text with a literal UTC/GMT zone name.
    Zoned(&'static str),
    DateTime(&'static str),
    Date(&'static str),
}

const FORMATS: &[Format] = &[
    Format::Rfc3339,
    Format::Offset("%Y-%m-%d %H:%M:%S%.f%:z"),
    Format::Offset("%Y-%m-%d %H:%M:%S%.f%z"),
    Format::Offset("%Y-%m-%dT%H:%M:%S%.f%z"),
    Format::Zoned("%Y-%m-%d %H:%M:%S%.f UTC"),
    Format::Zoned("%Y-%m-%d %H:%M:%S%.f GMT"),
    Format::Zoned("%Y-%m-%dT%H:%M:%S%.f UTC"),
    Format::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    Format::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Format::DateTime("%Y-%m-%d %H:%M"),
    Format::DateTime("%Y-%m-%dT%H:%M"),
    Format::DateTime("%Y/%m/%d %H:%M:%S%.f"),
    Format::DateTime("%Y/%m/%d %H:%M"),
    Format::DateTime("%m/%d/%Y %H:%M:%S%.f"),
    Format::DateTime("%m/%d/%Y %H:%M"),
    Format::DateTime("%d %b %Y %H:%M:%S"),
    Format::Date("%Y-%m-%d"),
    Format::Date("%Y/%m/%d"),
    Format::Date("%m/%d/%Y"),
    Format::Date("%d %b %Y"),
    Format::Date("%Y%m%d"),
];

fn parse_with(format: Format, s: &str) -> Option<Parsed> {
    match format {
        Format::Rfc3339 => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Parsed::Utc(dt.with_timezone(&Utc))),
        Format::Offset(f) => DateTime::parse_from_str(s, f)
            .ok()
            .map(|dt| Parsed::Utc(dt.with_timezone(&Utc))),
        Format::Zoned(f) => NaiveDateTime::parse_from_str(s, f)
            .ok()
            .map(|n| Parsed::Utc(n.and_utc())),
        Format::DateTime(f) => NaiveDateTime::parse_from_str(s, f).ok().map(Parsed::Naive),
        Format::Date(f) => NaiveDate::parse_from_str(s, f)
            .ok()
            .map(|d| Parsed::Naive(d.and_time(NaiveTime::MIN))),
    }
}

/// Infers a format from the first value it sees and prefers it afterwards.
#[derive(Debug, Default)]
pub struct FormatInference {
    locked: Option<usize>,
}

impl FormatInference {
    pub fn parse(&mut self, raw: &str) -> Option<Parsed> {
        let s = raw.trim().trim_matches('"');
        if let Some(i) = self.locked {
            if let Some(p) = parse_with(FORMATS[i], s) {
                return Some(p);
            }
        }
        let (i, parsed) = FORMATS
            .iter()
            .enumerate()
            .find_map(|(i, f)| parse_with(*f, s).map(|p| (i, p)))?;
        self.locked.get_or_insert(i);
        Some(parsed)
    }
}

/// Parse a single value with no prior format knowledge.
pub fn parse_datetime(raw: &str) -> Option<Parsed> {
    FormatInference::default().parse(raw)
}

/// Nanosecond timestamps for one column; `utc` is set when the values carried offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedColumn {
    pub nanos: Vec<Option<i64>>,
    pub utc: bool,
}

/// Parse every value of a raw text column. Nulls and blank cells stay null.
pub fn parse_column(column: &str, values: &StringArray) -> Result<ParsedColumn> {
    let mut inference = FormatInference::default();
    let mut nanos = Vec::with_capacity(values.len());
    let mut utc: Option<bool> = None;

    for (row, value) in values.iter().enumerate() {
        let raw = match value {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                nanos.push(None);
                continue;
            }
        };
        let failure = || Error::ParseFailure {
            column: column.to_string(),
            file: None,
            row,
            value: raw.to_string(),
        };

        let parsed = inference.parse(raw).ok_or_else(failure)?;
        let is_utc = matches!(parsed, Parsed::Utc(_));
        if *utc.get_or_insert(is_utc) != is_utc {
            // mixing naive and offset-bearing values
            return Err(failure());
        }
        nanos.push(Some(parsed.nanos().ok_or_else(failure)?));
    }

    Ok(ParsedColumn {
        nanos,
        utc: utc.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> Parsed {
        Parsed::Naive(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap(),
        )
    }

    #[test]
    fn common_formats() {
        assert_eq!(
            parse_datetime("2023-01-05 10:00:00"),
            Some(naive(2023, 1, 5, 10, 0, 0))
        );
        assert_eq!(
            parse_datetime("2023-01-05T10:00:00"),
            Some(naive(2023, 1, 5, 10, 0, 0))
        );
        assert_eq!(
            parse_datetime("\"2024/12/22 00:05:00\""),
            Some(naive(2024, 12, 22, 0, 5, 0))
        );
        assert_eq!(parse_datetime("2023-01-05"), Some(naive(2023, 1, 5, 0, 0, 0)));
        assert_eq!(parse_datetime("01/05/2023"), Some(naive(2023, 1, 5, 0, 0, 0)));
        assert_eq!(parse_datetime("5 Jan 2023"), Some(naive(2023, 1, 5, 0, 0, 0)));
        assert_eq!(parse_datetime("20230105"), Some(naive(2023, 1, 5, 0, 0, 0)));
        assert_eq!(parse_datetime("not a date"), None);
        assert_eq!(parse_datetime("2023-02-30"), None);
    }

    #[test]
    fn offsets_become_utc() {
        let p = parse_datetime("2023-01-05T10:00:00+10:00").unwrap();
        let expected = DateTime::parse_from_rfc3339("2023-01-05T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(p, Parsed::Utc(expected));
    }

    #[test]
    fn zone_names_are_utc() {
        let expected = DateTime::parse_from_rfc3339("2023-01-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            parse_datetime("2023-01-05 10:00:00 UTC"),
            Some(Parsed::Utc(expected))
        );
        assert_eq!(
            parse_datetime("2023-01-05 10:00:00 GMT"),
            Some(Parsed::Utc(expected))
        );

        let mixed = StringArray::from(vec![
            "2023-01-05 10:00:00+00:00",
            "2023-01-05T10:00:00Z",
            "2023-01-05 10:00:00 UTC",
        ]);
        let parsed = parse_column("ts", &mixed).unwrap();
        assert!(parsed.utc);
        assert!(parsed.nanos.iter().all(|n| *n == expected.timestamp_nanos_opt()));
    }

    #[test]
    fn column_keeps_nulls_and_reports_bad_row() {
        let ok = StringArray::from(vec![
            Some("2023-01-05 10:00:00"),
            None,
            Some(""),
            Some("2023-01-05 10:00:01.5"),
        ]);
        let parsed = parse_column("ts", &ok).unwrap();
        assert!(!parsed.utc);
        assert_eq!(parsed.nanos[1], None);
        assert_eq!(parsed.nanos[2], None);
        assert_eq!(
            parsed.nanos[3].unwrap() - parsed.nanos[0].unwrap(),
            1_500_000_000
        );

        let bad = StringArray::from(vec!["2023-01-05", "2023-01-06", "yesterday"]);
        match parse_column("day", &bad) {
            Err(Error::ParseFailure { column, row, value, .. }) => {
                assert_eq!(column, "day");
                assert_eq!(row, 2);
                assert_eq!(value, "yesterday");
            }
            other => panic!("expected parse failure, got {:?}", other),
        }
    }

    #[test]
    fn mixed_naive_and_offset_fails() {
        let mixed = StringArray::from(vec!["2023-01-05T10:00:00Z", "2023-01-05 10:00:00"]);
        assert!(matches!(
            parse_column("ts", &mixed),
            Err(Error::ParseFailure { row: 1, .. })
        ));
    }
}
