// src/writer.rs
use arrow::{
    array::{Array, ArrayRef, AsArray},
    compute::cast,
    datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampNanosecondType},
    error::ArrowError,
};
use chrono::{DateTime, Utc};
use csv::StringRecord;
use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::pattern::FileType;

const DEFAULT_STEM: &str = "read_from_gcs_on_";
const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_DAY: i64 = 86_400 * NANOS_PER_SEC;

/// What happened to a saved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub path: PathBuf,
    /// The file existed on disk after writing.
    pub verified: bool,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        self.verified
    }
}

/// `read_from_gcs_on_<YYYY-MM-DD>_<HHMMSS>.csv` for the given instant.
pub fn default_file_name(now: DateTime<Utc>) -> String {
    format!(
        "{}{}.{}",
        DEFAULT_STEM,
        now.format("%Y-%m-%d_%H%M%S"),
        FileType::Csv.extension()
    )
}

/// Append `.csv` unless the name already ends with it (ignoring ASCII case).
pub fn normalize_file_name(name: &str) -> String {
    let suffix = format!(".{}", FileType::Csv.extension());
    let has_suffix = name.len() >= suffix.len()
        && name.as_bytes()[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes());
    if has_suffix {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// Serializes datasets to local CSV files.
pub struct Writer {
    clock: Box<dyn Clock>,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new(Box::new(SystemClock))
    }
}

impl Writer {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn output_file_name(&self, name: Option<&str>) -> String {
        match name {
            Some(name) => normalize_file_name(name),
            None => default_file_name(self.clock.now()),
        }
    }

    /// Write `dataset` under `save_path` (default: the working directory) and
    /// check that the file exists afterwards.
    #[instrument(level = "info", skip(self, dataset), fields(rows = dataset.num_rows()))]
    pub fn save(
        &self,
        dataset: &Dataset,
        save_path: Option<&Path>,
        output_filename: Option<&str>,
    ) -> Result<SaveOutcome> {
        let dir = match save_path {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().map_err(|source| Error::WriteFailure {
                path: PathBuf::from("."),
                source,
            })?,
        };
        let path = dir.join(self.output_file_name(output_filename));

        write_csv(dataset, &path).map_err(|source| Error::WriteFailure {
            path: path.clone(),
            source,
        })?;

        let verified = path.is_file();
        if verified {
            info!("Data saved as: {}", path.display());
        } else {
            warn!("Failed to save data to: {}", path.display());
        }
        Ok(SaveOutcome { path, verified })
    }
}

/// Save with the system clock. See [`Writer::save`].
pub fn save_file(
    dataset: &Dataset,
    save_path: Option<&Path>,
    output_filename: Option<&str>,
) -> Result<SaveOutcome> {
    Writer::default().save(dataset, save_path, output_filename)
}

/// Header is an empty index label then the column names; each row is led by
/// its index value.
pub fn write_csv(dataset: &Dataset, path: &Path) -> io::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = StringRecord::new();
    header.push_field("");
    for name in dataset.column_names() {
        header.push_field(&name);
    }
    wtr.write_record(&header)?;

    let cells = dataset
        .batch()
        .columns()
        .iter()
        .map(CellFormatter::new)
        .collect::<std::result::Result<Vec<_>, ArrowError>>()
        .map_err(io::Error::other)?;

    let mut record = StringRecord::new();
    for (row, label) in dataset.index().iter().enumerate() {
        record.clear();
        record.push_field(&label.to_string());
        for cell in &cells {
            record.push_field(&cell.format(row));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Precision used for a whole timestamp column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TimeLayout {
    Date,
    Seconds,
    Micros,
    Nanos,
}

impl TimeLayout {
    fn of(nanos: i64) -> Self {
        let sub = nanos.rem_euclid(NANOS_PER_SEC);
        if sub % 1_000 != 0 {
            TimeLayout::Nanos
        } else if sub != 0 {
            TimeLayout::Micros
        } else if nanos.rem_euclid(NANOS_PER_DAY) != 0 {
            TimeLayout::Seconds
        } else {
            TimeLayout::Date
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            TimeLayout::Date => "%Y-%m-%d",
            TimeLayout::Seconds => "%Y-%m-%d %H:%M:%S",
            TimeLayout::Micros => "%Y-%m-%d %H:%M:%S%.6f",
            TimeLayout::Nanos => "%Y-%m-%d %H:%M:%S%.9f",
        }
    }
}

enum Kind {
    Text,
    Int,
    Float,
    Bool,
    Timestamp { layout: TimeLayout, utc: bool },
}

struct CellFormatter {
    array: ArrayRef,
    kind: Kind,
}

impl CellFormatter {
    fn new(array: &ArrayRef) -> std::result::Result<Self, ArrowError> {
        let (array, kind) = match array.data_type() {
            DataType::Utf8 => (array.clone(), Kind::Text),
            DataType::Int64 => (array.clone(), Kind::Int),
            DataType::Float64 => (array.clone(), Kind::Float),
            DataType::Boolean => (array.clone(), Kind::Bool),
            DataType::Timestamp(unit, tz) => {
                let array = match unit {
                    TimeUnit::Nanosecond => array.clone(),
                    _ => cast(array, &DataType::Timestamp(TimeUnit::Nanosecond, tz.clone()))?,
                };
                let utc = tz.is_some();
                let floor = if utc { TimeLayout::Seconds } else { TimeLayout::Date };
                let layout = array
                    .as_primitive::<TimestampNanosecondType>()
                    .iter()
                    .flatten()
                    .map(TimeLayout::of)
                    .fold(floor, TimeLayout::max);
                (array, Kind::Timestamp { layout, utc })
            }
            _ => (cast(array, &DataType::Utf8)?, Kind::Text),
        };
        Ok(Self { array, kind })
    }

    fn format(&self, row: usize) -> String {
        if self.array.is_null(row) {
            return String::new();
        }
        match &self.kind {
            Kind::Text => self.array.as_string::<i32>().value(row).to_string(),
            Kind::Int => self.array.as_primitive::<Int64Type>().value(row).to_string(),
            Kind::Float => format_float(self.array.as_primitive::<Float64Type>().value(row)),
            Kind::Bool => {
                if self.array.as_boolean().value(row) {
                    "True".to_string()
                } else {
                    "False".to_string()
                }
            }
            Kind::Timestamp { layout, utc } => {
                let nanos = self.array.as_primitive::<TimestampNanosecondType>().value(row);
                let text = DateTime::from_timestamp_nanos(nanos)
                    .naive_utc()
                    .format(layout.pattern())
                    .to_string();
                if *utc {
                    text + "+00:00"
                } else {
                    text
                }
            }
        }
    }
}

/// Integral floats keep a trailing `.0`; NaN is written as an empty cell.
/// Magnitudes below 1e-4 or from 1e16 up use exponent form (`1e-07`, `1e+16`).
fn format_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.is_infinite() {
        let text = if v > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if v != 0.0 && (v.abs() < 1e-4 || v.abs() >= 1e16) {
        let sci = format!("{:e}", v);
        match sci.split_once('e') {
            Some((mantissa, exp)) => {
                let exp: i32 = exp.parse().unwrap_or(0);
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{}e{}{:02}", mantissa, sign, exp.abs())
            }
            None => sci,
        }
    } else if v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}
