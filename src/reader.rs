// src/reader.rs
use arrow::{
    array::{Array, ArrayRef, AsArray, TimestampNanosecondArray},
    compute::{cast, concat_batches},
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, io::Cursor, path::PathBuf, sync::Arc, time::Instant};
use tracing::{debug, info, instrument};

use crate::clock::{Clock, SystemClock};
use crate::dataset::Dataset;
use crate::datetime::parse_column;
use crate::error::{Error, Result};
use crate::pattern::{resolve_pattern, FileType, Location};
use crate::source::{source_for, ObjectSource};
use crate::writer::Writer;

const BATCH_SIZE: usize = 8192;

/// Everything a read takes besides the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub file_type: FileType,
    /// Directory for the output file; the working directory when unset.
    pub save_path: Option<PathBuf>,
    /// Output file name; `.csv` is appended when missing.
    pub output_filename: Option<String>,
    /// Columns read as text, then parsed as date/time.
    pub date_columns: Vec<String>,
}

impl ReadOptions {
    pub fn file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn save_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_path = Some(dir.into());
        self
    }

    pub fn output_filename(mut self, name: impl Into<String>) -> Self {
        self.output_filename = Some(name.into());
        self
    }

    pub fn date_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Loads every file under a directory, formats date columns, and saves the result.
pub struct Reader {
    source: Box<dyn ObjectSource>,
    writer: Writer,
}

impl Reader {
    pub fn new(source: Box<dyn ObjectSource>, clock: Box<dyn Clock>) -> Self {
        Self {
            source,
            writer: Writer::new(clock),
        }
    }

    /// Read `dir`, convert `options.date_columns`, save a copy, and return the data.
    ///
    /// A save whose existence check fails is only logged.
    #[instrument(level = "info", skip(self, options))]
    pub fn read(&self, dir: &str, options: &ReadOptions) -> Result<Dataset> {
        let pattern = resolve_pattern(dir, options.file_type);
        info!("Reading data as: {}", pattern);

        let mut dataset = self.load(&pattern, &options.date_columns)?;
        let (rows, cols) = dataset.shape();
        info!("Read {} rows and {} columns", rows, cols);

        info!("Formatting date columns if any:");
        let total = options.date_columns.len();
        for (i, column) in options.date_columns.iter().enumerate() {
            info!("[{}/{}] {}", i + 1, total, column);
            convert_date_column(&mut dataset, column)?;
        }

        info!("Saving read data");
        self.writer.save(
            &dataset,
            options.save_path.as_deref(),
            options.output_filename.as_deref(),
        )?;

        Ok(dataset)
    }

    /// Concatenate every object matching `pattern`. Columns in `date_columns`
    /// stay raw text.
    #[instrument(level = "debug", skip(self, date_columns))]
    pub fn load(&self, pattern: &str, date_columns: &[String]) -> Result<Dataset> {
        let start = Instant::now();
        let keys = self.source.list(pattern)?;
        if keys.is_empty() {
            return Err(Error::InputNotFound {
                pattern: pattern.to_string(),
            });
        }
        debug!(files = keys.len(), "matched");

        let objects = keys
            .into_iter()
            .map(|key| {
                let data = self.source.fetch(&key)?;
                Ok((key, data))
            })
            .collect::<Result<Vec<_>>>()?;

        let schemas = objects
            .par_iter()
            .map(|(key, data)| infer_schema(key, data).map(|schema| (key.as_str(), schema)))
            .collect::<Result<Vec<_>>>()?;
        let schema = merge_schemas(&schemas, date_columns)?;

        let parts = objects
            .par_iter()
            .map(|(key, data)| parse_file(key, data, schema.clone()))
            .collect::<Result<Vec<_>>>()?;

        let sources = objects
            .iter()
            .zip(&parts)
            .map(|((key, _), part)| (key.clone(), part.num_rows()))
            .collect();
        let batch = concat_batches(&schema, &parts)?;
        debug!(rows = batch.num_rows(), elapsed = ?start.elapsed(), "loaded");

        Ok(Dataset::new(batch, sources))
    }
}

/// Read with the backend `dir` points at and the system clock.
///
/// `gs://bucket/prefix` reads from Google Cloud Storage; anything else is a
/// local directory.
pub fn read_from_gcs(dir: &str, options: &ReadOptions) -> Result<Dataset> {
    let location = Location::parse(&resolve_pattern(dir, options.file_type))?;
    let source = source_for(&location)?;
    Reader::new(source, Box::new(SystemClock)).read(dir, options)
}

fn infer_schema(key: &str, data: &[u8]) -> Result<Schema> {
    let (schema, records) = Format::default()
        .with_header(true)
        .with_truncated_rows(true)
        .infer_schema(Cursor::new(data), None)
        .map_err(|source| Error::Csv {
            file: key.to_string(),
            source,
        })?;
    debug!(file = key, records, "inferred schema");
    Ok(schema)
}

/// One schema for all files: header names must agree, types are widened.
/// Declared date columns and anything inferred as temporal stay text.
fn merge_schemas(schemas: &[(&str, Schema)], date_columns: &[String]) -> Result<SchemaRef> {
    let (_, first) = &schemas[0];
    let expected: Vec<String> = first.fields().iter().map(|f| f.name().clone()).collect();
    let mut types: Vec<DataType> = first.fields().iter().map(|f| f.data_type().clone()).collect();

    for (key, schema) in &schemas[1..] {
        let found: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        if found != expected {
            return Err(Error::SchemaMismatch {
                file: key.to_string(),
                expected,
                found,
            });
        }
        for (ty, field) in types.iter_mut().zip(schema.fields()) {
            *ty = widen(ty, field.data_type());
        }
    }

    let raw: HashSet<&str> = date_columns.iter().map(String::as_str).collect();
    let fields: Vec<Field> = expected
        .iter()
        .zip(types)
        .map(|(name, ty)| {
            let ty = if raw.contains(name.as_str()) || ty.is_temporal() || ty == DataType::Null {
                DataType::Utf8
            } else {
                ty
            };
            Field::new(name, ty, true)
        })
        .collect();
    Ok(Arc::new(Schema::new(fields)))
}

fn widen(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

fn parse_file(key: &str, data: &[u8], schema: SchemaRef) -> Result<RecordBatch> {
    let csv_err = |source| Error::Csv {
        file: key.to_string(),
        source,
    };
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_truncated_rows(true)
        .with_batch_size(BATCH_SIZE)
        .build(Cursor::new(data))
        .map_err(csv_err)?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(csv_err)?;
    concat_batches(&schema, &batches).map_err(csv_err)
}

/// Replace a raw text column with parsed nanosecond timestamps.
pub fn convert_date_column(dataset: &mut Dataset, column: &str) -> Result<()> {
    let raw = dataset
        .column(column)
        .ok_or_else(|| Error::MissingColumn(column.to_string()))?;
    let text: ArrayRef = match raw.data_type() {
        DataType::Utf8 => raw.clone(),
        _ => cast(raw, &DataType::Utf8)?,
    };

    let parsed = parse_column(column, text.as_string::<i32>()).map_err(|err| match err {
        Error::ParseFailure {
            column,
            file: None,
            row,
            value,
        } => {
            let (file, row) = match dataset.locate(row) {
                Some((key, file_row)) => (Some(key.to_string()), file_row),
                None => (None, row),
            };
            Error::ParseFailure {
                column,
                file,
                row,
                value,
            }
        }
        other => other,
    })?;
    let mut values = TimestampNanosecondArray::from(parsed.nanos);
    if parsed.utc {
        values = values.with_timezone("+00:00");
    }
    let field = Field::new(column, values.data_type().clone(), true);
    debug!(column, nulls = values.null_count(), utc = parsed.utc, "formatted date column");
    dataset.replace_column(column, field, Arc::new(values))
}
