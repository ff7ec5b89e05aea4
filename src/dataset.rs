// src/dataset.rs
use arrow::{
    array::ArrayRef,
    datatypes::{Field, Schema, SchemaRef},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Every matched file concatenated into one table.
///
/// `index` holds the row labels written as the leading, unlabeled CSV
/// column. It restarts at 0 for each source file.
#[derive(Debug, Clone)]
pub struct Dataset {
    batch: RecordBatch,
    index: Vec<u64>,
    /// Source key and row count of each file, in concatenation order.
    sources: Vec<(String, usize)>,
}

impl Dataset {
    pub(crate) fn new(batch: RecordBatch, sources: Vec<(String, usize)>) -> Self {
        let index: Vec<u64> = sources
            .iter()
            .flat_map(|(_, rows)| 0..*rows as u64)
            .collect();
        debug_assert_eq!(batch.num_rows(), index.len());
        Self {
            batch,
            index,
            sources,
        }
    }

    /// Build a dataset with a plain `0..n` index and no source files.
    pub fn from_batch(batch: RecordBatch) -> Self {
        let index = (0..batch.num_rows() as u64).collect();
        Self {
            batch,
            index,
            sources: Vec::new(),
        }
    }

    /// Source file and row within it for a row of the combined table.
    pub fn locate(&self, row: usize) -> Option<(&str, usize)> {
        let mut start = 0;
        for (key, rows) in &self.sources {
            if row < start + rows {
                return Some((key.as_str(), row - start));
            }
            start += rows;
        }
        None
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_columns())
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn index(&self) -> &[u64] {
        &self.index
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Swap the column called `name` for `column`, taking its type from `field`.
    pub(crate) fn replace_column(&mut self, name: &str, field: Field, column: ArrayRef) -> Result<()> {
        let schema = self.batch.schema();
        let (pos, _) = schema
            .column_with_name(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))?;

        let mut fields: Vec<Arc<Field>> = schema.fields().iter().cloned().collect();
        fields[pos] = Arc::new(field);
        let mut columns = self.batch.columns().to_vec();
        columns[pos] = column;

        self.batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::DataType;

    fn sample() -> Dataset {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("val", DataType::Utf8, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ],
        )
        .unwrap();
        Dataset::from_batch(batch)
    }

    #[test]
    fn shape_and_names() {
        let ds = sample();
        assert_eq!(ds.shape(), (3, 2));
        assert_eq!(ds.column_names(), vec!["id", "val"]);
        assert_eq!(ds.index(), &[0, 1, 2]);
        assert!(ds.column("missing").is_none());
        assert_eq!(ds.locate(0), None);
    }

    #[test]
    fn rows_map_back_to_files() {
        let batch = sample().into_batch();
        let ds = Dataset::new(batch, vec![("a.csv".into(), 1), ("b.csv".into(), 2)]);
        assert_eq!(ds.index(), &[0, 0, 1]);
        assert_eq!(ds.locate(0), Some(("a.csv", 0)));
        assert_eq!(ds.locate(2), Some(("b.csv", 1)));
        assert_eq!(ds.locate(3), None);
    }

    #[test]
    fn replace_keeps_position() {
        let mut ds = sample();
        ds.replace_column(
            "id",
            Field::new("id", DataType::Utf8, true),
            Arc::new(StringArray::from(vec!["x", "y", "z"])),
        )
        .unwrap();
        assert_eq!(ds.column_names(), vec!["id", "val"]);
        assert_eq!(ds.schema().field(0).data_type(), &DataType::Utf8);

        let err = ds
            .replace_column(
                "nope",
                Field::new("nope", DataType::Utf8, true),
                Arc::new(StringArray::from(vec!["x", "y", "z"])),
            )
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == "nope"));
    }
}
