//! The relation model the miners publish into, and the store interface the
//! surrounding storage engine implements.
//!
//! The real columnar engine lives outside this crate; the core only needs
//! name-keyed creation with conflict detection, so that is the whole trait.

use std::io;
use std::sync::Mutex;

use indexmap::IndexMap;

use crate::errors::*;

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Int(Vec<u64>),
    Str(Vec<String>),
    StrList(Vec<Vec<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(values) => values.len(),
            Column::Str(values) => values.len(),
            Column::StrList(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, row: usize) -> String {
        match self {
            Column::Int(values) => values[row].to_string(),
            Column::Str(values) => values[row].clone(),
            Column::StrList(values) => format!("{:?}", values[row]),
        }
    }
}

/// An ordered collection of equal-length columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: IndexMap<String, Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. All columns of a table must agree on length.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) {
        debug_assert!(self
            .columns
            .values()
            .all(|present| present.len() == column.len()));
        self.columns.insert(name.into(), column);
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns
            .first()
            .map(|(_, column)| column.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize as CSV, header row first.
    pub fn write_csv<W: io::Write>(&self, sink: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(sink);
        writer
            .write_record(self.columns.keys())
            .map_err(io_error)?;
        for row in 0..self.len() {
            writer
                .write_record(self.columns.values().map(|column| column.cell(row)))
                .map_err(io_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn io_error(e: csv::Error) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::Other, e))
}

/// Where finished relations go.
///
/// Creations are serialized by the implementation; publishing a batch is
/// atomic, either every table lands or none does.
pub trait TableStore: Send + Sync {
    fn contains(&self, name: &str) -> bool;

    /// Publish a batch of named tables. Fails with [`Error::OutputConflict`]
    /// naming the first colliding table, in which case nothing is stored.
    fn publish(&self, tables: Vec<(String, Table)>) -> Result<()>;

    fn get(&self, name: &str) -> Option<Table>;

    fn table_names(&self) -> Vec<String>;
}

/// In-memory store backing tests and the command line.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<IndexMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryStore {
    fn contains(&self, name: &str) -> bool {
        self.tables.lock().expect("store lock is never poisoned").contains_key(name)
    }

    fn publish(&self, tables: Vec<(String, Table)>) -> Result<()> {
        let mut present = self.tables.lock().expect("store lock is never poisoned");
        if let Some((name, _)) = tables.iter().find(|(name, _)| present.contains_key(name)) {
            return Err(Error::OutputConflict(name.clone()));
        }
        present.extend(tables);
        Ok(())
    }

    fn get(&self, name: &str) -> Option<Table> {
        self.tables.lock().expect("store lock is never poisoned").get(name).cloned()
    }

    fn table_names(&self) -> Vec<String> {
        self.tables
            .lock()
            .expect("store lock is never poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample() -> Table {
        let mut table = Table::new();
        table.push_column("LineId", Column::Int(vec![1, 2]));
        table.push_column(
            "Content",
            Column::Str(vec!["a \"quoted\" cell".to_owned(), "plain".to_owned()]),
        );
        table
    }

    #[test]
    fn csv_round_trip_shape() {
        let mut buffer = Vec::new();
        sample().write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("LineId,Content"));
        assert_eq!(lines.next(), Some(r#"1,"a ""quoted"" cell""#));
        assert_eq!(lines.next(), Some("2,plain"));
    }

    #[test]
    fn publish_is_atomic_on_conflict() {
        let store = MemoryStore::new();
        store
            .publish(vec![("existing".to_owned(), sample())])
            .unwrap();

        let result = store.publish(vec![
            ("fresh".to_owned(), sample()),
            ("existing".to_owned(), sample()),
        ]);
        assert_matches!(result, Err(Error::OutputConflict(name)) if name == "existing");
        // the non-colliding sibling must not land either
        assert!(!store.contains("fresh"));
    }

    #[test]
    fn get_returns_published_table() {
        let store = MemoryStore::new();
        store.publish(vec![("t".to_owned(), sample())]).unwrap();
        assert_eq!(store.get("t").unwrap().len(), 2);
        assert_eq!(store.table_names(), vec!["t".to_owned()]);
    }
}
