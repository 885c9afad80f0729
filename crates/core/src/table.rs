//! In-memory columnar table.
//!
//! A `DataTable` stores values column-major: one `Vec<Value>` per column,
//! all the same length. Rows are addressed by position and read through
//! lightweight `RowHandle`s. Sorting is expressed as a permutation applied
//! to every column, which keeps column storage contiguous.

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::value::Value;

/// A columnar table with named columns.
#[derive(Clone, Debug, PartialEq)]
pub struct DataTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<Value>>,
    rows: usize,
}

impl DataTable {
    /// Creates an empty table with the given column names.
    ///
    /// Returns `Error::DuplicateColumn` if a name repeats.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(Error::DuplicateColumn(name.clone()));
            }
        }
        let columns = names.iter().map(|_| Vec::new()).collect();
        Ok(DataTable {
            names,
            index,
            columns,
            rows: 0,
        })
    }

    /// Creates a table from fully populated columns.
    ///
    /// All columns must have the same length; the first column's length
    /// becomes the row count.
    pub fn from_columns<S>(columns: Vec<(S, Vec<Value>)>) -> Result<Self>
    where
        S: Into<String>,
    {
        let mut table = DataTable {
            names: Vec::with_capacity(columns.len()),
            index: HashMap::with_capacity(columns.len()),
            columns: Vec::with_capacity(columns.len()),
            rows: 0,
        };
        let rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        for (name, values) in columns {
            let name = name.into();
            if values.len() != rows {
                return Err(Error::ColumnLength {
                    column: name,
                    expected: rows,
                    got: values.len(),
                });
            }
            if table.index.insert(name.clone(), table.names.len()).is_some() {
                return Err(Error::DuplicateColumn(name));
            }
            table.names.push(name);
            table.columns.push(values);
        }
        table.rows = rows;
        Ok(table)
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Returns true if the table has no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Number of columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Returns the values of a column, or None if no such column exists.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    /// Returns the positional index of a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Appends a row.
    ///
    /// Panics if the row arity does not match the table width. Callers
    /// construct rows from the table's own column list, so a mismatch is
    /// a programming error rather than a data error.
    pub fn push_row(&mut self, row: Vec<Value>) {
        assert_eq!(
            row.len(),
            self.names.len(),
            "row arity {} does not match table width {}",
            row.len(),
            self.names.len()
        );
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value);
        }
        self.rows += 1;
    }

    /// Removes and discards the last row.
    ///
    /// Panics if the table is empty.
    pub fn pop_row(&mut self) {
        assert!(self.rows > 0, "pop_row on empty table");
        for column in &mut self.columns {
            column.pop();
        }
        self.rows -= 1;
    }

    /// Returns a handle to the row at `position`, or None when out of range.
    pub fn row(&self, position: usize) -> Option<RowHandle<'_>> {
        if position < self.rows {
            Some(RowHandle {
                table: self,
                position,
            })
        } else {
            None
        }
    }

    /// Iterates over all rows in order.
    pub fn iter(&self) -> Rows<'_> {
        Rows {
            table: self,
            position: 0,
        }
    }

    /// Reorders every column by the given permutation: row `i` of the
    /// result is row `permutation[i]` of the input.
    ///
    /// Panics if the permutation length does not match the row count.
    pub fn apply_permutation(&mut self, permutation: &[usize]) {
        assert_eq!(
            permutation.len(),
            self.rows,
            "permutation length {} does not match row count {}",
            permutation.len(),
            self.rows
        );
        for column in &mut self.columns {
            let reordered = permutation.iter().map(|&i| column[i].clone()).collect();
            *column = reordered;
        }
    }

    /// Merges the columns of `other` into this table, row for row.
    ///
    /// A column whose name already exists replaces the existing values;
    /// a new name is appended after the current columns. Both tables must
    /// have the same row count.
    pub fn merge_columns(&mut self, other: DataTable) -> Result<()> {
        let DataTable {
            names,
            columns,
            rows,
            ..
        } = other;
        for (name, values) in names.into_iter().zip(columns) {
            if rows != self.rows {
                return Err(Error::ColumnLength {
                    column: name,
                    expected: self.rows,
                    got: rows,
                });
            }
            match self.index.get(&name) {
                Some(&i) => self.columns[i] = values,
                None => {
                    self.index.insert(name.clone(), self.names.len());
                    self.names.push(name);
                    self.columns.push(values);
                }
            }
        }
        Ok(())
    }
}

/// A borrowed view of one row of a `DataTable`.
#[derive(Clone, Copy, Debug)]
pub struct RowHandle<'a> {
    table: &'a DataTable,
    position: usize,
}

impl<'a> RowHandle<'a> {
    /// Position of this row within the table.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the value of the named column in this row.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.table
            .index
            .get(name)
            .map(|&i| &self.table.columns[i][self.position])
    }

    /// Returns the value at the given column index in this row.
    pub fn get_at(&self, index: usize) -> Option<&'a Value> {
        self.table.columns.get(index).map(|c| &c[self.position])
    }

    /// Copies the row out as a value tuple in column order.
    pub fn to_vec(&self) -> Vec<Value> {
        self.table
            .columns
            .iter()
            .map(|c| c[self.position].clone())
            .collect()
    }
}

/// Iterator over the rows of a `DataTable`.
pub struct Rows<'a> {
    table: &'a DataTable,
    position: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = RowHandle<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.table.row(self.position)?;
        self.position += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.rows - self.position;
        (remaining, Some(remaining))
    }
}

impl<'a> IntoIterator for &'a DataTable {
    type Item = RowHandle<'a>;
    type IntoIter = Rows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
