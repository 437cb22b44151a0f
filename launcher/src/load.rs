use replibench_core::prelude::{Connection, DbError, Row};
use replibench_scenarios::prelude::{Column, ColumnType, TableSet};

/// Rows written to the primary before the replica is checked.
const SIMPLE_INSERT_ROWS: usize = 100;

/// A single table of integer primary keys `0..100`, written on the primary so that the replica has
/// real data to catch up with.
pub fn simple_insert() -> TableSet {
    TableSet::single(
        "simple_insert",
        vec![Column::new("id", ColumnType::Integer).primary_key()],
    )
}

/// Recreate the tables on the primary, and on the replica when DDL is not replicated, then fill the
/// primary.
pub fn load(
    tables: &TableSet,
    primary: &mut dyn Connection,
    replica: Option<&mut dyn Connection>,
) -> Result<(), DbError> {
    tables.create_all(primary)?;
    if let Some(replica) = replica {
        tables.create_all(replica)?;
    }
    tables.populate_all(primary, SIMPLE_INSERT_ROWS)
}

/// Outcome of comparing one table on the primary and the replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableComparison {
    pub table: String,
    pub primary_rows: usize,
    pub replica_rows: usize,
    /// Position, in key order, of the first row that differs.
    pub first_difference: Option<usize>,
}

impl TableComparison {
    pub fn matches(&self) -> bool {
        self.first_difference.is_none()
    }
}

/// Compare the full contents of every table, ordered by the first column.
pub fn compare(
    tables: &TableSet,
    primary: &mut dyn Connection,
    replica: &mut dyn Connection,
) -> Result<Vec<TableComparison>, DbError> {
    tables
        .names()
        .iter()
        .map(|table| {
            let sql = format!("{} ORDER BY 1", tables.select_all_sql(table));
            let primary_rows = primary.query(&sql, &[])?;
            let replica_rows = replica.query(&sql, &[])?;
            let comparison = TableComparison {
                table: table.clone(),
                primary_rows: primary_rows.len(),
                replica_rows: replica_rows.len(),
                first_difference: first_difference(&primary_rows, &replica_rows),
            };
            if comparison.matches() {
                log::info!("Table {table} matches, {} rows", comparison.primary_rows);
            } else {
                log::warn!(
                    "Table {table} differs: {} rows on the primary, {} on the replica",
                    comparison.primary_rows,
                    comparison.replica_rows
                );
            }
            Ok(comparison)
        })
        .collect()
}

fn first_difference(primary: &[Row], replica: &[Row]) -> Option<usize> {
    primary
        .iter()
        .zip(replica)
        .position(|(p, r)| p != r)
        .or_else(|| (primary.len() != replica.len()).then(|| primary.len().min(replica.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use replibench_core::prelude::{ConnectionProvider, Endpoint, Value};
    use replibench_sqlite::prelude::SqliteProvider;

    fn memory() -> Box<dyn Connection> {
        SqliteProvider::new()
            .open(&Endpoint::new("sqlite::memory:"))
            .unwrap()
    }

    #[test]
    fn difference_position() {
        let rows = |keys: &[i64]| {
            keys.iter()
                .map(|k| vec![Value::Integer(*k)])
                .collect::<Vec<_>>()
        };
        assert_eq!(None, first_difference(&rows(&[0, 1]), &rows(&[0, 1])));
        assert_eq!(Some(1), first_difference(&rows(&[0, 1]), &rows(&[0, 2])));
        assert_eq!(Some(2), first_difference(&rows(&[0, 1, 2]), &rows(&[0, 1])));
        assert_eq!(Some(0), first_difference(&rows(&[]), &rows(&[0])));
    }

    #[test]
    fn loaded_copies_match() {
        let tables = simple_insert();
        let mut primary = memory();
        let mut replica = memory();
        load(&tables, primary.as_mut(), None).unwrap();
        load(&tables, replica.as_mut(), None).unwrap();

        let comparison = compare(&tables, primary.as_mut(), replica.as_mut()).unwrap();
        assert_eq!(
            vec![TableComparison {
                table: "simple_insert".to_string(),
                primary_rows: 100,
                replica_rows: 100,
                first_difference: None,
            }],
            comparison
        );
    }

    #[test]
    fn empty_replica_differs() {
        let tables = simple_insert();
        let mut primary = memory();
        let mut replica = memory();
        load(&tables, primary.as_mut(), Some(replica.as_mut())).unwrap();

        let comparison = compare(&tables, primary.as_mut(), replica.as_mut()).unwrap();
        assert_eq!(0, comparison[0].replica_rows);
        assert_eq!(Some(0), comparison[0].first_difference);
        assert!(!comparison[0].matches());
    }
}
