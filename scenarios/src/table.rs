use replibench_core::prelude::{Connection, DbError, Value};

use crate::generator::{generator_for, ColumnType, DataGenerator};

/// Rows inserted between two commits when populating a table.
const POPULATE_BATCH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub primary_key: bool,
    /// The database assigns the value. Left out of generated inserts.
    pub auto_increment: bool,
    pub indexed: bool,
}

impl Column {
    pub fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            primary_key: false,
            auto_increment: false,
            indexed: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }
}

/// A number of identically shaped tables named `<prefix><n>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSet {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl TableSet {
    pub fn new(prefix: impl Into<String>, count: usize, columns: Vec<Column>) -> Self {
        let prefix = prefix.into();
        let names = (0..count).map(|n| format!("{prefix}{n}")).collect();
        Self { names, columns }
    }

    /// A set holding the one table `name`.
    pub fn single(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            names: vec![name.into()],
            columns,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn create_table_sql(&self, table: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                if c.primary_key {
                    format!("{} {} PRIMARY KEY", c.name, c.column_type.sql())
                } else {
                    format!("{} {}", c.name, c.column_type.sql())
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {table} ({columns})")
    }

    /// Insert into every column the database does not assign itself.
    pub fn insert_sql(&self, table: &str) -> String {
        let columns = self.insert_columns().map(|c| c.name).collect::<Vec<_>>();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        )
    }

    pub fn select_all_sql(&self, table: &str) -> String {
        format!("SELECT * FROM {table}")
    }

    fn insert_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.auto_increment)
    }

    /// Drop and recreate every table, with its indexes.
    pub fn create_all(&self, conn: &mut dyn Connection) -> Result<(), DbError> {
        for table in &self.names {
            log::debug!("Creating table {table}");
            conn.execute(&format!("DROP TABLE IF EXISTS {table}"))?;
            conn.execute(&self.create_table_sql(table))?;
            for column in self.columns.iter().filter(|c| c.indexed) {
                conn.execute(&format!(
                    "CREATE INDEX {table}_{name}_idx ON {table} ({name})",
                    name = column.name
                ))?;
            }
        }
        Ok(())
    }

    /// Fill every table with `rows` rows. The primary key takes the values `0..rows`, every other
    /// column is generated.
    pub fn populate_all(&self, conn: &mut dyn Connection, rows: usize) -> Result<(), DbError> {
        let mut generators = self
            .insert_columns()
            .map(|c| (c.primary_key, generator_for(c.column_type)))
            .collect::<Vec<(bool, Box<dyn DataGenerator>)>>();

        for table in &self.names {
            log::info!("Populating table {table} with {rows} rows");
            let sql = self.insert_sql(table);
            conn.begin()?;
            let result = populate(conn, &sql, rows, &mut generators);
            match result {
                Ok(()) => conn.commit()?,
                Err(e) => {
                    if let Err(rollback) = conn.rollback() {
                        log::warn!("Rollback after failed populate of {table} failed: {rollback}");
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

fn populate(
    conn: &mut dyn Connection,
    sql: &str,
    rows: usize,
    generators: &mut [(bool, Box<dyn DataGenerator>)],
) -> Result<(), DbError> {
    for row in 0..rows {
        if row > 0 && row % POPULATE_BATCH == 0 {
            conn.commit()?;
            conn.begin()?;
            log::debug!("Inserted {row} rows");
        }
        let params = generators
            .iter_mut()
            .map(|(key, generator)| {
                if *key {
                    Value::Integer(row as i64)
                } else {
                    generator.generate()
                }
            })
            .collect::<Vec<_>>();
        conn.execute_update(sql, &params)?;
    }
    Ok(())
}

/// The standard benchmark table layout: an integer key, an integer value, the name of the writing
/// worker and a text payload.
pub fn standard_columns(datawidth: usize) -> Vec<Column> {
    vec![
        Column::new("mykey", ColumnType::Integer).primary_key(),
        Column::new("myint", ColumnType::Integer),
        Column::new("mythread", ColumnType::Varchar(50)),
        Column::new("mypayload", ColumnType::Varchar(datawidth)),
    ]
}
