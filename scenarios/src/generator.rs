use chrono::DateTime;
use rand::Rng;
use replibench_core::prelude::Value;

/// Column types the scenarios create and fill with synthetic data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Varchar(usize),
    Blob(usize),
    Timestamp,
}

impl ColumnType {
    /// Type name used in `CREATE TABLE`.
    pub fn sql(&self) -> String {
        match self {
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Varchar(length) => format!("VARCHAR({length})"),
            ColumnType::Blob(_) => "BLOB".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }
}

/// Produces values for one column.
pub trait DataGenerator: Send {
    fn generate(&mut self) -> Value;
}

/// Number of random characters or bytes that are repeated to fill a value.
const REPEAT: usize = 10;

/// Pick a generator suited to `column_type`.
pub fn generator_for(column_type: ColumnType) -> Box<dyn DataGenerator> {
    match column_type {
        ColumnType::SmallInt => Box::new(IntegerGenerator::new(i16::MAX as i64)),
        ColumnType::Integer => Box::new(IntegerGenerator::new(i32::MAX as i64)),
        ColumnType::BigInt => Box::new(IntegerGenerator::new(i64::MAX)),
        ColumnType::Varchar(length) => Box::new(StringGenerator::new(length, REPEAT)),
        ColumnType::Blob(length) => Box::new(BlobGenerator::new(length, REPEAT)),
        ColumnType::Timestamp => Box::new(TimestampGenerator),
    }
}

/// Integers in `(-max, max)`, either sign equally likely.
#[derive(Debug, Clone)]
pub struct IntegerGenerator {
    max: i64,
}

impl IntegerGenerator {
    pub fn new(max: i64) -> Self {
        Self { max: max.max(1) }
    }
}

impl DataGenerator for IntegerGenerator {
    fn generate(&mut self) -> Value {
        let mut rng = rand::thread_rng();
        let magnitude = rng.gen_range(0..self.max);
        if rng.gen_bool(0.5) {
            Value::Integer(-magnitude)
        } else {
            Value::Integer(magnitude)
        }
    }
}

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SPECIAL: &[u8] = b"~!@#$%^&*()_+`-={}[]|:;<>,.?/'\\\"";

/// Strings of exactly `length` characters built by repeating `repeat` random characters.
///
/// About one character in five is punctuation, quotes included, to exercise escaping.
#[derive(Debug, Clone)]
pub struct StringGenerator {
    length: usize,
    repeat: usize,
}

impl StringGenerator {
    pub fn new(length: usize, repeat: usize) -> Self {
        Self {
            length,
            repeat: repeat.max(1),
        }
    }
}

impl DataGenerator for StringGenerator {
    fn generate(&mut self) -> Value {
        let mut rng = rand::thread_rng();
        let base = (0..self.repeat)
            .map(|_| {
                let pool = if rng.gen_bool(0.2) { SPECIAL } else { ALPHANUMERIC };
                pool[rng.gen_range(0..pool.len())] as char
            })
            .collect::<Vec<_>>();
        Value::Text(base.iter().cycle().take(self.length).collect())
    }
}

/// Byte strings of exactly `length` bytes built by repeating `repeat` random bytes.
#[derive(Debug, Clone)]
pub struct BlobGenerator {
    length: usize,
    repeat: usize,
}

impl BlobGenerator {
    pub fn new(length: usize, repeat: usize) -> Self {
        Self {
            length,
            repeat: repeat.max(1),
        }
    }
}

impl DataGenerator for BlobGenerator {
    fn generate(&mut self) -> Value {
        let mut rng = rand::thread_rng();
        let base = (0..self.repeat).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();
        Value::Blob(base.iter().copied().cycle().take(self.length).collect())
    }
}

/// Timestamps spread over the forty years after the epoch, formatted `YYYY-MM-DD HH:MM:SS.fff`.
#[derive(Debug, Clone, Copy)]
pub struct TimestampGenerator;

const FORTY_YEARS_MILLIS: i64 = 40 * 365 * 24 * 3600 * 1000;

impl DataGenerator for TimestampGenerator {
    fn generate(&mut self) -> Value {
        let millis = rand::thread_rng().gen_range(0..FORTY_YEARS_MILLIS);
        match DateTime::from_timestamp_millis(millis) {
            Some(timestamp) => Value::Text(timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strings_have_requested_length_and_repeat() {
        let mut generator = StringGenerator::new(25, 10);
        let Value::Text(value) = generator.generate() else {
            panic!("expected text");
        };
        assert_eq!(25, value.chars().count());
        let chars = value.chars().collect::<Vec<_>>();
        assert_eq!(chars[..10].to_vec(), chars[10..20].to_vec());
    }

    #[test]
    fn blobs_have_requested_length() {
        let mut generator = generator_for(ColumnType::Blob(64));
        let Value::Blob(value) = generator.generate() else {
            panic!("expected blob");
        };
        assert_eq!(64, value.len());
    }

    #[test]
    fn small_integers_stay_in_range() {
        let mut generator = generator_for(ColumnType::SmallInt);
        for _ in 0..1000 {
            let value = generator.generate().as_i64().unwrap();
            assert!(value.abs() < i16::MAX as i64);
        }
    }

    #[test]
    fn timestamps_are_formatted() {
        let Value::Text(value) = TimestampGenerator.generate() else {
            panic!("expected text");
        };
        assert_eq!(23, value.len());
        assert_eq!(Some('-'), value.chars().nth(4));
    }

    #[test]
    fn ddl_type_names() {
        assert_eq!("VARCHAR(12)", ColumnType::Varchar(12).sql());
        assert_eq!("BIGINT", ColumnType::BigInt.sql());
    }
}
