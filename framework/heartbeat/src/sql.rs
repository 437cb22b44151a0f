/// Statements for one marker table.
#[derive(Debug, Clone)]
pub(crate) struct HeartbeatSql {
    pub drop: String,
    pub create: String,
    pub insert: String,
    pub update: String,
    pub select: String,
}

impl HeartbeatSql {
    pub fn new(table: &str) -> Self {
        Self {
            drop: format!("DROP TABLE IF EXISTS {table}"),
            create: format!(
                "CREATE TABLE {table} (id INTEGER PRIMARY KEY, seqno BIGINT, update_time BIGINT)"
            ),
            insert: format!("INSERT INTO {table} (id, seqno, update_time) VALUES (?, ?, ?)"),
            update: format!("UPDATE {table} SET seqno = ?, update_time = ? WHERE id = ?"),
            select: format!("SELECT seqno, update_time FROM {table} WHERE id = ?"),
        }
    }
}
