//! SQLite-backed storage gateway.
//!
//! # Responsibility
//! - Translate gateway calls into parameterized SQL over migrated tables.
//! - Decode generic rows back into `StoredRow`.
//!
//! # Invariants
//! - Only migrated connections are accepted (`try_new`).
//! - Table/column names are checked as plain identifiers; all values are bound.
//! - Timestamps are stored as epoch milliseconds.

use super::{
    ensure_identifier, ensure_writable_fields, now_millis, FieldValue, Inserted, ListQuery,
    OrderBy, Predicate, Record, StorageError, StorageGateway, StorageResult, StoredRow,
    META_COLUMNS,
};
use crate::db::migrations::latest_version;
use crate::model::{Entity, EntityId, Patient, Task};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};

/// Storage gateway over a borrowed, migrated SQLite connection.
pub struct SqliteGateway<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGateway<'conn> {
    /// Constructs a gateway from a migrated/ready connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `PRAGMA user_version` is not current.
    /// - `MissingRequiredTable` when an entity table is absent.
    pub fn try_new(conn: &'conn Connection) -> StorageResult<Self> {
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StorageError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        for table in [Patient::TABLE, Task::TABLE] {
            if !table_exists(conn, table)? {
                return Err(StorageError::MissingRequiredTable(table));
            }
        }

        Ok(Self { conn })
    }
}

impl StorageGateway for SqliteGateway<'_> {
    fn insert(&self, table: &str, fields: &Record) -> StorageResult<Inserted> {
        ensure_identifier(table)?;
        ensure_writable_fields(fields)?;

        let created_at = now_millis();
        let mut columns: Vec<&str> = fields.keys().map(String::as_str).collect();
        columns.extend(["created_at", "updated_at"]);
        let placeholders = vec!["?"; columns.len()].join(", ");

        let mut bind_values: Vec<Value> = fields.values().map(to_sql_value).collect();
        bind_values.push(Value::Integer(created_at.timestamp_millis()));
        bind_values.push(Value::Integer(created_at.timestamp_millis()));

        self.conn.execute(
            &format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders});",
                columns.join(", ")
            ),
            params_from_iter(bind_values),
        )?;

        let raw_id = self.conn.last_insert_rowid();
        let id = EntityId::new(raw_id).ok_or_else(|| {
            StorageError::InvalidData(format!("non-positive rowid {raw_id} in `{table}`"))
        })?;
        debug!("event=row_insert module=storage status=ok backend=sqlite table={table} id={id}");

        Ok(Inserted { id, created_at })
    }

    fn get(&self, table: &str, id: EntityId) -> StorageResult<Option<StoredRow>> {
        ensure_identifier(table)?;
        let rows = self.select(
            &format!("SELECT * FROM {table} WHERE id = ?"),
            vec![Value::Integer(id.get())],
        )?;
        Ok(rows.into_iter().next())
    }

    fn list(&self, table: &str, query: &ListQuery) -> StorageResult<Vec<StoredRow>> {
        ensure_identifier(table)?;
        let mut sql = format!("SELECT * FROM {table}");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(predicate) = query.predicate.as_ref() {
            sql.push_str(" WHERE ");
            push_predicate(predicate, &mut sql, &mut bind_values)?;
        }

        push_order(&query.order, &mut sql)?;

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        self.select(&sql, bind_values)
    }

    fn update(
        &self,
        table: &str,
        id: EntityId,
        changed: &Record,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        ensure_identifier(table)?;
        ensure_writable_fields(changed)?;

        let mut assignments: Vec<String> =
            changed.keys().map(|column| format!("{column} = ?")).collect();
        assignments.push("updated_at = MAX(updated_at, ?)".to_string());

        let mut bind_values: Vec<Value> = changed.values().map(to_sql_value).collect();
        bind_values.push(Value::Integer(now_millis().timestamp_millis()));
        bind_values.push(Value::Integer(id.get()));

        let changed_rows = self.conn.execute(
            &format!(
                "UPDATE {table} SET {} WHERE id = ?;",
                assignments.join(", ")
            ),
            params_from_iter(bind_values),
        )?;
        if changed_rows == 0 {
            return Ok(None);
        }

        let updated_at: i64 = self.conn.query_row(
            &format!("SELECT updated_at FROM {table} WHERE id = ?1;"),
            [id.get()],
            |row| row.get(0),
        )?;
        millis_to_datetime(updated_at, table, "updated_at").map(Some)
    }

    fn delete(&self, table: &str, id: EntityId) -> StorageResult<bool> {
        ensure_identifier(table)?;
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE id = ?1;"), [id.get()])?;
        Ok(changed > 0)
    }

    fn count(&self, table: &str, predicate: Option<&Predicate>) -> StorageResult<u64> {
        ensure_identifier(table)?;
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            push_predicate(predicate, &mut sql, &mut bind_values)?;
        }

        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| StorageError::InvalidData(format!("negative count {count}")))
    }
}

impl SqliteGateway<'_> {
    fn select(&self, sql: &str, bind_values: Vec<Value>) -> StorageResult<Vec<StoredRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut parsed = Vec::new();

        while let Some(row) = rows.next()? {
            parsed.push(parse_row(row, &columns)?);
        }

        Ok(parsed)
    }
}

fn parse_row(row: &Row<'_>, columns: &[String]) -> StorageResult<StoredRow> {
    let raw_id: i64 = row.get("id")?;
    let id = EntityId::new(raw_id)
        .ok_or_else(|| StorageError::InvalidData(format!("invalid id value `{raw_id}`")))?;
    let created_at = millis_to_datetime(row.get("created_at")?, "row", "created_at")?;
    let updated_at = millis_to_datetime(row.get("updated_at")?, "row", "updated_at")?;

    let mut fields = Record::new();
    for (index, column) in columns.iter().enumerate() {
        if META_COLUMNS.contains(&column.as_str()) {
            continue;
        }
        let value = match row.get_ref(index)? {
            ValueRef::Null => FieldValue::Null,
            ValueRef::Integer(value) => FieldValue::Integer(value),
            ValueRef::Text(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    StorageError::InvalidData(format!("non UTF-8 text in column `{column}`"))
                })?;
                FieldValue::Text(text.to_string())
            }
            ValueRef::Real(_) | ValueRef::Blob(_) => {
                return Err(StorageError::InvalidData(format!(
                    "unsupported value type in column `{column}`"
                )));
            }
        };
        fields.insert(column.clone(), value);
    }

    Ok(StoredRow {
        id,
        created_at,
        updated_at,
        fields,
    })
}

fn push_predicate(
    predicate: &Predicate,
    sql: &mut String,
    bind_values: &mut Vec<Value>,
) -> StorageResult<()> {
    for column in predicate.columns() {
        ensure_identifier(column)?;
    }

    match predicate {
        Predicate::Equals { column, value } => {
            if value.is_null() {
                sql.push_str(&format!("{column} IS NULL"));
            } else {
                sql.push_str(&format!("{column} = ?"));
                bind_values.push(to_sql_value(value));
            }
        }
        Predicate::EqualsIgnoreCase { column, value } => {
            sql.push_str(&format!("LOWER({column}) = ?"));
            bind_values.push(Value::Text(value.to_ascii_lowercase()));
        }
        Predicate::Contains { columns, needle } => {
            if columns.is_empty() {
                sql.push('0');
                return Ok(());
            }
            let pattern = format!("%{}%", escape_like(&needle.to_ascii_lowercase()));
            let clauses: Vec<String> = columns
                .iter()
                .map(|column| format!("LOWER({column}) LIKE ? ESCAPE '\\'"))
                .collect();
            sql.push('(');
            sql.push_str(&clauses.join(" OR "));
            sql.push(')');
            bind_values.extend(columns.iter().map(|_| Value::Text(pattern.clone())));
        }
        Predicate::AtLeast { column, value } => {
            sql.push_str(&format!("{column} >= ?"));
            bind_values.push(Value::Integer(*value));
        }
        Predicate::All(items) => push_group(items, " AND ", '1', sql, bind_values)?,
        Predicate::Any(items) => push_group(items, " OR ", '0', sql, bind_values)?,
    }

    Ok(())
}

fn push_group(
    items: &[Predicate],
    separator: &str,
    empty: char,
    sql: &mut String,
    bind_values: &mut Vec<Value>,
) -> StorageResult<()> {
    if items.is_empty() {
        sql.push(empty);
        return Ok(());
    }

    sql.push('(');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        push_predicate(item, sql, bind_values)?;
    }
    sql.push(')');
    Ok(())
}

fn push_order(order: &[OrderBy], sql: &mut String) -> StorageResult<()> {
    let mut keys = Vec::with_capacity(order.len() + 1);
    for key in order {
        ensure_identifier(key.column)?;
        let direction = if key.descending { "DESC" } else { "ASC" };
        keys.push(format!("{} COLLATE NOCASE {direction}", key.column));
    }
    keys.push("id ASC".to_string());
    sql.push_str(" ORDER BY ");
    sql.push_str(&keys.join(", "));
    Ok(())
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(value) => Value::Integer(*value),
        FieldValue::Text(value) => Value::Text(value.clone()),
    }
}

fn millis_to_datetime(millis: i64, table: &str, column: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        StorageError::InvalidData(format!("invalid timestamp `{millis}` in {table}.{column}"))
    })
}

fn table_exists(conn: &Connection, table: &str) -> StorageResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
