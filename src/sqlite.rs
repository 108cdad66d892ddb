use std::{collections::BTreeMap, fmt, panic::UnwindSafe, path::PathBuf, str::FromStr, time::Duration};

use log::{debug, info};
use rusqlite::{
    functions::FunctionFlags,
    params_from_iter,
    types::{ToSqlOutput, ValueRef},
    Connection, MappedRows, ToSql,
};

use crate::error::{DatabaseError, Result};

mod batch;
mod call;

pub use batch::BatchStatement;
pub use call::CallableStatement;

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    /// Storage class name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Boolean(_) => "boolean",
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
            Value::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

/// Positional parameter bindings for SQL statements.
///
/// Indexes are 1-based, matching the `?` placeholders of the statement.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    pub values: BTreeMap<usize, Value>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the next free position
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        let next = self.values.keys().next_back().map_or(1, |last| last + 1);
        self.values.insert(next, value.into());
        self
    }

    /// Bind (or rebind) the value at `index`
    pub fn set(&mut self, index: usize, value: impl Into<Value>) {
        self.values.insert(index, value.into());
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(&index)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Collect the values for placeholders `1..=count`, in order.
fn bind(count: usize, params: &Params) -> Result<Vec<&Value>> {
    (1..=count)
        .map(|index| params.get(index).ok_or(DatabaseError::UnboundParameter(index)))
        .collect()
}

/// SQL Query with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Params::new(),
        }
    }
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }
    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Render the `CREATE TABLE` statement for this table.
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnDefinition::to_sql)
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", self.name, columns)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.as_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    pub fn as_sql(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }

    /// Whether a value read back from SQLite can be reported as this type.
    /// NULL is accepted by every type.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (DataType::Integer, Value::Integer(_) | Value::Boolean(_))
                | (DataType::Real, Value::Real(_) | Value::Integer(_))
                | (DataType::Text, Value::Text(_))
                | (DataType::Blob, Value::Blob(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    PrimaryKey,
    AutoIncrement,
    NotNull,
    Unique,
}

impl ColumnConstraint {
    fn as_sql(self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::AutoIncrement => "AUTOINCREMENT",
            ColumnConstraint::NotNull => "NOT NULL",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}

/// Column metadata as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Where a connection points.
///
/// Accepted forms are `sqlite::memory:` (or the bare `:memory:`) for a fresh
/// private in-memory database, and `sqlite:<path>` for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    InMemory,
    File(PathBuf),
}

impl FromStr for ConnectionTarget {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "sqlite::memory:" | ":memory:" => Ok(ConnectionTarget::InMemory),
            other => match other.strip_prefix("sqlite:") {
                Some(path) if !path.is_empty() => Ok(ConnectionTarget::File(PathBuf::from(path))),
                _ => Err(DatabaseError::InvalidTarget(s.to_string())),
            },
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::InMemory => f.write_str("sqlite::memory:"),
            ConnectionTarget::File(path) => write!(f, "sqlite:{}", path.display()),
        }
    }
}

/// SQLite connection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Database to open
    pub target: ConnectionTarget,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            busy_timeout: Duration::from_millis(1_000),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(ConnectionTarget::InMemory)
    }
}

/// Maps one result row to a typed value.
pub trait FromRow: Sized {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

type RowMapper<T> = fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>;

/// A single-pass, lazily stepped sequence of typed rows.
///
/// Borrows the statement that produced it; the statement cannot be reused
/// until the result set is dropped.
pub struct ResultSet<'stmt, T> {
    rows: MappedRows<'stmt, RowMapper<T>>,
}

impl<T> Iterator for ResultSet<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(|row| row.map_err(DatabaseError::from))
    }
}

/// A compiled statement that can be executed repeatedly with new bindings.
pub struct PreparedStatement<'conn> {
    sql: String,
    stmt: rusqlite::Statement<'conn>,
}

impl PreparedStatement<'_> {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `?` placeholders in the statement.
    pub fn parameter_count(&self) -> usize {
        self.stmt.parameter_count()
    }

    /// Run the statement, returning the number of changed rows.
    pub fn execute(&mut self, params: &Params) -> Result<usize> {
        let values = bind(self.stmt.parameter_count(), params)?;
        let changed = self.stmt.execute(params_from_iter(values))?;
        debug!("executed prepared statement ({} rows): {}", changed, self.sql);
        Ok(changed)
    }

    /// Run the statement as a query, mapping each row with [`FromRow`].
    pub fn query_as<T: FromRow>(&mut self, params: &Params) -> Result<ResultSet<'_, T>> {
        let values = bind(self.stmt.parameter_count(), params)?;
        debug!("querying: {}", self.sql);
        let rows = self
            .stmt
            .query_map(params_from_iter(values), T::from_row as RowMapper<T>)?;
        Ok(ResultSet { rows })
    }
}

/// One open SQLite connection.
///
/// Statements borrow the database, so they are always released before it is
/// closed; dropping the database closes the connection on every exit path.
pub struct Database {
    conn: Connection,
    target: ConnectionTarget,
}

impl Database {
    /// Open a connection to the configured target.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let connection_error = |source| DatabaseError::Connection {
            target: config.target.to_string(),
            source,
        };
        let conn = match &config.target {
            ConnectionTarget::InMemory => Connection::open_in_memory(),
            ConnectionTarget::File(path) => Connection::open(path),
        }
        .map_err(connection_error)?;
        conn.busy_timeout(config.busy_timeout)
            .map_err(connection_error)?;
        info!("opened sqlite connection to {}", config.target);
        Ok(Self {
            conn,
            target: config.target.clone(),
        })
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Run one statement directly, without keeping it compiled.
    pub fn execute(&self, query: &SqlQuery) -> Result<usize> {
        let mut stmt = self.conn.prepare(&query.statement)?;
        let values = bind(stmt.parameter_count(), &query.params)?;
        let changed = stmt.execute(params_from_iter(values))?;
        debug!("executed ({} rows): {}", changed, query.statement);
        Ok(changed)
    }

    /// Run raw DDL, possibly several `;`-separated statements.
    pub fn execute_script(&self, sql: &str) -> Result<()> {
        debug!("executing script: {}", sql);
        self.conn.execute_batch(sql).map_err(DatabaseError::Schema)
    }

    /// Create every table of `schema`.
    pub fn create_schema(&self, schema: &Schema) -> Result<()> {
        for table in &schema.tables {
            self.execute_script(&table.create_sql())?;
        }
        Ok(())
    }

    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement<'_>> {
        let stmt = self.conn.prepare(sql)?;
        Ok(PreparedStatement {
            sql: sql.to_string(),
            stmt,
        })
    }

    pub fn prepare_batch(&self, sql: &str) -> Result<BatchStatement<'_>> {
        BatchStatement::new(&self.conn, sql)
    }

    /// Prepare a call escape such as `{ ? = call upper( ? ) }`.
    pub fn prepare_call(&self, escape: &str) -> Result<CallableStatement<'_>> {
        CallableStatement::new(&self.conn, escape)
    }

    /// Register a deterministic scalar routine callable from SQL and from
    /// [`CallableStatement`]. `n_args` of -1 accepts any arity.
    pub fn register_function<F>(&self, name: &str, n_args: i32, routine: F) -> Result<()>
    where
        F: Fn(&[Value]) -> Value + Send + UnwindSafe + 'static,
    {
        self.conn.create_scalar_function(
            name,
            n_args,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            move |ctx| {
                let args = (0..ctx.len())
                    .map(|i| Value::from(ctx.get_raw(i)))
                    .collect::<Vec<_>>();
                Ok(routine(&args))
            },
        )?;
        debug!("registered routine {}/{}", name, n_args);
        Ok(())
    }

    /// Columns of `table` in declaration order; empty when the table is absent.
    pub fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    not_null: row.get(2)?,
                    primary_key: row.get::<_, i64>(3)? > 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<()> {
        let target = self.target;
        self.conn.close().map_err(|(_, err)| DatabaseError::from(err))?;
        info!("closed sqlite connection to {}", target);
        Ok(())
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
