use sqlite_statements::sqlite::{
    ColumnConstraint, ColumnDefinition, ConnectionTarget, DataType, Database, FromRow, Params,
    Schema, SqlQuery, SqliteConfig, TableDefinition, Value,
};
use sqlite_statements::DatabaseError;
use tempfile::NamedTempFile;

#[derive(Debug, PartialEq)]
struct User {
    _id: i64,
    name: String,
    age: Option<i64>,
}

impl FromRow for User {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            _id: row.get(0)?,
            name: row.get(1)?,
            age: row.get(2)?,
        })
    }
}

fn users_schema() -> Schema {
    Schema::new().add_table(
        TableDefinition::new("users")
            .add_column(
                ColumnDefinition::new("id", DataType::Integer)
                    .with_constraint(ColumnConstraint::PrimaryKey),
            )
            .add_column(
                ColumnDefinition::new("name", DataType::Text)
                    .with_constraint(ColumnConstraint::NotNull)
                    .with_constraint(ColumnConstraint::Unique),
            )
            .add_column(ColumnDefinition::new("age", DataType::Integer)),
    )
}

// Helper function to create an in-memory database for testing
fn create_test_db() -> Result<Database, DatabaseError> {
    let db = Database::open(&SqliteConfig::in_memory())?;
    db.create_schema(&users_schema())?;
    Ok(db)
}

// Helper function to create a temporary file-based database
fn create_temp_db() -> Result<(Database, NamedTempFile), DatabaseError> {
    let temp_file = NamedTempFile::new().unwrap();
    let target = ConnectionTarget::File(temp_file.path().to_path_buf());
    let db = Database::open(&SqliteConfig::new(target))?;
    db.create_schema(&users_schema())?;
    Ok((db, temp_file))
}

fn insert_user(db: &Database, name: &str, age: Option<i64>) -> Result<usize, DatabaseError> {
    let age = age.map_or(Value::Null, Value::Integer);
    db.execute(
        &SqlQuery::new("INSERT INTO users (name, age) VALUES (?1, ?2)")
            .with_params(Params::new().with_value(name).with_value(age)),
    )
}

#[test]
fn test_basic_operations() {
    test_basic_operations_impl().unwrap();
}

fn test_basic_operations_impl() -> Result<(), DatabaseError> {
    let db = create_test_db()?;
    assert_eq!(insert_user(&db, "John Doe", Some(30))?, 1);
    assert_eq!(insert_user(&db, "Jane Roe", None)?, 1);

    let mut stmt = db.prepare("SELECT id, name, age FROM users WHERE name = ?")?;
    let john: Vec<User> = stmt
        .query_as::<User>(&Params::new().with_value("John Doe"))?
        .collect::<Result<_, _>>()?;
    assert_eq!(
        john,
        [User {
            _id: 1,
            name: "John Doe".into(),
            age: Some(30)
        }]
    );

    let jane: Vec<User> = stmt
        .query_as::<User>(&Params::new().with_value("Jane Roe"))?
        .collect::<Result<_, _>>()?;
    assert_eq!(jane[0].age, None);

    let nobody = stmt.query_as::<User>(&Params::new().with_value("Nobody"))?.count();
    assert_eq!(nobody, 0);
    Ok(())
}

#[test]
fn test_file_database_persists_between_connections() {
    let (db, temp_file) = create_temp_db().unwrap();
    insert_user(&db, "John Doe", Some(30)).unwrap();
    db.close().unwrap();

    let target = ConnectionTarget::File(temp_file.path().to_path_buf());
    let reopened = Database::open(&SqliteConfig::new(target.clone())).unwrap();
    assert_eq!(reopened.target(), &target);
    assert_eq!(reopened.count_rows("users").unwrap(), 1);
}

#[test]
fn test_unopenable_file_is_a_connection_error() {
    let target = ConnectionTarget::File("/nonexistent-dir/for/sure/demo.db".into());
    let err = Database::open(&SqliteConfig::new(target)).err().unwrap();
    assert!(matches!(err, DatabaseError::Connection { .. }));
    assert!(err
        .to_string()
        .starts_with("cannot open sqlite:/nonexistent-dir/for/sure/demo.db"));
}

#[test]
fn test_prepared_statement_requires_every_parameter() {
    let db = create_test_db().unwrap();
    let mut stmt = db
        .prepare("INSERT INTO users (name, age) VALUES (?, ?)")
        .unwrap();
    assert_eq!(stmt.sql(), "INSERT INTO users (name, age) VALUES (?, ?)");
    assert_eq!(stmt.parameter_count(), 2);
    assert!(matches!(
        stmt.execute(&Params::new().with_value("x")),
        Err(DatabaseError::UnboundParameter(2))
    ));

    let mut params = Params::new().with_value("x").with_value(1);
    assert_eq!(stmt.execute(&params).unwrap(), 1);
    params.clear();
    assert!(matches!(
        stmt.execute(&params),
        Err(DatabaseError::UnboundParameter(1))
    ));
    assert_eq!(db.count_rows("users").unwrap(), 1);
}

#[test]
fn test_batch_applies_all_entries() {
    let db = create_test_db().unwrap();
    let mut batch = db
        .prepare_batch("INSERT INTO users (name, age) VALUES (?, ?)")
        .unwrap();
    assert!(batch.execute().unwrap().is_empty());

    for (name, age) in [("a", 1), ("b", 2), ("c", 3)] {
        batch
            .add(Params::new().with_value(name).with_value(age))
            .unwrap();
    }
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.execute().unwrap(), [1, 1, 1]);
    assert!(batch.is_empty());
    assert_eq!(db.count_rows("users").unwrap(), 3);

    batch.add(Params::new().with_value("d").with_value(4)).unwrap();
    batch.clear();
    assert!(batch.execute().unwrap().is_empty());
    assert_eq!(db.count_rows("users").unwrap(), 3);
}

#[test]
fn test_batch_is_atomic() {
    let db = create_test_db().unwrap();
    insert_user(&db, "taken", None).unwrap();

    let mut batch = db
        .prepare_batch("INSERT INTO users (name, age) VALUES (?, ?)")
        .unwrap();
    batch.add(Params::new().with_value("fresh").with_value(1)).unwrap();
    batch.add(Params::new().with_value("other").with_value(2)).unwrap();
    batch.add(Params::new().with_value("taken").with_value(3)).unwrap();

    let err = batch.execute().unwrap_err();
    assert!(matches!(err, DatabaseError::Batch { index: 2, .. }));
    assert_eq!(batch.len(), 3);
    assert_eq!(db.count_rows("users").unwrap(), 1);
}

#[test]
fn test_batch_rejects_incomplete_entries() {
    let db = create_test_db().unwrap();
    let mut batch = db
        .prepare_batch("INSERT INTO users (name, age) VALUES (?, ?)")
        .unwrap();
    assert!(matches!(
        batch.add(Params::new().with_value("only name")),
        Err(DatabaseError::UnboundParameter(2))
    ));
    assert!(batch.is_empty());

    assert!(matches!(
        db.prepare_batch("INSERT INTO missing VALUES (?)"),
        Err(DatabaseError::Sql(_))
    ));
}

#[test]
fn test_callable_builtin() {
    let db = Database::open(&SqliteConfig::in_memory()).unwrap();
    let mut call = db.prepare_call("{ ? = call upper( ? ) }").unwrap();
    assert_eq!(call.routine(), "upper");
    assert_eq!(call.parameter_count(), 2);

    call.register_out_parameter(1, DataType::Text).unwrap();
    assert!(matches!(
        call.execute(),
        Err(DatabaseError::UnboundParameter(2))
    ));

    call.set_value(2, "lowercase to uppercase").unwrap();
    call.execute().unwrap();
    assert_eq!(call.get_string(1).unwrap(), "LOWERCASE TO UPPERCASE");

    // Statement is reusable with a new binding.
    call.set_value(2, "again").unwrap();
    call.execute().unwrap();
    assert_eq!(call.get_string(1).unwrap(), "AGAIN");
}

#[test]
fn test_callable_parameter_rules() {
    let db = Database::open(&SqliteConfig::in_memory()).unwrap();
    let mut call = db.prepare_call("{ ? = call length( ? ) }").unwrap();

    assert!(matches!(
        call.set_value(1, "x"),
        Err(DatabaseError::ParameterIndex(1))
    ));
    assert!(matches!(
        call.set_value(3, "x"),
        Err(DatabaseError::ParameterIndex(3))
    ));
    assert!(matches!(
        call.register_out_parameter(2, DataType::Integer),
        Err(DatabaseError::ParameterIndex(2))
    ));

    call.set_value(2, "four").unwrap();
    call.execute().unwrap();
    // Not registered, so nothing was captured.
    assert!(matches!(
        call.get_value(1),
        Err(DatabaseError::OutputParameter(1))
    ));

    call.register_out_parameter(1, DataType::Text).unwrap();
    assert!(matches!(
        call.execute(),
        Err(DatabaseError::TypeMismatch { index: 1, .. })
    ));

    call.register_out_parameter(1, DataType::Integer).unwrap();
    call.execute().unwrap();
    assert_eq!(call.get_i64(1).unwrap(), 4);
    assert!(matches!(
        call.get_string(1),
        Err(DatabaseError::TypeMismatch { .. })
    ));
}

#[test]
fn test_callable_registered_routine() {
    let db = Database::open(&SqliteConfig::in_memory()).unwrap();
    db.register_function("order_total", 2, |args| match args {
        [Value::Integer(qty), Value::Integer(price)] => Value::Integer(qty * price),
        _ => Value::Null,
    })
    .unwrap();

    let mut call = db.prepare_call("{ ? = call order_total(?, ?) }").unwrap();
    call.register_out_parameter(1, DataType::Integer).unwrap();
    call.set_value(2, 3).unwrap();
    call.set_value(3, 7).unwrap();
    call.execute().unwrap();
    assert_eq!(call.get_i64(1).unwrap(), 21);

    call.set_value(3, "seven").unwrap();
    call.execute().unwrap();
    assert_eq!(call.get_value(1).unwrap(), &Value::Null);
}

#[test]
fn test_failed_call_clears_previous_output() {
    let db = Database::open(&SqliteConfig::in_memory()).unwrap();
    db.register_function("echo", 1, |args| args[0].clone()).unwrap();

    let mut call = db.prepare_call("{ ? = call echo(?) }").unwrap();
    call.register_out_parameter(1, DataType::Text).unwrap();
    call.set_value(2, "first").unwrap();
    call.execute().unwrap();
    assert_eq!(call.get_string(1).unwrap(), "first");

    call.set_value(2, Value::Integer(42)).unwrap();
    assert!(matches!(
        call.execute(),
        Err(DatabaseError::TypeMismatch { index: 1, .. })
    ));
    assert!(matches!(
        call.get_value(1),
        Err(DatabaseError::OutputParameter(1))
    ));
    assert!(call.get_string(1).is_err());
}

#[test]
fn test_malformed_call_and_unknown_routine() {
    let db = Database::open(&SqliteConfig::in_memory()).unwrap();
    assert!(matches!(
        db.prepare_call("call upper(?)"),
        Err(DatabaseError::CallSyntax(_))
    ));
    assert!(matches!(
        db.prepare_call("{ ? = call no_such_routine(?) }"),
        Err(DatabaseError::Sql(_))
    ));
}
