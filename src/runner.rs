//! The demonstration sequence.
//!
//! Each step is a public method so it can be checked on its own; [`DemoRunner::run`]
//! chains them against one fresh connection. Statements live only inside the
//! step that prepares them and are released before the next step starts.

use std::io::Write;

use log::{debug, info};

use crate::config::DemoConfig;
use crate::error::Result;
use crate::order_item::OrderItem;
use crate::sqlite::{DataType, Database, Params, SqlQuery};

/// Prefix of the single line printed when the sequence aborts.
pub const FAILURE_PREFIX: &str = "Database connection failure: ";

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub direct_inserts: usize,
    pub prepared_inserts: usize,
    pub batched_inserts: usize,
    pub rows: Vec<OrderItem>,
    pub call_result: String,
}

pub struct DemoRunner {
    config: DemoConfig,
}

impl DemoRunner {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    fn items(&self) -> impl Iterator<Item = i64> {
        1..=self.config.item_count
    }

    fn insert_prefix(&self) -> String {
        format!(
            "INSERT INTO {} (CLIENT_ID, ORDER_ID, ITEM_ID) VALUES",
            self.config.table
        )
    }

    /// Open a fresh database session.
    pub fn connect(&self) -> Result<Database> {
        Database::open(&self.config.sqlite_config()?)
    }

    pub fn create_schema(&self, db: &Database) -> Result<()> {
        db.execute_script(&self.config.create_sql())?;
        debug!("created table {}", self.config.table);
        Ok(())
    }

    /// One literal insert per item, each run as its own statement.
    pub fn insert_direct(&self, db: &Database) -> Result<usize> {
        let prefix = self.insert_prefix();
        let mut inserted = 0;
        for item in self.items() {
            inserted += db.execute(&SqlQuery::new(&format!("{} (1, 1, {})", prefix, item)))?;
        }
        debug!("direct inserts: {}", inserted);
        Ok(inserted)
    }

    /// One compiled statement, rebound and executed per item.
    pub fn insert_prepared(&self, db: &Database) -> Result<usize> {
        let mut stmt = db.prepare(&format!("{} (1, 2, ?)", self.insert_prefix()))?;
        let mut params = Params::new();
        let mut inserted = 0;
        for item in self.items() {
            params.set(1, item);
            inserted += stmt.execute(&params)?;
        }
        debug!("prepared inserts: {}", inserted);
        Ok(inserted)
    }

    /// Every item queued into one batch and submitted in a single call.
    pub fn insert_batched(&self, db: &Database) -> Result<usize> {
        let mut batch = db.prepare_batch(&format!("{} (?, 3, ?)", self.insert_prefix()))?;
        for item in self.items() {
            batch.add(
                Params::new()
                    .with_value(self.config.batch_client_id)
                    .with_value(item),
            )?;
        }
        let inserted: usize = batch.execute()?.into_iter().sum();
        debug!("batched inserts: {}", inserted);
        Ok(inserted)
    }

    /// Read every row back, writing one line per row to `out`.
    pub fn read_all(&self, db: &Database, out: &mut impl Write) -> Result<Vec<OrderItem>> {
        let mut stmt = db.prepare(&format!("SELECT * FROM {} ORDER BY ID", self.config.table))?;
        let mut rows = Vec::new();
        for row in stmt.query_as::<OrderItem>(&Params::new())? {
            let row = row?;
            writeln!(out, "{}", row)?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Uppercase the configured input through a callable statement.
    pub fn call_function(&self, db: &Database, out: &mut impl Write) -> Result<String> {
        let mut call = db.prepare_call("{ ? = call upper( ? ) }")?;
        call.register_out_parameter(1, DataType::Text)?;
        call.set_value(2, self.config.call_input.as_str())?;
        call.execute()?;
        let upper = call.get_string(1)?;
        writeln!(out, "{}", upper)?;
        Ok(upper)
    }

    /// Run the whole sequence. The first failure aborts the remaining steps;
    /// the connection is dropped on that path and closed on success.
    pub fn run(&self, out: &mut impl Write) -> Result<DemoReport> {
        let db = self.connect()?;
        self.create_schema(&db)?;
        let direct_inserts = self.insert_direct(&db)?;
        let prepared_inserts = self.insert_prepared(&db)?;
        let batched_inserts = self.insert_batched(&db)?;
        let rows = self.read_all(&db, out)?;
        let call_result = self.call_function(&db, out)?;
        db.close()?;

        info!("demonstration finished with {} rows", rows.len());
        Ok(DemoReport {
            direct_inserts,
            prepared_inserts,
            batched_inserts,
            rows,
            call_result,
        })
    }

    /// [`run`](Self::run), reporting a failure as one line on `out` instead of
    /// returning it.
    pub fn run_and_report(&self, out: &mut impl Write) -> Option<DemoReport> {
        match self.run(out) {
            Ok(report) => Some(report),
            Err(err) => {
                log::error!("demonstration aborted: {}", err);
                // Nothing left to report to if the sink itself is broken.
                let _ = writeln!(out, "{}{}", FAILURE_PREFIX, err);
                None
            }
        }
    }
}
