use log::debug;
use rusqlite::{params_from_iter, Connection};

use super::{bind, Params};
use crate::error::{DatabaseError, Result};

/// Accumulates parameter sets for one statement shape and submits them in a
/// single call.
///
/// The whole batch runs inside one transaction: either every entry is applied
/// or, on the first failing entry, none are.
pub struct BatchStatement<'conn> {
    conn: &'conn Connection,
    sql: String,
    parameter_count: usize,
    entries: Vec<Params>,
}

impl<'conn> BatchStatement<'conn> {
    pub(super) fn new(conn: &'conn Connection, sql: &str) -> Result<Self> {
        // Compiled only to validate the statement; released right away.
        let parameter_count = conn.prepare(sql)?.parameter_count();
        Ok(Self {
            conn,
            sql: sql.to_string(),
            parameter_count,
            entries: Vec::new(),
        })
    }

    /// Queue one parameter set. Every placeholder must be bound.
    pub fn add(&mut self, params: Params) -> Result<()> {
        bind(self.parameter_count, &params)?;
        self.entries.push(params);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every queued entry without running it.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Submit the batch, returning the update count of each entry in order.
    ///
    /// The queue is emptied on success and kept intact on failure.
    pub fn execute(&mut self) -> Result<Vec<usize>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut counts = Vec::with_capacity(self.entries.len());
        {
            let mut stmt = tx.prepare(&self.sql)?;
            for (index, params) in self.entries.iter().enumerate() {
                let values = bind(self.parameter_count, params)?;
                let changed = stmt
                    .execute(params_from_iter(values))
                    .map_err(|source| DatabaseError::Batch { index, source })?;
                counts.push(changed);
            }
        }
        tx.commit()?;

        debug!("executed batch of {}: {}", self.entries.len(), self.sql);
        self.entries.clear();
        Ok(counts)
    }
}
