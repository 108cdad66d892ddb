use log::debug;
use rusqlite::{params_from_iter, Connection};

use super::{bind, DataType, Params, Value};
use crate::error::{DatabaseError, Result};

/// The parts of a `{ [? =] call name(args) }` escape.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CallEscape {
    returns: bool,
    routine: String,
    args: String,
}

impl CallEscape {
    fn parse(escape: &str) -> Result<Self> {
        let malformed = || DatabaseError::CallSyntax(escape.to_string());

        let body = escape
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(malformed)?
            .trim();

        let (returns, body) = match body.strip_prefix('?') {
            Some(rest) => (
                true,
                rest.trim_start().strip_prefix('=').ok_or_else(malformed)?.trim_start(),
            ),
            None => (false, body),
        };

        let keyword = body.get(..4).ok_or_else(malformed)?;
        if !keyword.eq_ignore_ascii_case("call") {
            return Err(malformed());
        }
        let rest = &body[4..];
        if !rest.starts_with(char::is_whitespace) {
            return Err(malformed());
        }
        let rest = rest.trim();

        let (routine, args) = match rest.find('(') {
            Some(open) => {
                let args = rest[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
                (rest[..open].trim(), args.trim())
            }
            None => (rest, ""),
        };
        if routine.is_empty() || !routine.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(malformed());
        }

        Ok(Self {
            returns,
            routine: routine.to_string(),
            args: args.to_string(),
        })
    }

    fn to_sql(&self) -> String {
        format!("SELECT {}({})", self.routine, self.args)
    }
}

/// Invokes a builtin or registered routine through the call escape syntax.
///
/// Parameter indexes follow the escape text: with a `? =` return slot, index 1
/// is the output parameter and the routine's arguments start at 2.
pub struct CallableStatement<'conn> {
    escape: CallEscape,
    stmt: rusqlite::Statement<'conn>,
    inputs: Params,
    out_type: Option<DataType>,
    result: Option<Value>,
}

impl<'conn> CallableStatement<'conn> {
    pub(super) fn new(conn: &'conn Connection, escape: &str) -> Result<Self> {
        let escape = CallEscape::parse(escape)?;
        let stmt = conn.prepare(&escape.to_sql())?;
        Ok(Self {
            escape,
            stmt,
            inputs: Params::new(),
            out_type: None,
            result: None,
        })
    }

    pub fn routine(&self) -> &str {
        &self.escape.routine
    }

    fn offset(&self) -> usize {
        usize::from(self.escape.returns)
    }

    /// Total number of parameter indexes, output slot included.
    pub fn parameter_count(&self) -> usize {
        self.offset() + self.stmt.parameter_count()
    }

    /// Map an escape-level index to the routine's argument position.
    fn input_position(&self, index: usize) -> Result<usize> {
        if index <= self.offset() || index > self.parameter_count() {
            return Err(DatabaseError::ParameterIndex(index));
        }
        Ok(index - self.offset())
    }

    pub fn register_out_parameter(&mut self, index: usize, data_type: DataType) -> Result<()> {
        if !self.escape.returns || index != 1 {
            return Err(DatabaseError::ParameterIndex(index));
        }
        self.out_type = Some(data_type);
        Ok(())
    }

    pub fn set_value(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let position = self.input_position(index)?;
        self.inputs.set(position, value);
        Ok(())
    }

    /// Invoke the routine, capturing its return value when one was registered.
    pub fn execute(&mut self) -> Result<()> {
        self.result = None;
        let offset = self.offset();
        let values = bind(self.stmt.parameter_count(), &self.inputs)
            .map_err(|err| match err {
                DatabaseError::UnboundParameter(position) => {
                    DatabaseError::UnboundParameter(position + offset)
                }
                other => other,
            })?;
        let value = self
            .stmt
            .query_row(params_from_iter(values), |row| row.get_ref(0).map(Value::from))?;
        debug!("called {} -> {}", self.escape.routine, value.type_name());

        if let Some(expected) = self.out_type {
            if !expected.accepts(&value) {
                return Err(DatabaseError::TypeMismatch {
                    index: 1,
                    expected: expected.as_sql(),
                    found: value.type_name(),
                });
            }
            self.result = Some(value);
        }
        Ok(())
    }

    /// The value of a registered output parameter after the last successful
    /// [`execute`](Self::execute).
    pub fn get_value(&self, index: usize) -> Result<&Value> {
        match (index, self.out_type, &self.result) {
            (1, Some(_), Some(value)) => Ok(value),
            _ => Err(DatabaseError::OutputParameter(index)),
        }
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        match self.get_value(index)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(DatabaseError::TypeMismatch {
                index,
                expected: "text",
                found: other.type_name(),
            }),
        }
    }

    pub fn get_i64(&self, index: usize) -> Result<i64> {
        match self.get_value(index)? {
            Value::Integer(i) => Ok(*i),
            Value::Boolean(b) => Ok(i64::from(*b)),
            other => Err(DatabaseError::TypeMismatch {
                index,
                expected: "integer",
                found: other.type_name(),
            }),
        }
    }
}
