use std::fmt;

use crate::sqlite::{ColumnConstraint, ColumnDefinition, DataType, FromRow, TableDefinition};

/// One row of the order items table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderItem {
    pub id: i64,
    pub client_id: i64,
    pub order_id: i64,
    pub item_id: i64,
}

impl OrderItem {
    /// The `(client, order, item)` triple, ignoring the generated id.
    pub fn key(&self) -> (i64, i64, i64) {
        (self.client_id, self.order_id, self.item_id)
    }
}

impl FromRow for OrderItem {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("ID")?,
            client_id: row.get("CLIENT_ID")?,
            order_id: row.get("ORDER_ID")?,
            item_id: row.get("ITEM_ID")?,
        })
    }
}

impl fmt::Display for OrderItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "client={}, order={}, item={}",
            self.client_id, self.order_id, self.item_id
        )
    }
}

/// Definition of the order items table under `name`.
pub fn order_items_table(name: &str) -> TableDefinition {
    let required = |column: &str| {
        ColumnDefinition::new(column, DataType::Integer).with_constraint(ColumnConstraint::NotNull)
    };
    TableDefinition::new(name)
        .add_column(
            ColumnDefinition::new("ID", DataType::Integer)
                .with_constraint(ColumnConstraint::PrimaryKey)
                .with_constraint(ColumnConstraint::AutoIncrement),
        )
        .add_column(required("CLIENT_ID"))
        .add_column(required("ORDER_ID"))
        .add_column(required("ITEM_ID"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_console_line() {
        let item = OrderItem {
            id: 7,
            client_id: 1,
            order_id: 2,
            item_id: 3,
        };
        assert_eq!(item.to_string(), "client=1, order=2, item=3");
        assert_eq!(item.key(), (1, 2, 3));
    }

    #[test]
    fn table_ddl() {
        assert_eq!(
            order_items_table("ORDER_ITEMS").create_sql(),
            "CREATE TABLE ORDER_ITEMS (ID INTEGER PRIMARY KEY AUTOINCREMENT, \
             CLIENT_ID INTEGER NOT NULL, ORDER_ID INTEGER NOT NULL, ITEM_ID INTEGER NOT NULL)"
        );
    }
}
