use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// One pending cell override
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellUpdate {
    pub index: u64,
    pub column: String,
    pub value: Value,
}

/// Pending manual edits keyed by `(row, column)`, awaiting a batch save.
///
/// Staging the same cell twice keeps only the latest value. Commit drains
/// the buffer in row-then-column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingBuffer {
    cells: BTreeMap<(u64, String), Value>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, row: u64, column: impl Into<String>, value: Value) {
        self.cells.insert((row, column.into()), value);
    }

    pub fn unstage(&mut self, row: u64, column: &str) -> Option<Value> {
        self.cells.remove(&(row, column.to_string()))
    }

    pub fn get(&self, row: u64, column: &str) -> Option<&Value> {
        self.cells.get(&(row, column.to_string()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn discard(&mut self) {
        self.cells.clear();
    }

    /// Remove edits to columns no longer present
    pub fn retain_columns(&mut self, columns: &[String]) {
        self.cells.retain(|(_, column), _| columns.contains(column));
    }

    /// Drain every staged edit
    pub fn commit(&mut self) -> Vec<CellUpdate> {
        std::mem::take(&mut self.cells)
            .into_iter()
            .map(|((index, column), value)| CellUpdate { index, column, value })
            .collect()
    }

    /// Parameters of a `manual_update` request for the staged edits
    pub fn to_params(&self) -> Map<String, Value> {
        let updates: Vec<Value> = self
            .cells
            .iter()
            .map(|((index, column), value)| json!({"index": index, "column": column, "value": value}))
            .collect();
        let mut params = Map::new();
        params.insert("updates".to_string(), Value::Array(updates));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_edit_wins_and_commit_drains() {
        let mut buf = StagingBuffer::new();
        buf.stage(2, "price", json!(10));
        buf.stage(0, "name", json!("a"));
        buf.stage(2, "price", json!(12));
        assert_eq!(buf.len(), 2);

        let updates = buf.commit();
        assert!(buf.is_empty());
        assert_eq!(updates[0], CellUpdate { index: 0, column: "name".into(), value: json!("a") });
        assert_eq!(updates[1].value, json!(12));
    }

    #[test]
    fn test_discard_and_column_pruning() {
        let mut buf = StagingBuffer::new();
        buf.stage(0, "a", json!(1));
        buf.stage(1, "b", json!(2));
        buf.retain_columns(&["a".to_string()]);
        assert!(buf.get(1, "b").is_none());
        assert_eq!(buf.unstage(0, "a"), Some(json!(1)));

        buf.stage(3, "a", json!(null));
        buf.discard();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_params_shape() {
        let mut buf = StagingBuffer::new();
        buf.stage(4, "qty", json!(7));
        assert_eq!(
            Value::Object(buf.to_params()),
            json!({"updates": [{"index": 4, "column": "qty", "value": 7}]})
        );
    }
}
