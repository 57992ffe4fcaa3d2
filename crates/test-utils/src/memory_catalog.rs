//! In-memory catalog client.
//!
//! Serves a fixed list of rows in insertion order. It understands only the
//! parts of the compiled SQL that tests rely on: `IN` / `NOT IN` lists on any
//! catalog column and the trailing `LIMIT`. Ranges, envelopes and ordering
//! are ignored, so rows should be stored in the order the query would sort
//! them.

use catalog::{CatalogClient, CatalogRow, CATALOG_COLUMNS};
use landsat_common::{LandsatError, LandsatResult};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::fixtures::SceneRow;

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    rows: Vec<CatalogRow>,
    failures: Mutex<VecDeque<LandsatError>>,
    queries: Mutex<Vec<String>>,
}

impl InMemoryCatalog {
    pub fn new(rows: Vec<CatalogRow>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn from_scenes(scenes: &[SceneRow]) -> Self {
        Self::new(scenes.iter().map(SceneRow::to_row).collect())
    }

    /// Fail the next query with `error`. Queued failures are used in order.
    pub fn fail_next(self, error: LandsatError) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(error);
        self
    }

    /// Every statement received, including failed ones.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl CatalogClient for InMemoryCatalog {
    fn execute(&self, sql: &str) -> LandsatResult<Vec<CatalogRow>> {
        self.queries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(sql.to_string());

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let lists: Vec<(usize, bool, Vec<String>)> = CATALOG_COLUMNS
            .iter()
            .enumerate()
            .flat_map(|(index, column)| {
                in_lists(sql, column)
                    .into_iter()
                    .map(move |(negated, values)| (index, negated, values))
            })
            .collect();

        let limit = limit(sql).unwrap_or(usize::MAX);
        Ok(self
            .rows
            .iter()
            .filter(|row| {
                lists.iter().all(|(index, negated, values)| {
                    let value = row.get(*index).map(literal).unwrap_or_default();
                    values.contains(&value) != *negated
                })
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `(negated, values)` for each `t1.<column> IN (...)` in the statement.
fn in_lists(sql: &str, column: &str) -> Vec<(bool, Vec<String>)> {
    let marker = format!("t1.{} IN (", column);
    let mut lists = Vec::new();
    let mut rest = sql;
    let mut consumed = 0;

    while let Some(pos) = rest.find(&marker) {
        let start = consumed + pos;
        let negated = sql[..start].ends_with("NOT (");
        let body_start = start + marker.len();
        let Some(body_len) = sql[body_start..].find(')') else {
            break;
        };
        let values = sql[body_start..body_start + body_len]
            .split(", ")
            .map(|v| v.trim().trim_matches('"').to_string())
            .collect();
        lists.push((negated, values));

        consumed = body_start + body_len;
        rest = &sql[consumed..];
    }
    lists
}

fn limit(sql: &str) -> Option<usize> {
    sql.rsplit_once(" LIMIT ")
        .and_then(|(_, n)| n.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_lists() {
        let sql = "SELECT * FROM t AS t1 WHERE ((t1.wrs_path IN (33)) \
AND NOT (t1.scene_id IN (\"A\", \"B\"))) ORDER BY t1.sensing_time DESC LIMIT 3";
        assert_eq!(in_lists(sql, "wrs_path"), vec![(false, vec!["33".to_string()])]);
        assert_eq!(
            in_lists(sql, "scene_id"),
            vec![(true, vec!["A".to_string(), "B".to_string()])]
        );
        assert_eq!(limit(sql), Some(3));
    }
}
