use async_trait::async_trait;
use thiserror::Error;

/// Rows returned by the tabular store, already stringified for prompt
/// injection. Column order matches the query's projection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a markdown table, the form the answer-writing prompt
    /// receives. An empty result renders as a fixed placeholder so the
    /// model sees "no rows" rather than an empty string.
    pub fn to_markdown(&self) -> String {
        if self.columns.is_empty() {
            return "(no rows)".to_string();
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(format!("| {} |", self.columns.join(" | ")));
        lines.push(format!(
            "| {} |",
            self.columns.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
        ));
        for row in &self.rows {
            lines.push(format!("| {} |", row.join(" | ")));
        }
        lines.join("\n")
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("query execution failed: {0}")]
    Query(String),
    #[error("database connection failed: {0}")]
    Connection(String),
}

/// One operation: hand a query string to the store, get rows back. The
/// workflow's executor step is the only caller; it treats every error here
/// as data, not as a failure.
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn run_query(&self, sql: &str) -> Result<ResultTable, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::ResultTable;

    #[test]
    fn markdown_rendering_includes_header_and_separator() {
        let table = ResultTable::new(
            vec!["State".to_string(), "avg_spent".to_string()],
            vec![vec!["CA".to_string(), "412.5".to_string()]],
        );

        let rendered = table.to_markdown();
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("| State | avg_spent |"));
        assert_eq!(lines.next(), Some("| --- | --- |"));
        assert_eq!(lines.next(), Some("| CA | 412.5 |"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_result_renders_placeholder() {
        assert_eq!(ResultTable::default().to_markdown(), "(no rows)");
    }

    #[test]
    fn column_only_result_renders_empty_body() {
        let table = ResultTable::new(vec!["Name".to_string()], Vec::new());
        assert!(table.is_empty());
        assert_eq!(table.to_markdown(), "| Name |\n| --- |");
    }
}
