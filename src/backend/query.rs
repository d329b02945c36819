use serde_json::Value;

/// One record as the table store hands it back: column name to JSON value.
pub(crate) type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Table {
    Profiles,
    Exams,
    Questions,
    Submissions,
    Results,
    AuthIdentities,
}

impl Table {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Exams => "exams",
            Table::Questions => "questions",
            Table::Submissions => "submissions",
            Table::Results => "results",
            Table::AuthIdentities => "auth_identities",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Filter {
    pub(crate) column: &'static str,
    pub(crate) value: Value,
}

impl Filter {
    /// Textual form used on the wire and for `::text` comparisons.
    pub(crate) fn value_text(&self) -> String {
        value_text(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Order {
    pub(crate) column: &'static str,
    pub(crate) descending: bool,
}

/// Equality-filtered read/write target. Filters are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Query {
    pub(crate) table: Table,
    pub(crate) filters: Vec<Filter>,
    pub(crate) order: Option<Order>,
    pub(crate) limit: Option<u32>,
}

impl Query {
    pub(crate) fn table(table: Table) -> Self {
        Self { table, filters: Vec::new(), order: None, limit: None }
    }

    pub(crate) fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter { column, value: value.into() });
        self
    }

    pub(crate) fn order_asc(mut self, column: &'static str) -> Self {
        self.order = Some(Order { column, descending: false });
        self
    }

    pub(crate) fn order_desc(mut self, column: &'static str) -> Self {
        self.order = Some(Order { column, descending: true });
        self
    }

    pub(crate) fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_filters_order_and_limit() {
        let query = Query::table(Table::Exams)
            .eq("teacher_id", "t-1")
            .eq("status", "draft")
            .order_desc("created_at")
            .limit(5);

        assert_eq!(query.table.as_str(), "exams");
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[1].value_text(), "draft");
        assert_eq!(query.order, Some(Order { column: "created_at", descending: true }));
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn value_text_renders_scalars_without_quotes() {
        assert_eq!(value_text(&json!("abc")), "abc");
        assert_eq!(value_text(&json!(true)), "true");
        assert_eq!(value_text(&json!(12.5)), "12.5");
        assert_eq!(value_text(&Value::Null), "null");
    }

    #[test]
    fn identifiers_reject_quotes_and_spaces() {
        assert!(is_identifier("order_num"));
        assert!(!is_identifier("order num"));
        assert!(!is_identifier("id\"; drop"));
        assert!(!is_identifier("1col"));
        assert!(!is_identifier(""));
    }
}
