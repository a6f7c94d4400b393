use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{json_expr, FilterWhere};
use super::types::{validate_field_name, FilterData, FilterOrderInfo, SqlResult};

/// SQL builder for reads against a JSONB documents table.
///
/// Placeholder `$1` is always the collection path (a text value the caller binds
/// first); where-clause parameters follow as `$2::jsonb`, `$3::jsonb`, ...
pub struct Filter {
    table_name: String,
    select_fields: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    max_limit: Option<i32>,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self {
            table_name,
            select_fields: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            max_limit: None,
        })
    }

    pub fn with_max_limit(mut self, max_limit: Option<i32>) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(order)?; }
        self.limit(data.limit, data.offset)?;
        Ok(self)
    }

    pub fn select(&mut self, fields: Vec<String>) -> Result<&mut Self, FilterError> {
        for field in &fields {
            if field != "*" {
                validate_field_name(field)?;
            }
        }
        self.select_fields = fields;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<i32>, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if let Some(l) = limit { if l < 0 { return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string())); } }
        if let Some(off) = offset { if off < 0 { return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string())); } }

        self.limit = match (limit, self.max_limit) {
            (Some(l), Some(max)) if l > max => {
                tracing::warn!("Limit {} exceeds max {}, capping to max", l, max);
                Some(max)
            }
            (l, _) => l,
        };
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            format!("SELECT \"id\"::text AS \"id\", {} AS \"data\"", self.build_select_clause()),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    fn where_sql(&self) -> Result<(String, Vec<Value>), FilterError> {
        let scope = "\"collection\" = $1".to_string();
        match self.where_data {
            Some(ref where_data) if !where_data.is_null() => {
                let (sql, params) = FilterWhere::generate(where_data, 1)?;
                Ok((format!("{} AND ({})", scope, sql), params))
            }
            _ => Ok((scope, vec![])),
        }
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    fn build_select_clause(&self) -> String {
        if self.select_fields.is_empty() || self.select_fields.iter().any(|f| f == "*") {
            "\"data\"".to_string()
        } else {
            let pairs: Vec<String> = self
                .select_fields
                .iter()
                .filter(|f| f.as_str() != "id")
                .map(|f| format!("'{}', {}", f, json_expr(f)))
                .collect();
            format!("jsonb_strip_nulls(jsonb_build_object({}))", pairs.join(", "))
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
