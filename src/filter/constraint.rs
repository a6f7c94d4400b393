use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{validate_field_name, FilterData, SortDirection};

/// A single server-side directive attached to a bulk read.
///
/// The fetch layer passes constraints through untouched; only store backends
/// interpret them, after folding the ordered list into [`FilterData`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Where { condition: Value },
    OrderBy { field: String, direction: SortDirection },
    Limit { count: i32 },
    Offset { count: i32 },
    Select { fields: Vec<String> },
}

impl Constraint {
    pub fn where_clause(condition: Value) -> Self {
        Constraint::Where { condition }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut condition = serde_json::Map::new();
        condition.insert(field.into(), value.into());
        Constraint::Where { condition: Value::Object(condition) }
    }

    pub fn order_by(field: impl Into<String>, direction: SortDirection) -> Self {
        Constraint::OrderBy { field: field.into(), direction }
    }

    pub fn limit(count: i32) -> Self {
        Constraint::Limit { count }
    }

    pub fn offset(count: i32) -> Self {
        Constraint::Offset { count }
    }

    pub fn select<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Constraint::Select { fields: fields.into_iter().map(Into::into).collect() }
    }
}

/// Fold an ordered constraint list into one [`FilterData`].
///
/// Where-conditions are conjunctive, order directives accumulate in sequence,
/// and the last limit/offset/select wins.
pub fn fold_constraints(constraints: &[Constraint]) -> Result<FilterData, FilterError> {
    let mut conditions: Vec<Value> = Vec::new();
    let mut order: Vec<Value> = Vec::new();
    let mut data = FilterData::default();

    for constraint in constraints {
        match constraint {
            Constraint::Where { condition } => {
                FilterWhere::validate(condition)?;
                if !condition.is_null() {
                    conditions.push(condition.clone());
                }
            }
            Constraint::OrderBy { field, direction } => {
                validate_field_name(field)?;
                order.push(Value::String(format!("{} {}", field, direction.as_str())));
            }
            Constraint::Limit { count } => {
                if *count < 0 {
                    return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
                }
                data.limit = Some(*count);
            }
            Constraint::Offset { count } => {
                if *count < 0 {
                    return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
                }
                data.offset = Some(*count);
            }
            Constraint::Select { fields } => {
                for field in fields {
                    if field != "*" {
                        validate_field_name(field)?;
                    }
                }
                data.select = Some(fields.clone());
            }
        }
    }

    data.where_clause = match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(json!({ "$and": conditions })),
    };
    if !order.is_empty() {
        data.order = Some(Value::Array(order));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_in_order() {
        let data = fold_constraints(&[
            Constraint::eq("status", "active"),
            Constraint::where_clause(json!({ "age": { "$gte": 18 } })),
            Constraint::order_by("lastName", SortDirection::Asc),
            Constraint::order_by("createdAt", SortDirection::Desc),
            Constraint::limit(50),
            Constraint::limit(10),
        ])
        .unwrap();

        assert_eq!(
            data.where_clause,
            Some(json!({ "$and": [{ "status": "active" }, { "age": { "$gte": 18 } }] }))
        );
        assert_eq!(data.order, Some(json!(["lastName asc", "createdAt desc"])));
        assert_eq!(data.limit, Some(10));
        assert_eq!(data.offset, None);
    }

    #[test]
    fn empty_list_folds_to_empty_filter() {
        assert!(fold_constraints(&[]).unwrap().is_empty());
    }

    #[test]
    fn rejects_negative_limit_and_bad_fields() {
        assert!(matches!(
            fold_constraints(&[Constraint::limit(-1)]),
            Err(FilterError::InvalidLimit(_))
        ));
        assert!(matches!(
            fold_constraints(&[Constraint::order_by("name; DROP", SortDirection::Asc)]),
            Err(FilterError::InvalidField(_))
        ));
        assert!(fold_constraints(&[Constraint::where_clause(json!([1, 2]))]).is_err());
    }

    #[test]
    fn constraints_serialize_with_type_tag() {
        let value = serde_json::to_value(Constraint::limit(5)).unwrap();
        assert_eq!(value, json!({ "type": "limit", "count": 5 }));
        let back: Constraint = serde_json::from_value(json!({
            "type": "order_by", "field": "name", "direction": "desc"
        }))
        .unwrap();
        assert_eq!(back, Constraint::order_by("name", SortDirection::Desc));
    }
}
