use serde_json::Value;

use super::error::FilterError;
use super::types::{validate_field_name, FilterOp, FilterWhereInfo};

/// Parsed where-clause tree
#[derive(Debug, Clone)]
pub enum Condition {
    Field(FilterWhereInfo),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

/// Where-language parser and SQL generator for JSONB documents.
///
/// Field values live in the `"data"` JSONB column; the special field `id` maps to
/// the document key column. Every bound parameter is a JSON value cast to jsonb.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Generate SQL for a where-clause; placeholders start after `starting_param_index`
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let condition = Self::parse(where_data)?;
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build_sql(&condition)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        if where_data.is_null() {
            return Ok(());
        }
        Self::parse(where_data).map(|_| ())
    }

    pub fn parse(where_data: &Value) -> Result<Condition, FilterError> {
        match where_data {
            Value::Null => Ok(Condition::And(vec![])),
            Value::Object(obj) => {
                let mut parts = Vec::with_capacity(obj.len());
                for (key, value) in obj {
                    if key.starts_with('$') {
                        parts.push(Self::parse_logical_operator(key, value)?);
                    } else {
                        parts.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(if parts.len() == 1 { parts.remove(0) } else { Condition::And(parts) })
            }
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let children = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { Condition::And(children) } else { Condition::Or(children) })
            }
            "$not" => Ok(Condition::Not(Box::new(Self::parse(value)?))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        validate_field_name(field)?;
        if let Value::Object(obj) = value {
            let mut out = Vec::with_capacity(obj.len());
            for (op_key, op_val) in obj {
                let operator = FilterOp::parse(op_key)?;
                Self::validate_operator_data(operator, op_val)?;
                out.push(Condition::Field(FilterWhereInfo {
                    field: field.to_string(),
                    operator,
                    data: op_val.clone(),
                }));
            }
            Ok(out)
        } else {
            // Implicit equality: { field: value }
            Ok(vec![Condition::Field(FilterWhereInfo {
                field: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            })])
        }
    }

    fn validate_operator_data(operator: FilterOp, data: &Value) -> Result<(), FilterError> {
        match operator {
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => Ok(()),
                _ => Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
            },
            FilterOp::Exists if !data.is_boolean() => {
                Err(FilterError::InvalidOperatorData("$exists requires a boolean".to_string()))
            }
            FilterOp::Like | FilterOp::ILike if !data.is_string() => {
                Err(FilterError::InvalidOperatorData("$like requires a string pattern".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn build_sql(&mut self, condition: &Condition) -> Result<String, FilterError> {
        match condition {
            Condition::Field(info) => self.build_sql_condition(info),
            Condition::And(children) | Condition::Or(children) => {
                if children.is_empty() {
                    // Empty AND is vacuously true, empty OR matches nothing
                    return Ok(if matches!(condition, Condition::And(_)) { "1=1" } else { "1=0" }.to_string());
                }
                let joiner = if matches!(condition, Condition::And(_)) { " AND " } else { " OR " };
                let parts = children
                    .iter()
                    .map(|child| self.build_sql(child).map(|sql| format!("({})", sql)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(parts.join(joiner))
            }
            Condition::Not(inner) => Ok(format!("NOT ({})", self.build_sql(inner)?)),
        }
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let expr = json_expr(&condition.field);
        let data = &condition.data;
        Ok(match condition.operator {
            FilterOp::Eq => {
                if data.is_null() {
                    format!("({expr} IS NULL OR {expr} = 'null'::jsonb)")
                } else {
                    format!("{} = {}", expr, self.param(data.clone()))
                }
            }
            FilterOp::Ne => {
                if data.is_null() {
                    format!("({expr} IS NOT NULL AND {expr} <> 'null'::jsonb)")
                } else {
                    format!("({expr} IS NULL OR {expr} <> {})", self.param(data.clone()))
                }
            }
            FilterOp::Gt => self.typed_comparison(&expr, ">", data),
            FilterOp::Gte => self.typed_comparison(&expr, ">=", data),
            FilterOp::Lt => self.typed_comparison(&expr, "<", data),
            FilterOp::Lte => self.typed_comparison(&expr, "<=", data),
            FilterOp::Like => format!("{} LIKE ({} #>> '{{}}')", text_expr(&condition.field), self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE ({} #>> '{{}}')", text_expr(&condition.field), self.param(data.clone())),
            FilterOp::In => match data {
                Value::Array(values) if values.is_empty() => "1=0".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    format!("{} IN ({})", expr, params.join(", "))
                }
                _ => format!("{} = {}", expr, self.param(data.clone())),
            },
            FilterOp::NIn => match data {
                Value::Array(values) if values.is_empty() => "1=1".to_string(),
                Value::Array(values) => {
                    let params: Vec<String> = values.iter().map(|v| self.param(v.clone())).collect();
                    format!("({expr} IS NULL OR {expr} NOT IN ({}))", params.join(", "))
                }
                _ => format!("({expr} IS NULL OR {expr} <> {})", self.param(data.clone())),
            },
            FilterOp::Between => {
                let values = data.as_array().filter(|v| v.len() == 2).ok_or_else(|| {
                    FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())
                })?;
                let low = self.param(values[0].clone());
                let high = self.param(values[1].clone());
                format!("(jsonb_typeof({expr}) = jsonb_typeof({low}) AND {expr} BETWEEN {low} AND {high})")
            }
            FilterOp::Exists => {
                if data.as_bool().unwrap_or(true) {
                    format!("{} IS NOT NULL", expr)
                } else {
                    format!("{} IS NULL", expr)
                }
            }
        })
    }

    /// jsonb orders across types; guard so only same-typed values compare
    fn typed_comparison(&mut self, expr: &str, op: &str, data: &Value) -> String {
        let param = self.param(data.clone());
        format!("(jsonb_typeof({expr}) = jsonb_typeof({param}) AND {expr} {op} {param})")
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}::jsonb", self.param_index)
    }
}

/// JSONB expression for a (validated) field name
pub fn json_expr(field: &str) -> String {
    if field == "id" {
        "to_jsonb(\"id\"::text)".to_string()
    } else {
        format!("(\"data\" #> '{{{}}}')", field.replace('.', ","))
    }
}

/// Text expression for a (validated) field name
pub fn text_expr(field: &str) -> String {
    if field == "id" {
        "\"id\"::text".to_string()
    } else {
        format!("(\"data\" #>> '{{{}}}')", field.replace('.', ","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_binds_json_param() {
        let (sql, params) = FilterWhere::generate(&json!({ "firstName": "Jean" }), 1).unwrap();
        assert_eq!(sql, "(\"data\" #> '{firstName}') = $2::jsonb");
        assert_eq!(params, vec![json!("Jean")]);
    }

    #[test]
    fn nested_logical_operators_number_params_in_order() {
        let where_data = json!({
            "$or": [
                { "status": "active" },
                { "age": { "$between": [18, 65] } }
            ]
        });
        let (sql, params) = FilterWhere::generate(&where_data, 1).unwrap();
        assert!(sql.contains("$2::jsonb"));
        assert!(sql.contains("BETWEEN $3::jsonb AND $4::jsonb"));
        assert!(sql.contains(" OR "));
        assert_eq!(params, vec![json!("active"), json!(18), json!(65)]);
    }

    #[test]
    fn dotted_fields_use_json_paths() {
        let (sql, _) = FilterWhere::generate(&json!({ "address.city": { "$ilike": "par%" } }), 0).unwrap();
        assert_eq!(sql, "(\"data\" #>> '{address,city}') ILIKE ($1::jsonb #>> '{}')");
    }

    #[test]
    fn id_field_maps_to_key_column() {
        let (sql, _) = FilterWhere::generate(&json!({ "id": { "$in": ["a", "b"] } }), 1).unwrap();
        assert_eq!(sql, "to_jsonb(\"id\"::text) IN ($2::jsonb, $3::jsonb)");
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = FilterWhere::generate(&json!({ "status": { "$in": [] } }), 0).unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn rejects_unknown_operators_and_bad_fields() {
        assert!(matches!(
            FilterWhere::validate(&json!({ "age": { "$regex": "x" } })),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            FilterWhere::validate(&json!({ "a'b": 1 })),
            Err(FilterError::InvalidField(_))
        ));
        assert!(FilterWhere::validate(&json!("raw sql")).is_err());
        assert!(FilterWhere::validate(&json!({ "age": { "$between": [1] } })).is_err());
    }
}
