use serde_json::Value;

use super::error::FilterError;
use super::filter_where::json_expr;
use super::types::{validate_field_name, FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // Expect array of strings like ["createdAt desc", "name asc"]
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)),
                        other => return Err(FilterError::InvalidOrder(other.to_string())),
                    }
                }
                out
            }
            Value::Object(obj) => {
                // { "createdAt": "desc", "name": "asc" }
                obj.iter()
                    .map(|(k, v)| {
                        let sort = match v.as_str().unwrap_or("asc").to_ascii_lowercase().as_str() {
                            "desc" => SortDirection::Desc,
                            _ => SortDirection::Asc,
                        };
                        FilterOrderInfo { field: k.clone(), sort }
                    })
                    .collect()
            }
            other => return Err(FilterError::InvalidOrder(other.to_string())),
        };

        for info in &infos {
            validate_field_name(&info.field)?;
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        // split on commas, then each token into field and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(field) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                out.push(FilterOrderInfo { field: field.to_string(), sort });
            }
        }
        out
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("{} {}", json_expr(&i.field), i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_array_and_object_forms() {
        let from_string = FilterOrder::validate_and_parse(&json!("lastName, createdAt DESC")).unwrap();
        assert_eq!(from_string.len(), 2);
        assert_eq!(from_string[1].sort, SortDirection::Desc);

        let from_array = FilterOrder::validate_and_parse(&json!(["lastName asc"])).unwrap();
        assert_eq!(from_array[0].field, "lastName");

        let from_object = FilterOrder::validate_and_parse(&json!({ "total": "desc" })).unwrap();
        assert_eq!(from_object[0].sort, SortDirection::Desc);
    }

    #[test]
    fn generates_order_by_on_json_paths() {
        let infos = FilterOrder::validate_and_parse(&json!("lastName desc")).unwrap();
        assert_eq!(FilterOrder::generate(&infos), "ORDER BY (\"data\" #> '{lastName}') DESC");
    }

    #[test]
    fn rejects_injected_field_names() {
        assert!(FilterOrder::validate_and_parse(&json!("name;drop asc")).is_err());
    }

    #[test]
    fn rejects_non_string_entries() {
        assert!(matches!(
            FilterOrder::validate_and_parse(&json!(["name", 3])),
            Err(FilterError::InvalidOrder(_))
        ));
        assert!(FilterOrder::validate_and_parse(&json!(42)).is_err());
    }
}
