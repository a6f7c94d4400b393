use serde_json::{json, Value};
use std::io::Read;

use crate::cli::OutputFormat;
use crate::filter::{Constraint, SortDirection};
use crate::notify::{NotificationKind, Notifier};

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            match data {
                Some(Value::Object(fields)) => {
                    if let Some(body) = response.as_object_mut() {
                        body.extend(fields);
                    }
                }
                Some(other) => response["data"] = other,
                None => {}
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(data) = data {
                println!("{}", serde_json::to_string_pretty(&data)?);
            }
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: []
            }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Notifications printed to stderr so stdout stays parseable
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    output_format: OutputFormat,
}

impl ConsoleNotifier {
    pub fn new(output_format: OutputFormat) -> Self {
        Self { output_format }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match self.output_format {
            OutputFormat::Json => {
                eprintln!("{}", json!({ "notification": kind, "message": message }));
            }
            OutputFormat::Text => match kind {
                NotificationKind::Success => eprintln!("✓ {}", message),
                NotificationKind::Warning => eprintln!("Warning: {}", message),
                NotificationKind::Error => eprintln!("Error: {}", message),
            },
        }
    }
}

/// Read a JSON document from stdin
pub fn read_stdin_json() -> anyhow::Result<Value> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    if buffer.trim().is_empty() {
        anyhow::bail!("expected JSON on stdin");
    }
    Ok(serde_json::from_str(&buffer)?)
}

/// Parse a `--filter` argument.
///
/// Accepts either a constraint list (`[{"type":"limit","count":5}]`) or the
/// object form `{"where":{..},"order":"name asc","limit":5,"offset":0,"select":[..]}`.
pub fn parse_filter(raw: Option<&str>) -> anyhow::Result<Vec<Constraint>> {
    let Some(raw) = raw else {
        return Ok(vec![]);
    };
    match serde_json::from_str::<Value>(raw)? {
        list @ Value::Array(_) => Ok(serde_json::from_value(list)?),
        Value::Object(filter) => {
            let mut constraints = Vec::new();
            if let Some(condition) = filter.get("where") {
                constraints.push(Constraint::where_clause(condition.clone()));
            }
            if let Some(order) = filter.get("order") {
                constraints.extend(parse_order(order)?);
            }
            if let Some(limit) = filter.get("limit") {
                constraints.push(Constraint::limit(as_count("limit", limit)?));
            }
            if let Some(offset) = filter.get("offset") {
                constraints.push(Constraint::offset(as_count("offset", offset)?));
            }
            if let Some(select) = filter.get("select") {
                let fields: Vec<String> = serde_json::from_value(select.clone())?;
                constraints.push(Constraint::select(fields));
            }
            Ok(constraints)
        }
        other => anyhow::bail!("filter must be a JSON object or array, got {}", other),
    }
}

fn parse_order(order: &Value) -> anyhow::Result<Vec<Constraint>> {
    let specs: Vec<String> = match order {
        Value::String(spec) => vec![spec.clone()],
        other => serde_json::from_value(other.clone())?,
    };
    specs
        .iter()
        .map(|spec| {
            let mut parts = spec.split_whitespace();
            let field = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("empty order entry"))?;
            let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => SortDirection::Asc,
                Some("desc") => SortDirection::Desc,
                Some(other) => anyhow::bail!("invalid sort direction '{}'", other),
            };
            Ok(Constraint::order_by(field, direction))
        })
        .collect()
}

fn as_count(name: &str, value: &Value) -> anyhow::Result<i32> {
    value
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| anyhow::anyhow!("{} must be an integer", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_filter() {
        let constraints = parse_filter(Some(
            r#"{"where":{"status":"active"},"order":["name","price desc"],"limit":5}"#,
        ))
        .unwrap();
        assert_eq!(
            constraints,
            vec![
                Constraint::where_clause(json!({ "status": "active" })),
                Constraint::order_by("name", SortDirection::Asc),
                Constraint::order_by("price", SortDirection::Desc),
                Constraint::limit(5),
            ]
        );
    }

    #[test]
    fn parses_constraint_list() {
        let constraints = parse_filter(Some(r#"[{"type":"limit","count":3}]"#)).unwrap();
        assert_eq!(constraints, vec![Constraint::limit(3)]);
        assert!(parse_filter(None).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_filters() {
        assert!(parse_filter(Some("42")).is_err());
        assert!(parse_filter(Some(r#"{"order":"name sideways"}"#)).is_err());
        assert!(parse_filter(Some(r#"{"limit":"ten"}"#)).is_err());
    }
}
