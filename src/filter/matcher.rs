//! In-process evaluation of the where/order/limit language, used by backends
//! that hold documents in memory. Semantics follow the SQL generator: mixed-type
//! comparisons never match, and missing fields sort after present ones.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{Condition, FilterWhere};
use super::types::{FilterData, FilterOp, FilterOrderInfo, FilterWhereInfo, SortDirection};

pub struct DocumentQuery {
    condition: Condition,
    order: Vec<FilterOrderInfo>,
    select: Option<Vec<String>>,
    limit: Option<usize>,
    offset: usize,
}

impl DocumentQuery {
    pub fn from_filter(data: &FilterData, max_limit: Option<i32>) -> Result<Self, FilterError> {
        let condition = match data.where_clause {
            Some(ref where_data) => FilterWhere::parse(where_data)?,
            None => Condition::And(vec![]),
        };
        let order = match data.order {
            Some(ref order) => FilterOrder::validate_and_parse(order)?,
            None => vec![],
        };
        if matches!(data.limit, Some(l) if l < 0) {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if matches!(data.offset, Some(o) if o < 0) {
            return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
        }
        // The cap bounds an explicit limit; no limit means every matching document
        let limit = match (data.limit, max_limit) {
            (Some(l), Some(max)) => Some(l.min(max)),
            (l, _) => l,
        };
        let select = data
            .select
            .clone()
            .filter(|fields| !fields.is_empty() && !fields.iter().any(|f| f == "*"));

        Ok(Self {
            condition,
            order,
            select,
            limit: limit.map(|l| l as usize),
            offset: data.offset.unwrap_or(0) as usize,
        })
    }

    pub fn matches(&self, id: &str, data: &Map<String, Value>) -> bool {
        eval(&self.condition, id, data)
    }

    /// Filter, sort, page and project a document set
    pub fn apply<'a, I>(&self, documents: I) -> Vec<(String, Map<String, Value>)>
    where
        I: IntoIterator<Item = (&'a str, &'a Map<String, Value>)>,
    {
        let mut matched: Vec<(&str, &Map<String, Value>)> = documents
            .into_iter()
            .filter(|(id, data)| self.matches(id, data))
            .collect();

        if !self.order.is_empty() {
            // Stable sort keeps insertion order for ties
            matched.sort_by(|a, b| {
                for info in &self.order {
                    let ordering = compare_for_sort(
                        resolve(a.0, a.1, &info.field).as_ref(),
                        resolve(b.0, b.1, &info.field).as_ref(),
                        info.sort,
                    );
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|(id, data)| (id.to_string(), self.project(id, data)))
            .collect()
    }

    fn project(&self, id: &str, data: &Map<String, Value>) -> Map<String, Value> {
        match self.select {
            None => data.clone(),
            Some(ref fields) => fields
                .iter()
                .filter(|f| f.as_str() != "id")
                .filter_map(|f| match resolve(id, data, f) {
                    Some(Value::Null) | None => None,
                    Some(value) => Some((f.clone(), value)),
                })
                .collect(),
        }
    }
}

fn eval(condition: &Condition, id: &str, data: &Map<String, Value>) -> bool {
    match condition {
        Condition::Field(info) => eval_field(info, resolve(id, data, &info.field).as_ref()),
        Condition::And(children) => children.iter().all(|c| eval(c, id, data)),
        Condition::Or(children) => children.iter().any(|c| eval(c, id, data)),
        Condition::Not(inner) => !eval(inner, id, data),
    }
}

fn eval_field(info: &FilterWhereInfo, actual: Option<&Value>) -> bool {
    let expected = &info.data;
    match info.operator {
        FilterOp::Eq => is_equal(actual, expected),
        FilterOp::Ne => !is_equal(actual, expected),
        FilterOp::Gt => compare_same_type(actual, expected) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare_same_type(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare_same_type(actual, expected) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare_same_type(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like => like(actual, expected, false),
        FilterOp::ILike => like(actual, expected, true),
        FilterOp::In => match expected {
            Value::Array(values) => actual.is_some() && values.iter().any(|v| is_equal(actual, v)),
            other => is_equal(actual, other),
        },
        FilterOp::NIn => match expected {
            Value::Array(values) => !values.iter().any(|v| actual.is_some() && is_equal(actual, v)),
            other => !is_equal(actual, other),
        },
        FilterOp::Between => match expected.as_array().map(Vec::as_slice) {
            Some([low, high]) => {
                matches!(compare_same_type(actual, low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare_same_type(actual, high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
        FilterOp::Exists => actual.is_some() == expected.as_bool().unwrap_or(true),
    }
}

/// Resolve a dotted field path; `id` resolves to the document key
fn resolve(id: &str, data: &Map<String, Value>, field: &str) -> Option<Value> {
    if field == "id" {
        return Some(Value::String(id.to_string()));
    }
    let mut parts = field.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current.clone())
}

fn is_equal(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) | (Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Some(a), b) => a == b,
    }
}

fn compare_same_type(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (actual?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// jsonb type ordering: null < string < number < boolean < array < object
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    let ordering = match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_same_type(Some(a), b)
            .unwrap_or_else(|| type_rank(a).cmp(&type_rank(b))),
    };
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn like(actual: Option<&Value>, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(Value::String(text)), Value::String(pattern)) = (actual, pattern) else {
        return false;
    };
    if case_insensitive {
        like_match(&text.to_lowercase().chars().collect::<Vec<_>>(), &pattern.to_lowercase().chars().collect::<Vec<_>>())
    } else {
        like_match(&text.chars().collect::<Vec<_>>(), &pattern.chars().collect::<Vec<_>>())
    }
}

enum LikeToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

fn tokenize_like(pattern: &[char]) -> Vec<LikeToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.iter();
    while let Some(&c) = chars.next() {
        let token = match c {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            '\\' => LikeToken::Literal(chars.next().copied().unwrap_or('\\')),
            other => LikeToken::Literal(other),
        };
        tokens.push(token);
    }
    tokens
}

/// SQL LIKE: `%` matches any run, `_` a single character, `\` escapes.
/// Greedy with a single backtrack point, so O(text × pattern).
fn like_match(text: &[char], pattern: &[char]) -> bool {
    let tokens = tokenize_like(pattern);
    let (mut t, mut p) = (0, 0);
    // Token after the last `%` seen, and the text position it is retried from
    let mut resume: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnyRun) => {
                p += 1;
                resume = Some((p, t));
                continue;
            }
            Some(LikeToken::AnyOne) => {
                t += 1;
                p += 1;
                continue;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
                continue;
            }
            _ => {}
        }
        match resume {
            Some((after_run, from)) => {
                p = after_run;
                t = from + 1;
                resume = Some((after_run, from + 1));
            }
            None => return false,
        }
    }

    tokens[p..].iter().all(|token| matches!(token, LikeToken::AnyRun))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn query(where_data: Value) -> DocumentQuery {
        DocumentQuery::from_filter(
            &FilterData { where_clause: Some(where_data), ..Default::default() },
            None,
        )
        .unwrap()
    }

    #[test]
    fn evaluates_comparison_operators() {
        let employee = doc(json!({ "firstName": "Jean", "age": 42, "address": { "city": "Lyon" } }));
        assert!(query(json!({ "firstName": "Jean" })).matches("e1", &employee));
        assert!(query(json!({ "age": { "$gte": 42, "$lt": 50 } })).matches("e1", &employee));
        assert!(query(json!({ "age": 42.0 })).matches("e1", &employee));
        assert!(!query(json!({ "age": { "$gt": "40" } })).matches("e1", &employee));
        assert!(query(json!({ "address.city": { "$ilike": "ly%" } })).matches("e1", &employee));
        assert!(query(json!({ "id": "e1" })).matches("e1", &employee));
        assert!(query(json!({ "manager": null })).matches("e1", &employee));
        assert!(query(json!({ "manager": { "$exists": false } })).matches("e1", &employee));
        assert!(query(json!({ "status": { "$nin": ["fired"] } })).matches("e1", &employee));
        assert!(!query(json!({ "status": { "$in": ["active"] } })).matches("e1", &employee));
    }

    #[test]
    fn evaluates_logical_operators() {
        let employee = doc(json!({ "department": "garage", "age": 30 }));
        assert!(query(json!({ "$or": [{ "department": "hr" }, { "age": { "$between": [25, 35] } }] })).matches("e", &employee));
        assert!(!query(json!({ "$not": { "department": "garage" } })).matches("e", &employee));
        assert!(!query(json!({ "$or": [] })).matches("e", &employee));
        assert!(query(json!({ "$and": [] })).matches("e", &employee));
    }

    #[test]
    fn sorts_pages_and_projects() {
        let a = doc(json!({ "name": "b", "rank": 2 }));
        let b = doc(json!({ "name": "a", "rank": 1 }));
        let c = doc(json!({ "name": "c" }));
        let q = DocumentQuery::from_filter(
            &FilterData {
                select: Some(vec!["name".to_string()]),
                order: Some(json!("rank asc")),
                limit: Some(2),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        let out = q.apply(vec![("a", &a), ("b", &b), ("c", &c)]);
        let ids: Vec<&str> = out.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(out[0].1, doc(json!({ "name": "a" })));
    }

    #[test]
    fn max_limit_caps_only_explicit_limits() {
        let docs: Vec<Map<String, Value>> = (0..5).map(|i| doc(json!({ "n": i }))).collect();
        let ids: Vec<String> = (0..5).map(|i| format!("d{}", i)).collect();
        let pairs = || ids.iter().map(String::as_str).zip(docs.iter());

        let unbounded = DocumentQuery::from_filter(&FilterData::default(), Some(3)).unwrap();
        assert_eq!(unbounded.apply(pairs()).len(), 5);

        let capped = DocumentQuery::from_filter(
            &FilterData { limit: Some(10), ..Default::default() },
            Some(3),
        )
        .unwrap();
        assert_eq!(capped.apply(pairs()).len(), 3);
    }

    #[test]
    fn like_patterns() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert!(like_match(&chars("Dupont"), &chars("D%t")));
        assert!(like_match(&chars("Dupont"), &chars("_upon_")));
        assert!(!like_match(&chars("Dupont"), &chars("D_t")));
        assert!(like_match(&chars("50%"), &chars("50\\%")));
        assert!(!like_match(&chars("500"), &chars("50\\%")));
        assert!(like_match(&chars(""), &chars("%%")));
        assert!(!like_match(&chars(""), &chars("_")));
        assert!(like_match(&chars("abcabd"), &chars("%abd")));
        assert!(like_match(&chars("a_b"), &chars("a\\_b")));
        assert!(!like_match(&chars("axb"), &chars("a\\_b")));
    }

    #[test]
    fn many_wildcards_do_not_blow_up() {
        let text: Vec<char> = "a".repeat(40).chars().collect();
        let pattern: Vec<char> = format!("{}b", "%a".repeat(16)).chars().collect();
        let started = std::time::Instant::now();
        assert!(!like_match(&text, &pattern));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));

        let pattern: Vec<char> = format!("{}a", "%a".repeat(16)).chars().collect();
        assert!(like_match(&text, &pattern));
    }
}
