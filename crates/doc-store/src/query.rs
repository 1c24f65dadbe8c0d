use std::cmp::Ordering;

use serde_json::Value;

use crate::CollectionPath;

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

/// Ordering on a top-level field.
///
/// Documents without the field are excluded from ordered results.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Position of the last document of a page.
///
/// Ordered results break ties on the document id, ascending, so a cursor
/// carrying the id resumes exactly after that document even when several
/// documents share the ordered value.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub value: Value,
    pub id: Option<String>,
}

impl Cursor {
    /// Returns true if a document with this value and id lies past the
    /// cursor in the given direction.
    fn precedes(&self, value: &Value, id: &str, direction: Direction) -> bool {
        let ord = compare_values(value, &self.value);
        let past = match direction {
            Direction::Ascending => Ordering::Greater,
            Direction::Descending => Ordering::Less,
        };
        if ord == past {
            return true;
        }
        match &self.id {
            Some(last) => ord == Ordering::Equal && id > last.as_str(),
            None => false,
        }
    }
}

/// Builder for collection queries.
///
/// Supports equality filters, ordering on one field, a `start_after`
/// cursor on the ordered field (optionally tie-broken by document id) and a
/// result limit.
#[derive(Debug, Clone)]
pub struct Query {
    /// Collection to scan.
    pub collection: CollectionPath,

    /// All filters must match.
    pub filters: Vec<FieldFilter>,

    /// Optional ordering.
    pub order_by: Option<OrderBy>,

    /// Only return documents past this position.
    pub start_after: Option<Cursor>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates a query over every document in a collection.
    pub fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            start_after: None,
            limit: None,
        }
    }

    /// Adds an equality filter.
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Orders results by a field.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Starts results after every document with the given value of the
    /// ordered field.
    pub fn start_after(mut self, value: impl Into<Value>) -> Self {
        self.start_after = Some(Cursor {
            value: value.into(),
            id: None,
        });
        self
    }

    /// Starts results right after a specific document: later values, plus
    /// documents with the same value and a greater id.
    pub fn start_after_document(
        mut self,
        value: impl Into<Value>,
        id: impl Into<String>,
    ) -> Self {
        self.start_after = Some(Cursor {
            value: value.into(),
            id: Some(id.into()),
        });
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if a document passes every filter and, for ordered
    /// queries, carries the ordered field and lies past the cursor.
    pub fn matches(&self, id: &str, data: &Value) -> bool {
        let filters_match = self
            .filters
            .iter()
            .all(|f| data.get(&f.field).is_some_and(|v| values_equal(v, &f.value)));
        if !filters_match {
            return false;
        }

        let Some(order) = &self.order_by else {
            return true;
        };
        let Some(value) = data.get(&order.field) else {
            return false;
        };
        self.start_after
            .as_ref()
            .is_none_or(|cursor| cursor.precedes(value, id, order.direction))
    }

    /// Compares two document bodies according to the query ordering.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let Some(order) = &self.order_by else {
            return Ordering::Equal;
        };
        let ord = match (a.get(&order.field), b.get(&order.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        match order.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object,
/// numbers compared numerically, strings lexicographically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shops() -> CollectionPath {
        CollectionPath::root("orders")
    }

    #[test]
    fn equality_filters_must_all_match() {
        let query = Query::collection(shops())
            .filter_eq("shopId", "s1")
            .filter_eq("status", "prepare");

        assert!(query.matches("o1", &json!({"shopId": "s1", "status": "prepare"})));
        assert!(!query.matches("o1", &json!({"shopId": "s1", "status": "done"})));
        assert!(!query.matches("o1", &json!({"shopId": "s1"})));
    }

    #[test]
    fn numbers_compare_across_integer_and_float() {
        let query = Query::collection(shops()).filter_eq("total", 100);
        assert!(query.matches("o1", &json!({"total": 100.0})));
    }

    #[test]
    fn ordered_queries_skip_documents_without_the_field() {
        let query = Query::collection(shops()).order_by("movedAt", Direction::Descending);
        assert!(query.matches("o1", &json!({"movedAt": 5})));
        assert!(!query.matches("o1", &json!({"other": 5})));
    }

    #[test]
    fn descending_cursor_keeps_strictly_older_values() {
        let query = Query::collection(shops())
            .order_by("movedAt", Direction::Descending)
            .start_after(200);

        assert!(query.matches("o1", &json!({"movedAt": 199})));
        assert!(!query.matches("o1", &json!({"movedAt": 200})));
        assert!(!query.matches("o1", &json!({"movedAt": 201})));
    }

    #[test]
    fn document_cursor_resumes_within_tied_values() {
        let query = Query::collection(shops())
            .order_by("movedAt", Direction::Descending)
            .start_after_document(1000, "b");

        assert!(query.matches("c", &json!({"movedAt": 1000})));
        assert!(!query.matches("b", &json!({"movedAt": 1000})));
        assert!(!query.matches("a", &json!({"movedAt": 1000})));
        assert!(query.matches("a", &json!({"movedAt": 500})));
        assert!(!query.matches("z", &json!({"movedAt": 2000})));
    }

    #[test]
    fn compare_respects_direction() {
        let asc = Query::collection(shops()).order_by("n", Direction::Ascending);
        let desc = Query::collection(shops()).order_by("n", Direction::Descending);
        let a = json!({"n": 1});
        let b = json!({"n": 2});

        assert_eq!(asc.compare(&a, &b), Ordering::Less);
        assert_eq!(desc.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn value_ordering_by_type_rank() {
        assert_eq!(compare_values(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!("a"), &json!(1)), Ordering::Greater);
        assert_eq!(compare_values(&json!("a"), &json!("b")), Ordering::Less);
    }
}
