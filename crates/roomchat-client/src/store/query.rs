//! Ordered, windowed views over a list node, and child-added tracking.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::{json, Map, Value};

/// Ordering and window applied to a watched node's children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub order_by_child: Option<String>,
    pub limit_to_last: Option<usize>,
}

impl Query {
    /// The whole node, children ordered by key.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn order_by_child(mut self, child: &str) -> Self {
        self.order_by_child = Some(child.to_string());
        self
    }

    pub fn limit_to_last(mut self, limit: usize) -> Self {
        self.limit_to_last = Some(limit);
        self
    }

    pub fn is_default(&self) -> bool {
        self.order_by_child.is_none() && self.limit_to_last.is_none()
    }

    /// Children of `snapshot` in query order, restricted to the window.
    pub fn ordered_children<'a>(&self, snapshot: &'a Value) -> Vec<(&'a String, &'a Value)> {
        let Some(map) = snapshot.as_object() else {
            return Vec::new();
        };
        let mut children: Vec<(&String, &Value)> = map.iter().collect();
        children.sort_by(|(ka, va), (kb, vb)| self.compare(ka, va, kb, vb));
        if let Some(limit) = self.limit_to_last {
            let skip = children.len().saturating_sub(limit);
            children.drain(..skip);
        }
        children
    }

    /// The part of `snapshot` this query can see.
    pub fn apply(&self, snapshot: &Value) -> Value {
        if self.is_default() || !snapshot.is_object() {
            return snapshot.clone();
        }
        let windowed: Map<String, Value> = self
            .ordered_children(snapshot)
            .into_iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if windowed.is_empty() {
            Value::Null
        } else {
            Value::Object(windowed)
        }
    }

    /// Query parameters in realtime wire form (`i` index, `l` limit, `vf` view-from).
    pub fn to_wire(&self) -> Value {
        let mut params = Map::new();
        if let Some(child) = &self.order_by_child {
            params.insert("i".into(), json!(child));
        }
        if let Some(limit) = self.limit_to_last {
            params.insert("l".into(), json!(limit));
            params.insert("vf".into(), json!("r"));
        }
        Value::Object(params)
    }

    fn compare(&self, ka: &str, va: &Value, kb: &str, vb: &Value) -> Ordering {
        match &self.order_by_child {
            Some(child) => compare_values(va.get(child), vb.get(child)).then_with(|| ka.cmp(kb)),
            None => ka.cmp(kb),
        }
    }
}

/// Rank of a child value: missing/null, false, true, numbers, strings, objects.
fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(false)) => 1,
        Some(Value::Bool(true)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    })
}

/// A child that appeared in a watched list.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildAdded {
    pub key: String,
    pub value: Value,
}

/// Turns successive snapshots of a list into child-added notifications.
#[derive(Debug, Default)]
pub struct ChildTracker {
    query: Query,
    known: HashSet<String>,
}

impl ChildTracker {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            known: HashSet::new(),
        }
    }

    /// Children present in `snapshot` but not in the previous one, in
    /// query order.
    pub fn added(&mut self, snapshot: &Value) -> Vec<ChildAdded> {
        let children = self.query.ordered_children(snapshot);
        let added = children
            .iter()
            .filter(|(k, _)| !self.known.contains(*k))
            .map(|(k, v)| ChildAdded {
                key: (*k).clone(),
                value: (*v).clone(),
            })
            .collect();
        self.known = children.into_iter().map(|(k, _)| k.clone()).collect();
        added
    }
}
