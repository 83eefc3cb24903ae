//! Hierarchical key paths and JSON tree helpers.
//!
//! The store is one JSON tree. Writing `null` deletes a node, and a node
//! whose children are all gone stops existing.

use std::fmt;

use serde_json::{Map, Value};

/// A `/`-separated location in the store tree. The root has no segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `rooms/lobby/messages`; empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(StorePath::parse(segment).segments);
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, if any.
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True when `self` equals `other` or contains it.
    pub fn contains(&self, other: &StorePath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// `other` expressed relative to `self`, when `self` contains it.
    pub fn relative(&self, other: &StorePath) -> Option<StorePath> {
        self.contains(other).then(|| StorePath {
            segments: other.segments[self.segments.len()..].to_vec(),
        })
    }

    /// Wire form with a leading slash, as the realtime protocol expects.
    pub fn to_wire(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Node at `path` under `root`, if present.
pub fn value_at<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    (!node.is_null()).then_some(node)
}

/// Replace the node at `path` under `root` with `value`.
///
/// Intermediate objects are created as needed; writing `null` removes the
/// node and prunes parents left empty.
pub fn set_at(root: &mut Value, path: &StorePath, value: Value) {
    set_segments(root, path.segments(), value);
}

fn set_segments(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = normalize(value);
        return;
    };

    if value.is_null() && !node.is_object() {
        return;
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        let value = normalize(value);
        if value.is_null() {
            map.remove(head);
        } else {
            map.insert(head.clone(), value);
        }
    } else {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_segments(child, rest, value);
        if child.is_null() {
            map.remove(head);
        }
    }

    if map.is_empty() {
        *node = Value::Null;
    }
}

/// Drop null children and empty objects, recursively.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if cleaned.is_empty() {
                Value::Null
            } else {
                Value::Object(cleaned)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_and_display() {
        let path = StorePath::parse("/rooms//lobby/messages/");
        assert_eq!(path.segments(), ["rooms", "lobby", "messages"]);
        assert_eq!(path.to_string(), "rooms/lobby/messages");
        assert_eq!(path.to_wire(), "/rooms/lobby/messages");
        assert_eq!(StorePath::root().to_wire(), "/");
    }

    #[test]
    fn child_accepts_nested_segments() {
        let path = StorePath::parse("rooms").child("lobby/presence");
        assert_eq!(path.to_string(), "rooms/lobby/presence");
        assert_eq!(path.key(), Some("presence"));
    }

    #[test]
    fn containment_and_relative() {
        let room = StorePath::parse("rooms/lobby");
        let entry = StorePath::parse("rooms/lobby/presence/u1");
        assert!(room.contains(&entry));
        assert!(room.contains(&room));
        assert!(!entry.contains(&room));
        assert!(!room.contains(&StorePath::parse("rooms/lobby2")));
        assert_eq!(
            room.relative(&entry).unwrap().to_string(),
            "presence/u1"
        );
        assert!(entry.relative(&room).is_none());
    }

    #[test]
    fn set_creates_intermediate_nodes() {
        let mut root = Value::Null;
        set_at(&mut root, &StorePath::parse("rooms/lobby/metadata"), json!({"name": "lobby"}));
        assert_eq!(root, json!({"rooms": {"lobby": {"metadata": {"name": "lobby"}}}}));
        assert_eq!(
            value_at(&root, &StorePath::parse("rooms/lobby/metadata/name")),
            Some(&json!("lobby"))
        );
    }

    #[test]
    fn setting_null_prunes_empty_parents() {
        let mut root = json!({"rooms": {"r": {"presence": {"u1": {"online": true}}, "metadata": {"name": "r"}}}});
        set_at(&mut root, &StorePath::parse("rooms/r/presence/u1"), Value::Null);
        assert_eq!(root, json!({"rooms": {"r": {"metadata": {"name": "r"}}}}));

        set_at(&mut root, &StorePath::parse("rooms/r/metadata"), Value::Null);
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn removing_missing_node_is_noop() {
        let mut root = json!({"a": 1});
        set_at(&mut root, &StorePath::parse("b/c"), Value::Null);
        assert_eq!(root, json!({"a": 1}));
    }

    #[test]
    fn set_at_root_replaces_everything() {
        let mut root = json!({"a": 1});
        set_at(&mut root, &StorePath::root(), json!({"b": {"c": null}, "d": 2}));
        assert_eq!(root, json!({"d": 2}));
    }

    #[test]
    fn value_at_missing_is_none() {
        let root = json!({"a": {"b": 1}});
        assert!(value_at(&root, &StorePath::parse("a/c")).is_none());
        assert!(value_at(&root, &StorePath::parse("a/b/c")).is_none());
        assert!(value_at(&Value::Null, &StorePath::root()).is_none());
    }
}
