//! `application/x-www-form-urlencoded` bodies decoded into JSON.
//!
//! Follows the bracket conventions web frameworks use for form bodies:
//!
//! ```text
//! tag=a&tag=b        {"tag": ["a", "b"]}
//! user[name]=ada     {"user": {"name": "ada"}}
//! ids[]=1&ids[]=2    {"ids": ["1", "2"]}
//! ```
//!
//! Unlike [`parse_query`](crate::event::parse_query), repeated keys are
//! never joined, so a value containing `,` stays distinguishable.

use serde_json::{Map, Value};

/// Nesting deeper than this is kept as a literal key.
const MAX_DEPTH: usize = 5;

pub fn parse_form(raw: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let path = key_path(&key);
        let Some((head, rest)) = path.split_first() else {
            continue;
        };
        let value = nest(rest, Value::String(value.into_owned()));
        match fields.get_mut(*head) {
            Some(existing) => merge(existing, value),
            None => {
                fields.insert(head.to_string(), value);
            }
        }
    }
    fields
}

/// `a[b][]` → `["a", "b", ""]`. Keys that do not follow the bracket
/// shape are returned whole.
fn key_path(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[').filter(|&open| open > 0) else {
        return vec![key];
    };

    let mut path = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return vec![key];
        };
        if path.len() > MAX_DEPTH {
            return vec![key];
        }
        path.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if rest.is_empty() { path } else { vec![key] }
}

fn nest(path: &[&str], leaf: Value) -> Value {
    match path.split_first() {
        None => leaf,
        Some((&"", rest)) => Value::Array(vec![nest(rest, leaf)]),
        Some((segment, rest)) => {
            let mut map = Map::new();
            map.insert(segment.to_string(), nest(rest, leaf));
            Value::Object(map)
        }
    }
}

fn merge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(items), Value::Array(more)) => items.extend(more),
        (Value::Array(items), value) => items.push(value),
        (slot, incoming) => {
            let first = slot.take();
            let mut items = vec![first];
            match incoming {
                Value::Array(more) => items.extend(more),
                value => items.push(value),
            }
            *slot = Value::Array(items);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(raw: &str) -> Value {
        Value::Object(parse_form(raw))
    }

    #[test]
    fn flat_fields() {
        assert_eq!(form("name=Ada+L&lang=en"), json!({"name": "Ada L", "lang": "en"}));
    }

    #[test]
    fn repeated_keys_become_arrays() {
        assert_eq!(
            form("tag=a&tag=b&tag=c%2Cd"),
            json!({"tag": ["a", "b", "c,d"]})
        );
    }

    #[test]
    fn single_value_with_comma_stays_a_string() {
        assert_eq!(form("tag=a%2Cb"), json!({"tag": "a,b"}));
    }

    #[test]
    fn brackets_nest() {
        assert_eq!(
            form("user[name]=ada&user[langs][]=en&user[langs][]=fr"),
            json!({"user": {"name": "ada", "langs": ["en", "fr"]}})
        );
    }

    #[test]
    fn plain_and_bracketed_array_keys_combine() {
        assert_eq!(form("id=1&id[]=2"), json!({"id": ["1", "2"]}));
    }

    #[test]
    fn malformed_brackets_are_literal_keys() {
        assert_eq!(form("a[b=1&[c]=2"), json!({"a[b": "1", "[c]": "2"}));
        assert_eq!(form("a[b]x=1"), json!({"a[b]x": "1"}));
    }

    #[test]
    fn field_order_is_kept() {
        let keys: Vec<String> = parse_form("z=1&a=2&m=3").keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
