//! Extended `application/x-www-form-urlencoded` decoding.
//!
//! Bracketed keys build nested values: `user[name]=a` becomes an object,
//! `tags[]=a&tags[]=b` an array. A plain key repeated collects into an array.
//! Nesting stops at [`MAX_DEPTH`] brackets; anything deeper stays one literal
//! key segment.

use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::errors::ApiError;

/// Bracket segments expanded into nested values.
pub const MAX_DEPTH: usize = 5;

/// Pairs accepted in one body.
pub const MAX_PARAMETERS: usize = 1000;

pub fn decode(body: &[u8]) -> Result<Value, ApiError> {
    let mut root = Map::new();
    for (index, (key, value)) in form_urlencoded::parse(body).enumerate() {
        if index == MAX_PARAMETERS {
            return Err(ApiError::payload_too_large(format!(
                "Too many form parameters (limit {})",
                MAX_PARAMETERS
            )));
        }
        let path = key_path(&key);
        insert(&mut root, &path, Value::String(value.into_owned()))?;
    }
    Ok(Value::Object(root))
}

/// Split `a[b][]` into `["a", "b", ""]`. Keys that are not well-formed bracket
/// paths are kept whole. Past [`MAX_DEPTH`] segments the remaining brackets
/// form one final segment, so `a[1][2][3][4][5][6][7]` ends in `"[6][7]"`.
fn key_path(key: &str) -> Vec<&str> {
    match key.find('[') {
        Some(open) if open > 0 && key.len() > open + 1 && key.ends_with(']') => {
            let head = &key[..open];
            let inner_start = open + 1;
            let inner = &key[inner_start..key.len() - 1];

            let mut path = vec![head];
            let mut segments = inner.splitn(MAX_DEPTH + 1, "][");
            path.extend(segments.by_ref().take(MAX_DEPTH));
            if let Some(rest) = segments.next() {
                // `rest` is a suffix of `inner`; step back over its opening bracket.
                let rest_start = inner_start + inner.len() - rest.len();
                path.push(&key[rest_start - 1..]);
            }
            path
        }
        _ => vec![key],
    }
}

fn container_for(segment: &str) -> Value {
    if segment.is_empty() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn conflict(segment: &str) -> ApiError {
    ApiError::bad_request(format!(
        "Malformed form body: conflicting values for '{}'",
        segment
    ))
}

fn insert(map: &mut Map<String, Value>, path: &[&str], value: Value) -> Result<(), ApiError> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(());
    };

    if rest.is_empty() {
        match map.get_mut(*head) {
            None => {
                map.insert((*head).to_string(), value);
            }
            Some(Value::Array(items)) => items.push(value),
            Some(existing @ Value::String(_)) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
            Some(_) => return Err(conflict(head)),
        }
        return Ok(());
    }

    let child = map
        .entry((*head).to_string())
        .or_insert_with(|| container_for(rest[0]));
    insert_into(child, rest, value).map_err(|_| conflict(head))
}

fn insert_into(target: &mut Value, path: &[&str], value: Value) -> Result<(), ApiError> {
    match (target, path) {
        (Value::Object(map), _) => insert(map, path, value),
        (Value::Array(items), [""]) => {
            items.push(value);
            Ok(())
        }
        (Value::Array(items), ["", rest @ ..]) => {
            let mut child = container_for(rest[0]);
            insert_into(&mut child, rest, value)?;
            items.push(child);
            Ok(())
        }
        (_, path) => Err(conflict(path.first().copied().unwrap_or_default())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn flat_pairs_decode_to_strings() {
        let value = decode(b"email=a%40example.com&password=p+w").unwrap();
        assert_eq!(value, json!({ "email": "a@example.com", "password": "p w" }));
    }

    #[test]
    fn brackets_build_nested_objects() {
        let value = decode(b"user[name]=Ada&user[address][city]=London").unwrap();
        assert_eq!(
            value,
            json!({ "user": { "name": "Ada", "address": { "city": "London" } } })
        );
    }

    #[test]
    fn empty_brackets_build_arrays() {
        let value = decode(b"tags[]=a&tags[]=b&user[roles][]=admin").unwrap();
        assert_eq!(
            value,
            json!({ "tags": ["a", "b"], "user": { "roles": ["admin"] } })
        );
    }

    #[test]
    fn repeated_plain_keys_collect() {
        let value = decode(b"id=1&id=2&id=3").unwrap();
        assert_eq!(value, json!({ "id": ["1", "2", "3"] }));
    }

    #[test]
    fn malformed_brackets_stay_literal() {
        let value = decode(b"a[b=1&[c]=2").unwrap();
        assert_eq!(value, json!({ "a[b": "1", "[c]": "2" }));
    }

    #[test]
    fn scalar_then_object_is_rejected() {
        let err = decode(b"user=Ada&user[name]=Ada").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
    }

    #[test]
    fn nesting_past_max_depth_stays_literal() {
        let value = decode(b"a[1][2][3][4][5][6][7]=x").unwrap();
        assert_eq!(
            value,
            json!({ "a": { "1": { "2": { "3": { "4": { "5": { "[6][7]": "x" } } } } } } })
        );
    }

    #[test]
    fn megabyte_bracket_key_does_not_recurse() {
        let body = format!("a{}=1", "[]".repeat(500_000));
        let value = decode(body.as_bytes()).unwrap();

        let mut node = &value["a"];
        for _ in 0..MAX_DEPTH - 1 {
            assert_eq!(node.as_array().map(Vec::len), Some(1));
            node = &node[0];
        }
        let tail = "[]".repeat(500_000 - MAX_DEPTH);
        assert_eq!(node, &json!([{ (tail): "1" }]));
    }

    #[test]
    fn too_many_parameters_is_payload_too_large() {
        let body = (0..=MAX_PARAMETERS)
            .map(|i| format!("k{}=v", i))
            .collect::<Vec<_>>()
            .join("&");
        let err = decode(body.as_bytes()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PayloadTooLarge);

        let body = (0..MAX_PARAMETERS)
            .map(|i| format!("k{}=v", i))
            .collect::<Vec<_>>()
            .join("&");
        assert!(decode(body.as_bytes()).is_ok());
    }

    #[test]
    fn empty_body_is_empty_object() {
        assert_eq!(decode(b"").unwrap(), json!({}));
    }
}
