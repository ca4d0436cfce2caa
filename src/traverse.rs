use serde_json::{Map, Value};

use crate::error::Result;

/// Rebuild `value` with `redact` applied to every string leaf.
///
/// Object keys, numbers, booleans and null are carried over unchanged. Leaves
/// are visited depth-first in document order, so token numbering follows the
/// order the strings appear in.
pub fn redact_value<F>(value: &Value, redact: &mut F) -> Result<Value>
where
    F: FnMut(&str) -> Result<String>,
{
    Ok(match value {
        Value::String(s) => Value::String(redact(s)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_value(item, redact))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(fields) => {
            let mut out = Map::with_capacity(fields.len());
            for (key, field) in fields {
                out.insert(key.clone(), redact_value(field, redact)?);
            }
            Value::Object(out)
        }
        other => other.clone(),
    })
}
