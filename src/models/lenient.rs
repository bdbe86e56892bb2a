//! Forgiving deserializers for upstream payloads whose shape drifts.

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

/// Accepts any JSON value and keeps it only if it is an array.
pub(crate) fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Like [`lenient_list`], but decodes each element and drops the ones that
/// do not fit `T`.
pub(crate) fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(lenient_list(deserializer)?
        .into_iter()
        .filter_map(|item| T::deserialize(item).ok())
        .collect())
}

/// `null` decodes as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
