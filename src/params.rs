use serde::{
    Deserialize,
    de::{DeserializeOwned, Deserializer},
};

use crate::error::{ComposeError, ComposeResult};

/// A request value that is either given once for every join or per join.
///
/// Normalize it once with [`OneOrMany::normalize`] and work with the resulting `Vec` downstream.
#[derive(Clone, Debug, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    /// Broadcast to exactly `target_len` items.
    ///
    /// Scalars are replicated, short lists repeat their last element, long lists are truncated.
    /// An empty list is a shape error whatever the target length.
    pub fn normalize(&self, target_len: usize) -> ComposeResult<Vec<T>> {
        match self {
            Self::One(v) => Ok(vec![v.clone(); target_len]),
            Self::Many(items) => {
                let Some(last) = items.last() else {
                    return Err(ComposeError::shape(format!(
                        "cannot broadcast an empty list to {target_len} items"
                    )));
                };
                let mut out: Vec<T> = items.iter().take(target_len).cloned().collect();
                out.resize(target_len, last.clone());
                Ok(out)
            }
        }
    }
}

impl From<String> for OneOrMany<String> {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<f64> for OneOrMany<f64> {
    fn from(value: f64) -> Self {
        Self::One(value)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values)
    }
}

impl<T: DeserializeOwned> TryFrom<serde_json::Value> for OneOrMany<T> {
    type Error = ComposeError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::String(_) | Value::Number(_) => serde_json::from_value(value.clone())
                .map(Self::One)
                .map_err(|e| ComposeError::shape(format!("unexpected scalar {value}: {e}"))),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(_) | Value::Number(_) => serde_json::from_value(item.clone())
                        .map_err(|e| {
                            ComposeError::shape(format!("unexpected list item {i} ({item}): {e}"))
                        }),
                    other => Err(ComposeError::shape(format!(
                        "list item {i} must be a string or number, got {other}"
                    ))),
                })
                .collect::<ComposeResult<Vec<T>>>()
                .map(Self::Many),
            other => Err(ComposeError::shape(format!(
                "expected a scalar or a list, got {other}"
            ))),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}
