//! Property projection policy applied when materializing entities.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::value::Properties;

/// Selects which properties of an entity a read materializes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "propertyKeys", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyProjection {
    /// Every stored property plus the derived `_added_at`.
    All,
    /// No properties at all.
    #[serde(rename = "NONE")]
    Nothing,
    /// Only the listed keys. Never empty; see [`PropertyProjection::with_properties`].
    Partial(BTreeSet<String>),
}

impl Default for PropertyProjection {
    fn default() -> Self {
        PropertyProjection::All
    }
}

impl PropertyProjection {
    /// Projection returning every property.
    pub fn all() -> Self {
        PropertyProjection::All
    }

    /// Projection returning no properties.
    pub fn none() -> Self {
        PropertyProjection::Nothing
    }

    /// Projection returning only `keys`. An empty key set normalizes to
    /// [`PropertyProjection::Nothing`].
    pub fn with_properties<K, I>(keys: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = K>,
    {
        let keys: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            PropertyProjection::Nothing
        } else {
            PropertyProjection::Partial(keys)
        }
    }

    /// Requested keys of a partial projection.
    ///
    /// # Panics
    /// Panics unless this is [`PropertyProjection::Partial`].
    pub fn property_keys(&self) -> &BTreeSet<String> {
        match self {
            PropertyProjection::Partial(keys) => keys,
            other => panic!("property_keys called on {other:?} projection"),
        }
    }

    /// Returns whether `key` is selected by this projection.
    pub fn includes(&self, key: &str) -> bool {
        match self {
            PropertyProjection::All => true,
            PropertyProjection::Nothing => false,
            PropertyProjection::Partial(keys) => keys.contains(key),
        }
    }

    /// Widens the projection with `extra` keys.
    pub fn merge(&self, extra: &BTreeSet<String>) -> Self {
        match self {
            PropertyProjection::All => PropertyProjection::All,
            PropertyProjection::Nothing => Self::with_properties(extra.iter().cloned()),
            PropertyProjection::Partial(keys) => {
                let mut merged = keys.clone();
                merged.extend(extra.iter().cloned());
                PropertyProjection::Partial(merged)
            }
        }
    }

    /// Trims `props` down to the selected keys. Requested keys missing from
    /// `props` are omitted, never inserted as null.
    pub fn filter(&self, mut props: Properties) -> Properties {
        match self {
            PropertyProjection::All => props,
            PropertyProjection::Nothing => {
                if props.is_empty() {
                    props
                } else {
                    Properties::new()
                }
            }
            PropertyProjection::Partial(keys) => {
                if props.len() == keys.len() && props.keys().all(|k| keys.contains(k)) {
                    return props;
                }
                props.retain(|k, _| keys.contains(k));
                props
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::value::{properties, Value};

    fn sample() -> Properties {
        properties([("k", Value::Int(1)), ("j", Value::Int(2))])
    }

    #[test]
    fn all_keeps_everything() {
        assert_eq!(PropertyProjection::all().filter(sample()), sample());
    }

    #[test]
    fn none_drops_everything() {
        assert!(PropertyProjection::none().filter(sample()).is_empty());
        assert!(PropertyProjection::none().filter(Properties::new()).is_empty());
    }

    #[test]
    fn partial_keeps_requested_keys_only() {
        let projection = PropertyProjection::with_properties(["k", "missing"]);
        assert_eq!(
            projection.filter(sample()),
            properties([("k", Value::Int(1))])
        );
        let exact = PropertyProjection::with_properties(["k", "j"]);
        assert_eq!(exact.filter(sample()), sample());
    }

    #[test]
    fn empty_key_set_normalizes_to_nothing() {
        assert_eq!(
            PropertyProjection::with_properties(Vec::<String>::new()),
            PropertyProjection::Nothing
        );
    }

    #[test]
    fn merge_widens() {
        let extra: BTreeSet<String> = ["a".to_string()].into_iter().collect();
        assert_eq!(PropertyProjection::All.merge(&extra), PropertyProjection::All);
        assert_eq!(
            PropertyProjection::Nothing.merge(&extra),
            PropertyProjection::with_properties(["a"])
        );
        assert_eq!(
            PropertyProjection::Nothing.merge(&BTreeSet::new()),
            PropertyProjection::Nothing
        );
        assert_eq!(
            PropertyProjection::with_properties(["b"]).merge(&extra),
            PropertyProjection::with_properties(["a", "b"])
        );
    }

    #[test]
    #[should_panic(expected = "property_keys called on")]
    fn property_keys_requires_partial() {
        PropertyProjection::All.property_keys();
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&PropertyProjection::with_properties(["a"])).unwrap();
        assert_eq!(json, r#"{"type":"PARTIAL","propertyKeys":["a"]}"#);
        let all: PropertyProjection = serde_json::from_str(r#"{"type":"ALL"}"#).unwrap();
        assert_eq!(all, PropertyProjection::All);
        let none: PropertyProjection = serde_json::from_str(r#"{"type":"NONE"}"#).unwrap();
        assert_eq!(none, PropertyProjection::Nothing);
    }
}
