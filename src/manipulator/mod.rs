//! The transform engine contract.
//!
//! A [`Manipulator`] turns raw source bytes plus a [`ParameterMap`] into
//! transformed bytes. The gateway only cares about two failure classes:
//! [`ManipulateError::UnsupportedFormat`] (soft, the original bytes are
//! served) and everything else (hard, 422).
//!
//! [`NativeManipulator`] is the production implementation; see
//! [`native`] for the parameters it understands.

mod calculations;
pub mod native;

use crate::encoder::EncodeError;
use bytes::Bytes;
use std::collections::BTreeMap;
use thiserror::Error;

pub use native::{NativeManipulator, OutputLimits};

#[derive(Error, Debug)]
pub enum ManipulateError {
    #[error("unknown image format")]
    UnsupportedFormat,
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("invalid value {value:?} for parameter {name:?}")]
    InvalidParam { name: String, value: String },
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ManipulateError {
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, ManipulateError::UnsupportedFormat)
    }
}

/// Transform parameters keyed by name. Keys are unique and values are never
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ParameterMap(BTreeMap<String, String>);

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded query pairs. The first occurrence of a key decides
    /// its value; a key whose first value is empty is dropped.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut seen = std::collections::HashSet::new();
        let mut map = BTreeMap::new();
        for (key, value) in pairs {
            let key = key.into();
            if !seen.insert(key.clone()) {
                continue;
            }
            let value = value.into();
            if !value.is_empty() {
                map.insert(key, value);
            }
        }
        Self(map)
    }

    /// Insert a parameter. Empty values are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.0.insert(key.into(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fill in any key missing from `self` with the value from `defaults`.
    pub fn with_defaults(mut self, defaults: &ParameterMap) -> Self {
        for (k, v) in defaults.iter() {
            self.0.entry(k.to_string()).or_insert_with(|| v.to_string());
        }
        self
    }
}

/// Input to a single [`Manipulator::process`] call. Immutable once built.
#[derive(Debug, Clone)]
pub struct ManipulationRequest {
    image_data: Bytes,
    params: ParameterMap,
}

impl ManipulationRequest {
    pub fn builder() -> ManipulationRequestBuilder {
        ManipulationRequestBuilder::default()
    }

    pub fn image_data(&self) -> &Bytes {
        &self.image_data
    }

    pub fn params(&self) -> &ParameterMap {
        &self.params
    }
}

#[derive(Debug, Default)]
pub struct ManipulationRequestBuilder {
    image_data: Bytes,
    params: ParameterMap,
}

impl ManipulationRequestBuilder {
    pub fn image_data(mut self, data: impl Into<Bytes>) -> Self {
        self.image_data = data.into();
        self
    }

    pub fn params(mut self, params: ParameterMap) -> Self {
        self.params = params;
        self
    }

    pub fn build(self) -> ManipulationRequest {
        ManipulationRequest {
            image_data: self.image_data,
            params: self.params,
        }
    }
}

/// Image transform engine.
///
/// Implementations are called from many request workers at once and must
/// not rely on per-call mutable state.
pub trait Manipulator: Send + Sync {
    /// Whether parameters are applied even when a request carries none.
    fn has_default_params(&self) -> bool;

    fn process(&self, request: ManipulationRequest) -> Result<Vec<u8>, ManipulateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_drop_empty_values() {
        let params = ParameterMap::from_query_pairs([("w", "100"), ("h", ""), ("fit", "crop")]);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("w"), Some("100"));
        assert_eq!(params.get("h"), None);
    }

    #[test]
    fn query_pairs_first_value_wins() {
        let params = ParameterMap::from_query_pairs([("w", "1"), ("w", "2")]);
        assert_eq!(params.get("w"), Some("1"));

        // An empty first value drops the key even if a later one is set.
        let params = ParameterMap::from_query_pairs([("w", ""), ("w", "2")]);
        assert!(params.is_empty());
    }

    #[test]
    fn insert_ignores_empty() {
        let mut params = ParameterMap::new();
        params.insert("w", "");
        params.insert("h", "5");
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("h", "5")]);
    }

    #[test]
    fn defaults_fill_missing_keys_only() {
        let mut defaults = ParameterMap::new();
        defaults.insert("auto", "compress");
        defaults.insert("w", "10");
        let params = ParameterMap::from_query_pairs([("w", "300")]).with_defaults(&defaults);
        assert_eq!(params.get("w"), Some("300"));
        assert_eq!(params.get("auto"), Some("compress"));
    }

    #[test]
    fn builder_assembles_request() {
        let request = ManipulationRequest::builder()
            .image_data(vec![1u8, 2, 3])
            .params(ParameterMap::from_query_pairs([("w", "5")]))
            .build();
        assert_eq!(request.image_data().as_ref(), &[1, 2, 3]);
        assert_eq!(request.params().get("w"), Some("5"));
    }

    #[test]
    fn only_unsupported_format_is_soft() {
        assert!(ManipulateError::UnsupportedFormat.is_unsupported_format());
        assert!(
            !ManipulateError::InvalidParam {
                name: "w".into(),
                value: "-1".into()
            }
            .is_unsupported_format()
        );
        assert!(!ManipulateError::Encode(EncodeError::UnsupportedFormat).is_unsupported_format());
    }
}
