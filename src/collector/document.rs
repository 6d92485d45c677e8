//! JMX dump parsing
//!
//! The Hadoop /jmx servlet returns a JSON object with one top-level
//! `beans` array. [`BeanDocument`] validates that shape once and hands
//! out [`Bean`] views with strictly typed attribute access.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{MappingError, ResolutionError};

/// A parsed JMX dump
#[derive(Debug)]
pub struct BeanDocument {
    beans: Vec<Bean>,
}

impl BeanDocument {
    /// Parse a raw response body into a bean document
    ///
    /// # Errors
    /// - `ResolutionError::InvalidJson` if the body is not JSON
    /// - `ResolutionError::MissingBeans` if there is no top-level `beans` array
    pub fn parse(raw: &[u8]) -> Result<Self, ResolutionError> {
        let value: Value = serde_json::from_slice(raw).map_err(ResolutionError::InvalidJson)?;
        let beans = value
            .get("beans")
            .and_then(Value::as_array)
            .ok_or(ResolutionError::MissingBeans)?;

        Ok(Self {
            beans: beans.iter().cloned().map(Bean).collect(),
        })
    }

    /// The beans in document order
    pub fn beans(&self) -> &[Bean] {
        &self.beans
    }
}

/// One MBean entry of a dump
#[derive(Debug, Clone)]
pub struct Bean(Value);

impl Bean {
    /// The bean's `name` attribute, when present and textual
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// The bean's `modelerType` attribute, when present and textual
    pub fn modeler_type(&self) -> Option<&str> {
        self.0.get("modelerType").and_then(Value::as_str)
    }

    /// Read a numeric attribute
    ///
    /// # Errors
    /// - `MappingError::MissingField` when the attribute is absent
    /// - `MappingError::WrongType` when it is not a number
    pub fn number(&self, attribute: &str) -> Result<f64, MappingError> {
        match self.0.get(attribute) {
            None => Err(MappingError::MissingField {
                attribute: attribute.to_string(),
            }),
            Some(value) => value.as_f64().ok_or_else(|| MappingError::WrongType {
                attribute: attribute.to_string(),
            }),
        }
    }

    /// Decode the whole bean into a typed structure
    ///
    /// Unknown attributes are ignored; missing or mistyped expected ones
    /// fail the decode.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, MappingError> {
        T::deserialize(&self.0).map_err(|e| MappingError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_parse_rejects_invalid_json() {
        let err = BeanDocument::parse(b"not json").unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidJson(_)));
    }

    #[test]
    fn test_parse_rejects_missing_beans() {
        let err = BeanDocument::parse(br#"{"other": []}"#).unwrap_err();
        assert!(matches!(err, ResolutionError::MissingBeans));

        let err = BeanDocument::parse(br#"[1, 2, 3]"#).unwrap_err();
        assert!(matches!(err, ResolutionError::MissingBeans));
    }

    #[test]
    fn test_parse_empty_beans_is_valid() {
        let doc = BeanDocument::parse(br#"{"beans": []}"#).unwrap();
        assert!(doc.beans().is_empty());
    }

    #[test]
    fn test_number_access_is_strict() {
        let doc =
            BeanDocument::parse(br#"{"beans": [{"name": "x", "Good": 3, "Bad": "3"}]}"#).unwrap();
        let bean = &doc.beans()[0];

        assert_eq!(bean.number("Good").unwrap(), 3.0);
        assert!(matches!(
            bean.number("Bad"),
            Err(MappingError::WrongType { .. })
        ));
        assert!(matches!(
            bean.number("Absent"),
            Err(MappingError::MissingField { .. })
        ));
    }

    #[test]
    fn test_typed_decode() {
        #[derive(Debug, Deserialize)]
        struct Fixture {
            #[serde(rename = "MissingBlocks")]
            missing_blocks: f64,
        }

        let doc = BeanDocument::parse(
            br#"{"beans": [{"name": "x", "MissingBlocks": 3, "Extra": "ignored"}]}"#,
        )
        .unwrap();

        let fixture: Fixture = doc.beans()[0].decode().unwrap();
        assert_eq!(fixture.missing_blocks, 3.0);

        let doc = BeanDocument::parse(br#"{"beans": [{"name": "x"}]}"#).unwrap();
        let err = doc.beans()[0].decode::<Fixture>().unwrap_err();
        assert!(matches!(err, MappingError::Decode(_)));
    }
}
