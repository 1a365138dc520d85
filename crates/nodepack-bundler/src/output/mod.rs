//! Build result types.

pub mod writer;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Serialize, Serializer};

use crate::Result;
use crate::sourcemap::SourceMap;

/// An auxiliary output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub source: Vec<u8>,
    /// Unix mode bits to write the file with, when a loader recorded any.
    pub permissions: Option<u32>,
}

impl Asset {
    pub fn new(source: impl Into<Vec<u8>>) -> Self {
        Self {
            source: source.into(),
            permissions: None,
        }
    }
}

/// Relative output path → asset, in sorted path order.
pub type AssetMap = BTreeMap<String, Asset>;

/// Finalized output of one compilation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    /// Primary bundle code.
    pub code: String,
    #[serde(serialize_with = "serialize_source_map")]
    pub source_map: Option<SourceMap>,
    /// Every file other than the primary bundle and its map.
    pub assets: AssetMap,
}

impl BuildResult {
    /// Write the bundle, its map, and all assets under `dir`.
    ///
    /// `filename` is the primary output name the build was configured with.
    /// Existing files are overwritten.
    pub fn write_to(&self, dir: impl AsRef<Path>, filename: &str) -> Result<()> {
        writer::write_result_to(self, dir.as_ref(), filename)
    }
}

/// Serialize the map as the v3 JSON document, not as a string.
fn serialize_source_map<S: Serializer>(
    map: &Option<SourceMap>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match map {
        Some(map) => {
            let document: serde_json::Value = serde_json::from_str(&map.to_json_string())
                .map_err(serde::ser::Error::custom)?;
            document.serialize(serializer)
        }
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap;

    #[test]
    fn test_result_serializes_map_as_document() {
        let result = BuildResult {
            code: "x".to_string(),
            source_map: Some(
                sourcemap::parse(br#"{"version":3,"sources":["a.js"],"names":[],"mappings":"AAAA"}"#)
                    .unwrap(),
            ),
            assets: AssetMap::new(),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["sourceMap"]["mappings"], "AAAA");
        assert_eq!(value["sourceMap"]["sources"][0], "a.js");
        assert!(value["assets"].as_object().unwrap().is_empty());
    }
}
