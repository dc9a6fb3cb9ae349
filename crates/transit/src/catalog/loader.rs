//! Catalogue loading from JSON.
//!
//! Accepts either a bare array of lines or an object with a `lines` field.

use std::io::Read;

use serde::Deserialize;

use crate::catalog::StaticCatalog;
use crate::models::{Line, Result, TransitError};

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Wrapped { lines: Vec<Line> },
    Bare(Vec<Line>),
}

impl CatalogDocument {
    fn into_lines(self) -> Vec<Line> {
        match self {
            CatalogDocument::Wrapped { lines } | CatalogDocument::Bare(lines) => lines,
        }
    }
}

pub fn from_json_str(json: &str) -> Result<StaticCatalog> {
    let document: CatalogDocument = serde_json::from_str(json)
        .map_err(|e| TransitError::SerializationError(e.to_string()))?;
    build(document)
}

pub fn from_json_reader(reader: impl Read) -> Result<StaticCatalog> {
    let document: CatalogDocument = serde_json::from_reader(reader)
        .map_err(|e| TransitError::SerializationError(e.to_string()))?;
    build(document)
}

fn build(document: CatalogDocument) -> Result<StaticCatalog> {
    StaticCatalog::from_lines(document.into_lines()).inspect_err(|e| {
        tracing::warn!("rejected transit catalogue: {e}");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r##"{
        "lines": [
            {
                "id": "l1",
                "display_number": "1",
                "name": "Centro - Ospedale",
                "color": "#E53935",
                "frequency": { "min_minutes": 10, "max_minutes": 15 },
                "service_window": { "start_minute_of_day": 360, "end_minute_of_day": 1320 },
                "stops": [
                    { "name": "Centro", "coordinate": { "lat": 45.0, "lng": 9.0 } },
                    { "name": "Ospedale", "coordinate": { "lat": 45.01, "lng": 9.01 } }
                ]
            }
        ]
    }"##;

    #[test]
    fn test_load_wrapped_document() {
        let catalog = from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lines()[0].stops[1].name.as_ref(), "Ospedale");
    }

    #[test]
    fn test_load_bare_array() {
        let value: serde_json::Value = serde_json::from_str(CATALOG).unwrap();
        let bare = serde_json::to_string(&value["lines"]).unwrap();

        let catalog = from_json_reader(bare.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            from_json_str("{\"lines\": 3}"),
            Err(TransitError::SerializationError(_))
        ));
    }

    #[test]
    fn test_invalid_line_is_rejected() {
        let broken = CATALOG.replace("\"max_minutes\": 15", "\"max_minutes\": 5");
        assert!(matches!(from_json_str(&broken), Err(TransitError::InvalidData(_))));
    }
}
