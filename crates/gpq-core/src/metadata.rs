//! GeoParquet "geo" file metadata.
//!
//! GeoParquet 1.1 files may declare a bounding-box covering in their
//! key/value metadata: a JSON document under the key `geo` whose
//! `columns.<name>.covering.bbox` object names the struct column holding a
//! per-row bbox. Only the subset of the document needed for that lookup is
//! modeled; everything else is ignored.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GeoMetadata {
    #[serde(default)]
    columns: HashMap<String, GeoColumnMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeoColumnMetadata {
    #[serde(default)]
    covering: Option<Covering>,
}

/// The `covering` object; `bbox` is its only supported encoding.
#[derive(Debug, Deserialize)]
struct Covering {
    #[serde(default)]
    bbox: Option<BboxCovering>,
}

/// Bounding-box covering: each field is a schema path, `["column", "xmin"]`.
#[derive(Debug, Deserialize)]
struct BboxCovering {
    #[serde(default)]
    xmin: Vec<String>,
}

/// Resolve the bbox covering column named by a raw `geo` metadata document.
///
/// Follows `columns.geometry.covering.bbox.xmin[0]` and strips any
/// surrounding quotes from the result. Returns `None` on any decode or
/// structural failure; callers fall back to a geometry-intersection filter.
#[must_use]
pub fn bbox_column_from_geo_json(raw: &str) -> Option<String> {
    let parsed: GeoMetadata = serde_json::from_str(raw).ok()?;
    let column = parsed
        .columns
        .get("geometry")?
        .covering
        .as_ref()?
        .bbox
        .as_ref()?
        .xmin
        .first()?;
    Some(column.trim_matches('"').to_string())
}
