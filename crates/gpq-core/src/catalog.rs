//! Preset catalog of known GeoParquet sources.
//!
//! The catalog is configuration data, not logic: a table of dataset
//! descriptors keyed by source category, loaded from JSON. Entries carry a
//! literal URL or a `{subtype}` template plus a trust flag that lets
//! first-party sources skip validation. A built-in copy ships with the
//! crate; hosts may load their own.

use std::collections::BTreeMap;

use serde::Deserialize;

const BUILTIN_PRESETS: &str = include_str!("../data/presets.json");

/// One catalog entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetPreset {
    /// Human-readable name for pickers and progress text.
    pub display_name: Option<String>,
    /// Literal dataset URL.
    pub url: Option<String>,
    /// Templated URL with a `{subtype}` placeholder.
    pub url_template: Option<String>,
    /// Landing page describing the dataset.
    pub info_url: Option<String>,
    /// Whether downloads from this source must be validated first.
    /// Absent means yes.
    pub needs_validation: Option<bool>,
}

impl DatasetPreset {
    /// Whether `dataset_url` belongs to this entry: it contains the literal
    /// URL, or the template's fixed prefix (the part before the first `{`).
    #[must_use]
    pub fn matches(&self, dataset_url: &str) -> bool {
        if let Some(url) = &self.url {
            if dataset_url.contains(url.as_str()) {
                return true;
            }
        }
        if let Some(template) = &self.url_template {
            let prefix = template.split('{').next().unwrap_or_default();
            if !prefix.is_empty() && dataset_url.contains(prefix) {
                return true;
            }
        }
        false
    }

    /// The concrete URL for this entry, expanding `{subtype}` if templated.
    #[must_use]
    pub fn resolve_url(&self, subtype: Option<&str>) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        let template = self.url_template.as_ref()?;
        Some(template.replace("{subtype}", subtype.unwrap_or("*")))
    }
}

/// The full preset table: source category -> entry key -> descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    sources: BTreeMap<String, BTreeMap<String, DatasetPreset>>,
}

impl Catalog {
    /// Parse a catalog from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error for malformed documents.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The catalog shipped with the crate.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_PRESETS).expect("built-in presets are valid JSON")
    }

    /// An empty catalog; every URL then requires validation.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sources: BTreeMap::new(),
        }
    }

    /// Whether `dataset_url` requires validation before download.
    ///
    /// The first matching entry decides via its `needs_validation` flag
    /// (true when absent); URLs matching no entry always require validation.
    #[must_use]
    pub fn needs_validation(&self, dataset_url: &str) -> bool {
        for source in self.sources.values() {
            for preset in source.values() {
                if preset.matches(dataset_url) {
                    return preset.needs_validation.unwrap_or(true);
                }
            }
        }
        true
    }

    /// Look up one entry.
    #[must_use]
    pub fn get(&self, source: &str, key: &str) -> Option<&DatasetPreset> {
        self.sources.get(source)?.get(key)
    }

    /// Iterate `(source, key, preset)` in stable order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &DatasetPreset)> {
        self.sources.iter().flat_map(|(source, presets)| {
            presets
                .iter()
                .map(move |(key, preset)| (source.as_str(), key.as_str(), preset))
        })
    }
}

/// The `{subtype}` value for an Overture theme.
///
/// Most themes publish a single type named after the singular theme; the
/// exceptions are fixed by the release layout. `base` needs an explicit
/// layer choice and defaults to `land`.
#[must_use]
pub fn overture_subtype(theme: &str, base_subtype: Option<&str>) -> String {
    match theme {
        "transportation" => "segment".to_string(),
        "divisions" => "division_area".to_string(),
        "addresses" => "*".to_string(),
        "base" => base_subtype.unwrap_or("land").to_string(),
        other => other.trim_end_matches('s').to_string(),
    }
}
