//! Chromatic-shift transform catalog.
//!
//! Calibration produces one 4×4 affine per ordered channel pair, stored as a
//! JSON file: `{"transforms": [{"channels": [src, ref], "parameters": [16
//! floats]}, ...]}`. Parameters reshape row-major into the matrix. Channel
//! names in the catalog and in spot tables come from different tools, so a
//! fixed alias table reconciles them before lookup.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array2;
use serde::Deserialize;

use crate::error::{Result, SpotfishError};

#[derive(Deserialize)]
struct CatalogFile {
    transforms: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct CatalogEntry {
    channels: [String; 2],
    parameters: Vec<f64>,
}

/// How a channel name was reconciled against the alias table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AliasResolution {
    /// No alias entry; the name is used as-is.
    Unaliased(String),
    /// The name was rewritten through the alias table.
    Aliased { original: String, resolved: String },
}

impl AliasResolution {
    pub fn resolved(&self) -> &str {
        match self {
            AliasResolution::Unaliased(name) => name,
            AliasResolution::Aliased { resolved, .. } => resolved,
        }
    }
}

/// Catalog of per-channel-pair affine transforms.
#[derive(Clone, Debug, Default)]
pub struct TransformCatalog {
    transforms: HashMap<(String, String), Array2<f64>>,
    aliases: HashMap<String, String>,
}

impl TransformCatalog {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self {
            transforms: HashMap::new(),
            aliases,
        }
    }

    /// Alias table for CSU-W1 spinning-disk channel names, whose separators
    /// differ between the calibration tool and the acquisition software.
    pub fn default_aliases() -> HashMap<String, String> {
        [
            ("405 CSU-W1", "405-CSU-W1"),
            ("488 CSU-W1", "488-CSU-W1"),
            ("561 CSU-W1", "561 CSU-W1"),
            ("640 CSU-W1", "640 CSU-W1"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
    }

    /// Load a catalog file, applying `aliases` to every channel name.
    pub fn load(path: &Path, aliases: HashMap<String, String>) -> Result<Self> {
        let file: CatalogFile = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        let mut catalog = Self::new(aliases);

        for entry in file.transforms {
            if entry.parameters.len() != 16 {
                return Err(SpotfishError::Config(format!(
                    "transform for channels {:?} has {} parameters, expected 16",
                    entry.channels,
                    entry.parameters.len()
                )));
            }
            let matrix = Array2::from_shape_vec((4, 4), entry.parameters)
                .expect("16 parameters reshape to 4x4");
            let [source, reference] = entry.channels;
            catalog.insert(&source, &reference, matrix);
        }
        Ok(catalog)
    }

    /// Register a transform mapping `source` into `reference` coordinates.
    /// Both names go through the alias table first.
    pub fn insert(&mut self, source: &str, reference: &str, matrix: Array2<f64>) {
        assert_eq!(matrix.dim(), (4, 4), "transform must be 4x4");
        let key = (
            self.resolve_alias(source).resolved().to_string(),
            self.resolve_alias(reference).resolved().to_string(),
        );
        self.transforms.insert(key, matrix);
    }

    pub fn resolve_alias(&self, channel: &str) -> AliasResolution {
        match self.aliases.get(channel) {
            Some(resolved) => AliasResolution::Aliased {
                original: channel.to_string(),
                resolved: resolved.clone(),
            },
            None => AliasResolution::Unaliased(channel.to_string()),
        }
    }

    /// Transform mapping `channel` into the `reference` channel's frame.
    /// Missing entries are a hard error; there is no identity fallback.
    pub fn get(&self, channel: &str, reference: &str) -> Result<&Array2<f64>> {
        let key = (
            self.resolve_alias(channel).resolved().to_string(),
            self.resolve_alias(reference).resolved().to_string(),
        );
        self.transforms
            .get(&key)
            .ok_or_else(|| SpotfishError::TransformMissing {
                channel: key.0.clone(),
                reference: key.1.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}
