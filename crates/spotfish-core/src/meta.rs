//! Acquisition metadata sidecar (`acquisition_info.json`).
//!
//! The sidecar nests three sections (`experiment`, `preparation`,
//! `acquisition`) whose keys flatten to dotted column names. The
//! `acquisition.channels` list defines the channel-index ↔ channel-name
//! mapping used to join metadata onto spot rows by numeric channel;
//! list-valued keys explode to one value per channel.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;

use crate::error::{Result, SpotfishError};
use crate::spot::SpotTable;

const SECTIONS: [&str; 3] = ["experiment", "preparation", "acquisition"];
const CHANNELS_KEY: &str = "acquisition.channels";

/// Flattened acquisition metadata, one value row per channel index.
#[derive(Clone, Debug)]
pub struct AcquisitionInfo {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&format!("{prefix}.{key}"), child, out);
            }
        }
        other => out.push((prefix.to_string(), other.clone())),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl AcquisitionInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let root: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Self::from_value(&root)
    }

    pub fn from_value(root: &Value) -> Result<Self> {
        let mut flat: Vec<(String, Value)> = Vec::new();
        for section in SECTIONS {
            if let Some(value) = root.get(section) {
                flatten(section, value, &mut flat);
            }
        }

        let channels: Vec<String> = flat
            .iter()
            .find(|(key, _)| key == CHANNELS_KEY)
            .and_then(|(_, v)| v.as_array())
            .map(|list| list.iter().map(stringify).collect())
            .ok_or_else(|| SpotfishError::MetadataKey(CHANNELS_KEY.to_string()))?;

        let columns: Vec<String> = flat.iter().map(|(key, _)| key.clone()).collect();
        let mut rows = Vec::with_capacity(channels.len());
        for index in 0..channels.len() {
            let row = flat
                .iter()
                .map(|(key, value)| {
                    if key == CHANNELS_KEY {
                        // Channel names become the numeric index spot rows carry.
                        return index.to_string();
                    }
                    match value {
                        Value::Array(list) => {
                            list.get(index).map(stringify).unwrap_or_default()
                        }
                        scalar => stringify(scalar),
                    }
                })
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn channel_count(&self) -> usize {
        self.rows.len()
    }

    /// Left-join metadata onto spot rows by numeric channel. Spots whose
    /// channel does not parse or is out of range get empty metadata cells.
    /// Metadata columns already present in the table are skipped.
    pub fn annotate(&self, table: &SpotTable, channel_column: &str) -> Result<SpotTable> {
        let channel_col = table.require_column(channel_column)?;

        let added: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| table.column_index(name).is_none())
            .map(|(i, _)| i)
            .collect();

        let mut out = SpotTable::new(
            table
                .columns()
                .iter()
                .cloned()
                .chain(added.iter().map(|&i| self.columns[i].clone()))
                .collect(),
        );

        for row in table.rows() {
            let channel = row[channel_col].trim().parse::<usize>().ok();
            let meta = channel.and_then(|c| self.rows.get(c));
            let mut cells = row.clone();
            match meta {
                Some(values) => cells.extend(added.iter().map(|&i| values[i].clone())),
                None => cells.extend(added.iter().map(|_| String::new())),
            }
            out.push_row(cells);
        }
        Ok(out)
    }
}
