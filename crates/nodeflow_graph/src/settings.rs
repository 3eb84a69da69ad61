// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings.
//!
//! Stored as RON. Every field has a default, so a settings file only needs to
//! name what it changes:
//!
//! ```ron
//! EditorSettings(
//!     circular_behavior: warn,
//!     max_loops: Some(250),
//! )
//! ```

use crate::evaluation::{ResolveOptions, DEFAULT_MAX_LOOPS};
use crate::ids::{IdGenerator, RandomIds, DEFAULT_ID_LENGTH};
use crate::mutation::{CircularBehavior, MutatorEnv};
use crate::node::DEFAULT_NODE_WIDTH;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "nodeflow.ron";

/// Error loading or saving settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid settings RON
    #[error("Invalid settings file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// Generated IDs would be empty
    #[error("id_length must be at least 1")]
    EmptyIdLength,
}

/// Editor configuration shared by the mutator and the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Format version
    pub version: u32,
    /// Policy for connections that close a cycle
    pub circular_behavior: CircularBehavior,
    /// Connection resolutions allowed per evaluation; `None` is unbounded
    pub max_loops: Option<usize>,
    /// Width of nodes whose type sets none
    pub default_node_width: f32,
    /// Length of generated IDs
    pub id_length: usize,
    /// Evaluate only connected root inputs
    pub only_resolve_connected: bool,
    /// Fire each node at most once per evaluation
    pub memoize: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            circular_behavior: CircularBehavior::default(),
            max_loops: Some(DEFAULT_MAX_LOOPS),
            default_node_width: DEFAULT_NODE_WIDTH,
            id_length: DEFAULT_ID_LENGTH,
            only_resolve_connected: false,
            memoize: false,
        }
    }
}

impl EditorSettings {
    /// Parse settings from RON
    pub fn from_ron_str(content: &str) -> Result<Self, SettingsError> {
        let settings: EditorSettings = ron::from_str(content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }
        if settings.id_length == 0 {
            return Err(SettingsError::EmptyIdLength);
        }

        Ok(settings)
    }

    /// Render settings as pretty RON
    pub fn to_ron_string(&self) -> Result<String, SettingsError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Get the settings file path for a directory
    pub fn settings_file_path(dir: &Path) -> PathBuf {
        dir.join(SETTINGS_FILE_NAME)
    }

    /// Mutator environment configured by these settings
    pub fn mutator_env<'a>(&self, registry: &'a Registry, ids: &'a mut dyn IdGenerator) -> MutatorEnv<'a> {
        MutatorEnv::new(registry, ids)
            .with_circular_behavior(self.circular_behavior)
            .with_default_node_width(self.default_node_width)
    }

    /// Random ID generator producing IDs of the configured length
    pub fn id_generator(&self) -> RandomIds {
        RandomIds::new(self.id_length)
    }

    /// Evaluation options configured by these settings
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default()
            .max_loops(self.max_loops)
            .only_resolve_connected(self.only_resolve_connected)
            .memoize(self.memoize)
    }
}
