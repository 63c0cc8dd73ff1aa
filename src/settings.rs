//! Per-target appearance settings and where they come from.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::{collections::HashMap, path::Path};

/// How an overlay is positioned and lit for one try-on target.
///
/// Field names also accept the keys of the storefront payload
/// (`positionX`, `reflectionPos`, `shadowOffset`, ...), whose values may
/// arrive as numeric strings such as `"-2"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceSettings {
    /// Horizontal offset of the overlay center, pixels
    #[serde(alias = "positionX", alias = "offsetX", deserialize_with = "number_or_text")]
    pub offset_x: f64,

    /// Vertical offset of the overlay center, pixels
    #[serde(alias = "positionY", alias = "offsetY", deserialize_with = "number_or_text")]
    pub offset_y: f64,

    /// Multiplier on the derived overlay size
    #[serde(alias = "sizeScale", deserialize_with = "number_or_text")]
    pub size_scale: f64,

    /// Vertical offset of the lens highlights, pixels
    #[serde(alias = "reflectionPos", alias = "reflectionOffsetY", deserialize_with = "number_or_text")]
    pub reflection_offset_y: f64,

    /// Multiplier on the lens highlight size
    #[serde(alias = "reflectionSize", alias = "reflectionSizeScale", deserialize_with = "number_or_text")]
    pub reflection_size_scale: f64,

    /// Multiplier on the lens highlight opacity
    #[serde(alias = "reflectionOpacity", alias = "reflectionOpacityScale", deserialize_with = "number_or_text")]
    pub reflection_opacity_scale: f64,

    /// Multiplier on the shadow opacity
    #[serde(alias = "shadowOpacity", alias = "shadowOpacityScale", deserialize_with = "number_or_text")]
    pub shadow_opacity_scale: f64,

    /// Vertical offset of the shadow below the overlay, pixels
    #[serde(alias = "shadowOffset", alias = "shadowOffsetY", deserialize_with = "number_or_text")]
    pub shadow_offset_y: f64,
}

/// Read a number that may be encoded as a string
fn number_or_text<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected a number, got '{text}'"))),
    }
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            offset_x: -2.0,
            offset_y: -4.0,
            size_scale: 0.9,
            reflection_offset_y: 8.0,
            reflection_size_scale: 0.5,
            reflection_opacity_scale: 0.7,
            shadow_opacity_scale: 0.4,
            shadow_offset_y: 10.0,
        }
    }
}

impl AppearanceSettings {
    /// Check that every value is usable for drawing
    ///
    /// # Errors
    ///
    /// Returns an error for non-finite values, a non-positive size scale or
    /// negative reflection/shadow scales.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("offset_x", self.offset_x),
            ("offset_y", self.offset_y),
            ("size_scale", self.size_scale),
            ("reflection_offset_y", self.reflection_offset_y),
            ("reflection_size_scale", self.reflection_size_scale),
            ("reflection_opacity_scale", self.reflection_opacity_scale),
            ("shadow_opacity_scale", self.shadow_opacity_scale),
            ("shadow_offset_y", self.shadow_offset_y),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::ConfigError(format!("Appearance {name} is not finite: {value}")));
        }
        if self.size_scale <= 0.0 {
            return Err(Error::ConfigError("Appearance size_scale must be positive".to_string()));
        }
        for (name, value) in &fields[4..7] {
            if *value < 0.0 {
                return Err(Error::ConfigError(format!("Appearance {name} must be non-negative")));
            }
        }
        Ok(())
    }
}

/// Everything the settings provider knows about one try-on target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Display name for the host UI
    #[serde(default)]
    pub name: String,

    /// Where the overlay image lives
    #[serde(alias = "image_url", alias = "imageUrl")]
    pub overlay_source: String,

    /// Per-target overrides; `None` means use the global defaults
    #[serde(default, alias = "settings")]
    pub appearance: Option<AppearanceSettings>,
}

/// Source of per-target settings
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Fetch the settings for `target_id`
    async fn target(&self, target_id: &str) -> Result<TargetSettings>;
}

/// Settings provider backed by an in-memory map, loadable from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsCatalog {
    targets: HashMap<String, TargetSettings>,
}

impl SettingsCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a target
    pub fn insert(&mut self, target_id: impl Into<String>, settings: TargetSettings) {
        self.targets.insert(target_id.into(), settings);
    }

    /// Load a catalog from a YAML file keyed by target id
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any
    /// target carries invalid appearance values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a catalog from YAML
    ///
    /// # Errors
    ///
    /// See [`SettingsCatalog::from_file`].
    pub fn from_yaml(content: &str) -> Result<Self> {
        let catalog: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse settings catalog: {e}")))?;
        for (id, target) in &catalog.targets {
            if let Some(appearance) = &target.appearance {
                appearance
                    .validate()
                    .map_err(|e| Error::ConfigError(format!("Target '{id}': {e}")))?;
            }
        }
        Ok(catalog)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl SettingsProvider for SettingsCatalog {
    async fn target(&self, target_id: &str) -> Result<TargetSettings> {
        self.targets
            .get(target_id)
            .cloned()
            .ok_or_else(|| Error::SettingsFetch(format!("Unknown try-on target '{target_id}'")))
    }
}
