//! Generator settings.

use millpath_index::{DEFAULT_CUTOFF, DEFAULT_CUTOFF_DISTANCE};
use millpath_math::EPSILON;
use serde::{Deserialize, Serialize};

use crate::{CamError, Result};

/// Deepest drop-probe oversampling accepted by [`GeneratorSettings::validate`].
pub const MAX_OVERSAMPLE_DEPTH: u32 = 16;

/// Settings shared by the drop-cutter and push-cutter generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Lowest allowed cutter height. Defaults to the model's bottom.
    pub minz: Option<f64>,
    /// Height the drop probe starts from. Defaults to the model's top plus
    /// the cutter radius.
    pub maxz: Option<f64>,
    /// Maximum recursion depth of the drop-probe oversampling.
    pub max_depth: u32,
    /// Insert extra probes where neighbouring heights disagree.
    pub oversample: bool,
    /// Size of a dedicated worker pool; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Lines dispatched per parallel batch; `None` uses the pool size.
    pub batch_size: Option<usize>,
    /// Bucket size of the triangle index.
    pub kdtree_cutoff: usize,
    /// Bucket spread of the triangle index.
    pub kdtree_cutoff_distance: f64,
    /// Squared distance under which imported vertices are merged.
    pub weld_tolerance: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            minz: None,
            maxz: None,
            max_depth: 5,
            oversample: true,
            threads: None,
            batch_size: None,
            kdtree_cutoff: DEFAULT_CUTOFF,
            kdtree_cutoff_distance: DEFAULT_CUTOFF_DISTANCE,
            weld_tolerance: EPSILON,
        }
    }
}

impl GeneratorSettings {
    /// Parse and validate settings from TOML. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| CamError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse and validate settings from JSON. Missing keys take defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(text).map_err(|e| CamError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CamError::Config(e.to_string()))
    }

    /// Check all values are in range.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth > MAX_OVERSAMPLE_DEPTH {
            return Err(CamError::InvalidSettings(format!(
                "max_depth {} exceeds {MAX_OVERSAMPLE_DEPTH}",
                self.max_depth
            )));
        }
        if self.kdtree_cutoff == 0 {
            return Err(CamError::InvalidSettings("kdtree_cutoff must be positive".into()));
        }
        if !(self.kdtree_cutoff_distance >= 0.0) {
            return Err(CamError::InvalidSettings(format!(
                "kdtree_cutoff_distance {} must be non-negative",
                self.kdtree_cutoff_distance
            )));
        }
        if !(self.weld_tolerance >= 0.0) || !self.weld_tolerance.is_finite() {
            return Err(CamError::InvalidSettings(format!(
                "weld_tolerance {} must be non-negative",
                self.weld_tolerance
            )));
        }
        if let (Some(minz), Some(maxz)) = (self.minz, self.maxz) {
            if minz > maxz {
                return Err(CamError::InvalidSettings(format!(
                    "minz {minz} is above maxz {maxz}"
                )));
            }
        }
        if self.threads == Some(0) {
            return Err(CamError::InvalidSettings("threads must be positive".into()));
        }
        if self.batch_size == Some(0) {
            return Err(CamError::InvalidSettings("batch_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let settings = GeneratorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.max_depth, 5);
        assert!(settings.oversample);
    }

    #[test]
    fn test_json_roundtrip() {
        let settings = GeneratorSettings {
            minz: Some(-2.0),
            maxz: Some(10.0),
            threads: Some(2),
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back = GeneratorSettings::from_json_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_toml_partial() {
        let settings = GeneratorSettings::from_toml_str("max_depth = 3\noversample = false\n").unwrap();
        assert_eq!(settings.max_depth, 3);
        assert!(!settings.oversample);
        assert_eq!(settings.kdtree_cutoff, DEFAULT_CUTOFF);
        assert!(settings.minz.is_none());
    }

    #[test]
    fn test_toml_roundtrip() {
        let settings = GeneratorSettings {
            minz: Some(1.5),
            batch_size: Some(8),
            ..Default::default()
        };
        let text = settings.to_toml_string().unwrap();
        assert_eq!(GeneratorSettings::from_toml_str(&text).unwrap(), settings);
    }

    #[test]
    fn test_rejects_bad_values() {
        let deep = GeneratorSettings {
            max_depth: 40,
            ..Default::default()
        };
        assert!(matches!(deep.validate(), Err(CamError::InvalidSettings(_))));

        let inverted = GeneratorSettings {
            minz: Some(3.0),
            maxz: Some(1.0),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let zero = GeneratorSettings {
            kdtree_cutoff: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_parse_errors_are_config() {
        assert!(matches!(
            GeneratorSettings::from_toml_str("max_depth = \"deep\""),
            Err(CamError::Config(_))
        ));
        assert!(matches!(
            GeneratorSettings::from_json_str("{"),
            Err(CamError::Config(_))
        ));
    }
}
