//! Selection settings loaded from TOML with override support
//!
//! Values are applied in this order:
//! 1. TOML file (missing keys take their defaults)
//! 2. Environment variables (`SURFING_*`)
//! 3. Explicit key/value overrides
//!
//! ```toml
//! radius = 10.0              # float: millimetres, integer: voxel count
//! distance_metric = "dijkstra"
//! volume_mask = { volume = 2 }
//! source_nodes = [0, 1, 2]
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SurfingError};
use crate::volgeom::MaskSpec;
use crate::voxel_selection::{DistanceMetric, Radius};

/// Environment variable and the setting it overrides
const ENV_OVERRIDES: [(&str, &str); 4] = [
    ("SURFING_RADIUS", "radius"),
    ("SURFING_DISTANCE_METRIC", "distance_metric"),
    ("SURFING_VOLUME_MASK", "volume_mask"),
    ("SURFING_SOURCE_NODES", "source_nodes"),
];

/// Volume mask as written in a configuration file
///
/// `true` keeps voxels non-zero in any volume, `false` disables masking,
/// `{ volume = t }` uses 4D volume `t` and `{ value = v }` keeps voxels equal to `v`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskOption {
    Flag(bool),
    Volume { volume: usize },
    Value { value: i64 },
}

impl Default for MaskOption {
    fn default() -> Self {
        MaskOption::Flag(false)
    }
}

impl MaskOption {
    pub fn to_mask_spec(&self) -> MaskSpec {
        match *self {
            MaskOption::Flag(false) => MaskSpec::None,
            MaskOption::Flag(true) => MaskSpec::NonZero,
            MaskOption::Volume { volume } => MaskSpec::Volume(volume),
            MaskOption::Value { value } => MaskSpec::Value(value),
        }
    }
}

/// Accepts `true`/`false` (also `1`/`0`, `yes`/`no`), `volume:<t>` and `value:<v>`
impl FromStr for MaskOption {
    type Err = SurfingError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let bad = || SurfingError::Config(format!("cannot parse volume mask '{}'", s));
        match s.as_str() {
            "true" | "1" | "yes" => return Ok(MaskOption::Flag(true)),
            "false" | "0" | "no" | "none" => return Ok(MaskOption::Flag(false)),
            _ => {}
        }
        match s.split_once(':') {
            Some(("volume", t)) => Ok(MaskOption::Volume { volume: t.trim().parse().map_err(|_| bad())? }),
            Some(("value", v)) => Ok(MaskOption::Value { value: v.trim().parse().map_err(|_| bad())? }),
            _ => Err(bad()),
        }
    }
}

/// Parameters of a surface-based voxel selection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub radius: Radius,
    pub distance_metric: DistanceMetric,
    pub volume_mask: MaskOption,
    /// Centre nodes; every node when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_nodes: Option<Vec<usize>>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            radius: Radius::Distance(10.0),
            distance_metric: DistanceMetric::Euclidean,
            volume_mask: MaskOption::default(),
            source_nodes: None,
        }
    }
}

impl SelectionConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SelectionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.radius.validate()
    }
}

/// Load a configuration file, then apply environment and explicit overrides
///
/// # Errors
///
/// Fails if the file cannot be read, is not valid TOML, an override cannot be
/// parsed, or the result does not validate.
pub fn load_config(path: &Path, overrides: Option<&HashMap<String, String>>) -> Result<SelectionConfig> {
    let text = fs::read_to_string(path).map_err(|e| SurfingError::io(path, e))?;
    let mut config: SelectionConfig = toml::from_str(&text)?;

    apply_environment_overrides(&mut config)?;
    if let Some(overrides) = overrides {
        apply_overrides(&mut config, overrides)?;
    }

    config.validate()?;
    tracing::debug!(path = %path.display(), ?config, "loaded selection config");
    Ok(config)
}

/// Apply `SURFING_*` environment variables
///
/// - `SURFING_RADIUS` -> `radius`
/// - `SURFING_DISTANCE_METRIC` -> `distance_metric`
/// - `SURFING_VOLUME_MASK` -> `volume_mask`
/// - `SURFING_SOURCE_NODES` -> `source_nodes`
pub fn apply_environment_overrides(config: &mut SelectionConfig) -> Result<()> {
    let mut found = HashMap::new();
    for (var, key) in ENV_OVERRIDES {
        if let Ok(value) = env::var(var) {
            found.insert(key.to_string(), value);
        }
    }
    apply_overrides(config, &found)
}

/// Apply settings given as strings, keyed by field name
///
/// A radius without a decimal point is a voxel count. Source nodes are a
/// comma-separated list, or `all`.
pub fn apply_overrides(config: &mut SelectionConfig, overrides: &HashMap<String, String>) -> Result<()> {
    for (key, value) in overrides {
        match key.as_str() {
            "radius" => config.radius = parse_radius(value)?,
            "distance_metric" => config.distance_metric = value.parse()?,
            "volume_mask" => config.volume_mask = value.parse()?,
            "source_nodes" => config.source_nodes = parse_nodes(value)?,
            other => return Err(SurfingError::Config(format!("unknown setting '{}'", other))),
        }
        tracing::debug!(key = %key, value = %value, "config override");
    }
    Ok(())
}

fn parse_radius(value: &str) -> Result<Radius> {
    let value = value.trim();
    if let Ok(n) = value.parse::<usize>() {
        return Ok(Radius::Count(n));
    }
    value
        .parse::<f64>()
        .map(Radius::Distance)
        .map_err(|_| SurfingError::Config(format!("cannot parse radius '{}'", value)))
}

fn parse_nodes(value: &str) -> Result<Option<Vec<usize>>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    value
        .split(',')
        .map(|tok| {
            tok.trim()
                .parse::<usize>()
                .map_err(|_| SurfingError::Config(format!("cannot parse node id '{}'", tok.trim())))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}
