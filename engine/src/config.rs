//! Configuration types for the engine and the viewer

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::core::{Camera, Light};
use glam::Vec3;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("asset path {0:?} must be relative and stay inside the asset root")]
    InvalidPath(String),
}

/// Where the viewer's assets live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Root directory for all assets
    pub asset_root: PathBuf,
    /// Geometry text, relative to `asset_root`
    pub geometry: String,
    /// Diffuse texture image, relative to `asset_root`
    pub texture: String,
    /// WGSL vertex stage, relative to `asset_root`; built-in when unset
    pub vertex_shader: Option<String>,
    /// WGSL fragment stage, relative to `asset_root`; built-in when unset
    pub fragment_shader: Option<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            geometry: "mesh/cube.obj".to_string(),
            texture: "mesh/checker.ppm".to_string(),
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

impl AssetConfig {
    /// Reject absolute paths and `..` components
    pub fn validate(&self) -> Result<(), ConfigError> {
        let shaders = [&self.vertex_shader, &self.fragment_shader];
        let paths = [&self.geometry, &self.texture]
            .into_iter()
            .chain(shaders.into_iter().flatten());
        for path in paths {
            let escapes = Path::new(path)
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if path.is_empty() || escapes {
                return Err(ConfigError::InvalidPath(path.clone()));
            }
        }
        Ok(())
    }
}

/// Orthographic view box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrthographicConfig {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Default for OrthographicConfig {
    fn default() -> Self {
        Self {
            width: 16.0,
            height: 10.0,
            depth: 10.0,
        }
    }
}

/// Everything the viewer needs to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub assets: AssetConfig,
    /// Clear color as 8-bit RGB
    pub clear_color: [u8; 3],
    pub orthographic: OrthographicConfig,
    pub camera_position: Vec3,
    /// Camera orbit per frame, in radians
    pub rotation_step: f32,
    pub light_direction: Vec3,
    pub ambient_light: f32,
    /// Stop after this many frames; run forever when unset
    pub frame_limit: Option<u64>,
    pub target_fps: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let light = Light::default();
        Self {
            assets: AssetConfig::default(),
            clear_color: [100, 149, 237],
            orthographic: OrthographicConfig::default(),
            camera_position: Camera::default().position,
            rotation_step: PI / 120.0,
            light_direction: light.direction(),
            ambient_light: light.ambient(),
            frame_limit: None,
            target_fps: 60,
        }
    }
}

impl ViewerConfig {
    /// Load from a JSON file; absent fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.assets.validate()?;
        debug!(path = ?path, "Loaded viewer config");
        Ok(config)
    }

    pub fn camera(&self) -> Camera {
        let OrthographicConfig {
            width,
            height,
            depth,
        } = self.orthographic;
        Camera::orthographic(width, height, depth).with_position(self.camera_position)
    }

    pub fn light(&self) -> Light {
        Light::new(self.light_direction, self.ambient_light)
    }
}
