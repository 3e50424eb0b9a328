// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub shaders: ShaderConfig,
    pub compute: ComputeConfig,
    pub scene: SceneConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "compute shader test".to_string(),
            width: 500,
            height: 500,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub present_mode: String,
    /// Background color, RGB in 0-1 (alpha is always 1)
    pub clear_color: [f32; 3],
    pub max_frames_in_flight: usize,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            present_mode: "fifo".to_string(),
            clear_color: [0.1, 0.1, 0.1],
            max_frames_in_flight: 2,
        }
    }
}

/// Shader source locations
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
    pub compute: PathBuf,
    /// Rebuild the quad program when its sources change on disk
    pub hot_reload: bool,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/quad.vert"),
            fragment: PathBuf::from("shaders/quad.frag"),
            compute: PathBuf::from("shaders/values.comp"),
            hot_reload: true,
        }
    }
}

/// Compute round-trip settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    /// Log the read-back values every frame. Off by default: at the
    /// default FIFO rate this is one info line per frame.
    pub print_values: bool,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 10,
            height: 1,
            print_values: false,
        }
    }
}

/// One square of the demo scene
#[derive(Debug, Clone, Deserialize)]
pub struct SquareConfig {
    /// Top-left corner in NDC
    pub position: [f32; 2],
    /// 8-bit RGB
    pub color: [u32; 3],
    pub size: f32,
}

/// Demo scene drawn every frame
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Horizontal sway, NDC units
    pub sway_amplitude: f32,
    /// Sway angular speed, radians per second
    pub sway_speed: f32,
    pub squares: Vec<SquareConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let square = |y: f32, color: [u32; 3]| SquareConfig {
            position: [0.0, y],
            color,
            size: 0.1,
        };

        Self {
            sway_amplitude: 0.2,
            sway_speed: 2.0,
            squares: vec![
                square(0.0, [255, 0, 0]),
                square(0.5, [0, 255, 0]),
                square(-0.5, [0, 0, 255]),
            ],
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: false,
            log_file: "sandbox.log".to_string(),
            show_fps: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        if config.graphics.max_frames_in_flight == 0 {
            log::warn!("max_frames_in_flight must be at least 1, using 1");
            config.graphics.max_frames_in_flight = 1;
        }
        Ok(config)
    }

    /// Get present mode as Vulkan enum
    pub fn get_present_mode(&self) -> ash::vk::PresentModeKHR {
        match self.graphics.present_mode.to_lowercase().as_str() {
            "immediate" => ash::vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => ash::vk::PresentModeKHR::MAILBOX,
            "fifo" => ash::vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => ash::vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!(
                    "Unknown present mode '{}', defaulting to FIFO",
                    self.graphics.present_mode
                );
                ash::vk::PresentModeKHR::FIFO
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 500);
        assert_eq!(config.window.title, "compute shader test");
        assert_eq!(config.graphics.clear_color, [0.1, 0.1, 0.1]);
        assert_eq!(config.compute.width * config.compute.height, 10);
        assert!(!config.compute.print_values);
        assert_eq!(config.scene.squares.len(), 3);
        assert_eq!(config.scene.squares[1].color, [0, 255, 0]);
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/quad.vert"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [window]
            width = 800

            [compute]
            width = 4
            height = 4
            print_values = true
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 500);
        assert_eq!(config.compute.width, 4);
        assert_eq!(config.compute.height, 4);
        assert!(config.compute.print_values);
        assert!(config.compute.enabled);
    }

    #[test]
    fn scene_squares_replace_defaults() {
        let config = Config::parse(
            r#"
            [scene]
            sway_amplitude = 0.0

            [[scene.squares]]
            position = [-0.9, 0.9]
            color = [255, 255, 255]
            size = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.scene.sway_amplitude, 0.0);
        assert_eq!(config.scene.sway_speed, 2.0);
        assert_eq!(config.scene.squares.len(), 1);
        assert_eq!(config.scene.squares[0].position, [-0.9, 0.9]);
        assert_eq!(config.scene.squares[0].size, 0.25);
    }

    #[test]
    fn zero_frames_in_flight_is_raised() {
        let config = Config::parse("[graphics]\nmax_frames_in_flight = 0\n").unwrap();
        assert_eq!(config.graphics.max_frames_in_flight, 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[window\nwidth = ").is_err());
        assert!(Config::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load_from_path("definitely/not/here.toml").unwrap();
        assert_eq!(config.graphics.max_frames_in_flight, 2);
    }

    #[test]
    fn present_mode_names() {
        let mut config = Config::default();
        assert_eq!(config.get_present_mode(), ash::vk::PresentModeKHR::FIFO);
        config.graphics.present_mode = "Mailbox".to_string();
        assert_eq!(config.get_present_mode(), ash::vk::PresentModeKHR::MAILBOX);
        config.graphics.present_mode = "vsync-please".to_string();
        assert_eq!(config.get_present_mode(), ash::vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml");
        let shipped = Config::load_from_path(path).unwrap();
        let defaults = Config::default();

        assert_eq!(shipped.window.title, defaults.window.title);
        assert_eq!(shipped.graphics.present_mode, defaults.graphics.present_mode);
        assert_eq!(shipped.shaders.compute, defaults.shaders.compute);
        assert_eq!(shipped.scene.squares.len(), defaults.scene.squares.len());
        assert_eq!(shipped.debug.log_file, defaults.debug.log_file);
    }
}
