use std::path::PathBuf;

use log::LevelFilter;

pub const TITLE: &str = "RS SHADOW";
pub const WIDTH: u32 = 1200;
pub const HEIGHT: u32 = 800;

pub const SHADOW_MAP_SIZE: u32 = 2048;
pub const SHADOW_BIAS: f32 = 0.005;

#[derive(Debug, Clone)]
pub struct LightConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub color: [f32; 3],
    /// Half width/height of the orthographic shadow volume.
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Vertical field of view, degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub uncapped_fps: bool,
    pub clear_colour: [f32; 4],

    pub shadow_map_size: u32,
    pub shadow_bias: f32,
    pub ambient_strength: f32,
    pub specular_strength: f32,

    pub light: LightConfig,
    pub camera: CameraConfig,

    pub model_path: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl Default for LightConfig {
    fn default() -> Self {
        LightConfig {
            position: [5.0, 8.0, 5.0],
            target: [0.0, 0.0, 0.0],
            color: [1.0, 1.0, 1.0],
            half_extent: 15.0,
            near: 1.0,
            far: 30.0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            position: [3.0, 2.0, 3.0],
            target: [0.0, 0.0, 0.0],
            fov: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            title: TITLE.to_string(),
            width: WIDTH,
            height: HEIGHT,
            uncapped_fps: true,
            clear_colour: [0.1, 0.1, 0.1, 1.0],
            shadow_map_size: SHADOW_MAP_SIZE,
            shadow_bias: SHADOW_BIAS,
            ambient_strength: 0.1,
            specular_strength: 0.5,
            light: LightConfig::default(),
            camera: CameraConfig::default(),
            model_path: None,
            log_level: LevelFilter::Info,
        }
    }
}

impl DemoConfig {
    ///
    /// Build a config from command line arguments (without the program name).
    /// Bad values keep their defaults. The logger is configured from the result,
    /// so complaints about the arguments are handed back for logging afterwards.
    ///
    pub fn from_args<I>(args: I) -> (DemoConfig, Vec<String>)
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = DemoConfig::default();
        let mut warnings = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--vsync" => config.uncapped_fps = false,
                "--verbose" => config.log_level = LevelFilter::Debug,
                "--shadow-size" => match args.next().map(|v| v.parse::<u32>()) {
                    Some(Ok(size)) if size > 0 => config.shadow_map_size = size,
                    _ => warnings.push("--shadow-size expects a positive integer".to_string()),
                },
                "--bias" => match args.next().map(|v| v.parse::<f32>()) {
                    Some(Ok(bias)) if bias >= 0.0 => config.shadow_bias = bias,
                    _ => warnings.push("--bias expects a non-negative number".to_string()),
                },
                flag if flag.starts_with("--") => warnings.push(format!("Ignoring unknown flag {flag}")),
                path => config.model_path = Some(PathBuf::from(path)),
            }
        }

        (config, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_demo_scene() {
        let config = DemoConfig::default();
        assert_eq!(config.shadow_map_size, 2048);
        assert_eq!(config.shadow_bias, 0.005);
        assert_eq!(config.light.position, [5.0, 8.0, 5.0]);
        assert_eq!(config.light.half_extent, 15.0);
        assert_eq!((config.light.near, config.light.far), (1.0, 30.0));
        assert!(config.model_path.is_none());
        assert_eq!(config.camera.position, [3.0, 2.0, 3.0]);
        assert_eq!(config.camera.target, [0.0, 0.0, 0.0]);
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn parses_flags_and_model_path() {
        let (config, warnings) = DemoConfig::from_args(args(&[
            "truck.obj",
            "--shadow-size",
            "1024",
            "--bias",
            "0.01",
            "--vsync",
        ]));
        assert_eq!(config.model_path, Some(PathBuf::from("truck.obj")));
        assert_eq!(config.shadow_map_size, 1024);
        assert_eq!(config.shadow_bias, 0.01);
        assert!(!config.uncapped_fps);
        assert_eq!(config.log_level, LevelFilter::Info);
        assert!(warnings.is_empty());
    }

    #[test]
    fn verbose_raises_log_level() {
        let (config, warnings) = DemoConfig::from_args(args(&["--verbose"]));
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert!(warnings.is_empty());
    }

    #[test]
    fn bad_values_keep_defaults() {
        let (config, warnings) =
            DemoConfig::from_args(args(&["--shadow-size", "zero", "--bias", "-1", "--what"]));
        assert_eq!(config.shadow_map_size, SHADOW_MAP_SIZE);
        assert_eq!(config.shadow_bias, SHADOW_BIAS);
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[2], "Ignoring unknown flag --what");
    }
}
