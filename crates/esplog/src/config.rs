use clap::Args;
use esplog_core::PrecisionProfile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{LogError, Result};

/// Returns the ~/.esplog directory, creating it if needed.
/// Falls back to a local `.esplog` directory if the home directory cannot be
/// determined or written.
pub fn esplog_data_dir() -> Result<PathBuf> {
    resolve_data_dir(dirs::home_dir().as_deref(), Path::new(".esplog"))
}

fn resolve_data_dir(home: Option<&Path>, fallback: &Path) -> Result<PathBuf> {
    match home.map(|home| home.join(".esplog")) {
        Some(dir) => match fs::create_dir_all(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) => warn!(
                path = %dir.display(),
                fallback = %fallback.display(),
                error = %e,
                "Could not create data directory, using fallback"
            ),
        },
        None => warn!(
            fallback = %fallback.display(),
            "Could not determine home directory, using fallback"
        ),
    }
    fs::create_dir_all(fallback)?;
    Ok(fallback.to_path_buf())
}

/// Synthetic motion used by `esplog record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Rotation vector applied every sample (radians).
    #[serde(default = "default_step")]
    pub step: [f64; 3],
    /// Uniform per-axis noise added to each step (radians).
    #[serde(default)]
    pub jitter: f64,
    #[serde(default)]
    pub seed: u64,
    /// Standard accelerometer noise in raw counts.
    #[serde(default = "default_accel_noise")]
    pub accel_noise: f64,
}

fn default_step() -> [f64; 3] {
    [0.01, 0.005, 0.0]
}

fn default_accel_noise() -> f64 {
    4.0
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            jitter: 0.0,
            seed: 0,
            accel_noise: default_accel_noise(),
        }
    }
}

/// Recorder settings, stored as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Gyro samples per compressed block.
    #[serde(default = "default_samples_per_block")]
    pub samples_per_block: u16,
    /// Quantization shifts tried in order for every block.
    #[serde(default = "default_profiles")]
    pub profiles: Vec<PrecisionProfile>,
    /// Accelerometer full-scale range in g, recorded in the accel setup block.
    #[serde(default = "default_accel_range")]
    pub accel_range: u8,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,
    /// One accelerometer reading per this many gyro samples.
    #[serde(default = "default_accel_every")]
    pub accel_every: u32,
    #[serde(default)]
    pub motion: MotionConfig,
}

fn default_samples_per_block() -> u16 {
    100
}

fn default_profiles() -> Vec<PrecisionProfile> {
    PrecisionProfile::DEFAULT_ORDER.to_vec()
}

fn default_accel_range() -> u8 {
    16
}

fn default_sample_rate() -> u32 {
    100
}

fn default_accel_every() -> u32 {
    4
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            samples_per_block: default_samples_per_block(),
            profiles: default_profiles(),
            accel_range: default_accel_range(),
            sample_rate_hz: default_sample_rate(),
            accel_every: default_accel_every(),
            motion: MotionConfig::default(),
        }
    }
}

/// Command-line overrides for [`RecorderConfig`].
#[derive(Debug, Clone, Default, Args)]
pub struct RecorderArgs {
    /// Gyro samples per compressed block
    #[arg(long)]
    pub samples_per_block: Option<u16>,

    /// Quantization shift to try; repeat to build the fallback order
    #[arg(long = "profile", value_parser = clap::value_parser!(u8).range(1..=23))]
    pub profiles: Vec<u8>,

    /// Gyro sample rate in Hz
    #[arg(long)]
    pub sample_rate_hz: Option<u32>,

    /// Per-axis motion jitter in radians
    #[arg(long)]
    pub jitter: Option<f64>,

    /// Seed for the motion jitter
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RecorderConfig {
    pub fn default_path() -> Result<PathBuf> {
        Ok(esplog_data_dir()?.join("config.toml"))
    }

    /// Loads `path`, writing the defaults there first if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = RecorderConfig::default();
            config.save(path)?;
            info!(path = %path.display(), "Wrote default recorder config");
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let config: RecorderConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        fs::write(path, toml)?;
        Ok(())
    }

    pub fn apply(&mut self, args: &RecorderArgs) -> Result<()> {
        if let Some(n) = args.samples_per_block {
            self.samples_per_block = n;
        }
        if !args.profiles.is_empty() {
            self.profiles = args
                .profiles
                .iter()
                .map(|&shift| PrecisionProfile::new(shift))
                .collect::<esplog_core::Result<_>>()?;
        }
        if let Some(rate) = args.sample_rate_hz {
            self.sample_rate_hz = rate;
        }
        if let Some(jitter) = args.jitter {
            self.motion.jitter = jitter;
        }
        if let Some(seed) = args.seed {
            self.motion.seed = seed;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples_per_block == 0 {
            return Err(LogError::InvalidConfig(
                "samples_per_block must be at least 1".into(),
            ));
        }
        if self.profiles.is_empty() {
            return Err(LogError::InvalidConfig("profiles must not be empty".into()));
        }
        if self.sample_rate_hz == 0 {
            return Err(LogError::InvalidConfig("sample_rate_hz must be positive".into()));
        }
        if self.accel_every == 0 {
            return Err(LogError::InvalidConfig("accel_every must be positive".into()));
        }
        for (name, value) in [
            ("motion.jitter", self.motion.jitter),
            ("motion.accel_noise", self.motion.accel_noise),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LogError::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: RecorderConfig = toml::from_str("samples_per_block = 25\n").unwrap();
        assert_eq!(config.samples_per_block, 25);
        assert_eq!(config.profiles, PrecisionProfile::DEFAULT_ORDER.to_vec());
        assert_eq!(config.motion, MotionConfig::default());
    }

    #[test]
    fn profiles_are_shifts_in_toml() {
        let text = toml::to_string_pretty(&RecorderConfig::default()).unwrap();
        assert!(text.contains("profiles = ["));
        let config: RecorderConfig = toml::from_str("profiles = [16, 22]\n").unwrap();
        assert_eq!(config.profiles[1].shift(), 22);
        assert!(toml::from_str::<RecorderConfig>("profiles = [31]\n").is_err());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("esplog-config-{}.toml", std::process::id()));
        let mut config = RecorderConfig::default();
        config.motion.jitter = 0.002;
        config.accel_every = 2;
        config.save(&path).unwrap();
        let loaded = RecorderConfig::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn overrides_are_validated() {
        let mut config = RecorderConfig::default();
        let args = RecorderArgs {
            samples_per_block: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.apply(&args),
            Err(LogError::InvalidConfig(_))
        ));

        let mut config = RecorderConfig::default();
        let args = RecorderArgs {
            profiles: vec![20],
            seed: Some(7),
            ..Default::default()
        };
        config.apply(&args).unwrap();
        assert_eq!(config.profiles, vec![PrecisionProfile::FALLBACK]);
        assert_eq!(config.motion.seed, 7);
    }

    #[test]
    fn motion_noise_must_be_finite() {
        for bad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -0.5] {
            let mut config = RecorderConfig::default();
            config.motion.accel_noise = bad;
            assert!(matches!(config.validate(), Err(LogError::InvalidConfig(_))));

            let mut config = RecorderConfig::default();
            let args = RecorderArgs {
                jitter: Some(bad),
                ..Default::default()
            };
            assert!(matches!(config.apply(&args), Err(LogError::InvalidConfig(_))));
        }
        assert!(toml::from_str::<RecorderConfig>("[motion]\naccel_noise = inf\n")
            .unwrap()
            .validate()
            .is_err());
    }

    #[test]
    fn data_dir_falls_back_when_home_is_unusable() {
        let root = std::env::temp_dir().join(format!("esplog-dirs-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();

        let home = root.join("home");
        fs::create_dir_all(&home).unwrap();
        let fallback = root.join("fallback");
        assert_eq!(
            resolve_data_dir(Some(&home), &fallback).unwrap(),
            home.join(".esplog")
        );
        assert!(home.join(".esplog").is_dir());

        // A plain file where the home directory should be.
        let blocked = root.join("blocked");
        fs::write(&blocked, b"").unwrap();
        assert_eq!(resolve_data_dir(Some(&blocked), &fallback).unwrap(), fallback);
        assert!(fallback.is_dir());
        assert_eq!(resolve_data_dir(None, &fallback).unwrap(), fallback);

        // Nowhere to go: the fallback error reaches the caller.
        assert!(matches!(
            resolve_data_dir(Some(&blocked), &blocked.join("sub")),
            Err(LogError::Io(_))
        ));
        let _ = fs::remove_dir_all(&root);
    }
}
