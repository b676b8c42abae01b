use crate::domain::models::LatLon;
use crate::domain::signal::DistanceModel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    /// Single-line console records, suited to the radar frame dumps.
    #[serde(default = "default_true")]
    pub compact_console: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            compact_console: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "proximity_radar".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Radar geometry and animation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarSettings {
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    /// Distances at or beyond this many meters land on the rim.
    pub cap_distance: f64,
    /// Fraction of the radius usable for markers (<= 1).
    pub edge_margin: f64,
    pub min_separation: f64,
    pub retry_step_deg: f64,
    pub max_attempts: u32,

    pub tick_interval_ms: u64,
    pub sweep_step_deg: f64,
    pub sweep_tolerance_deg: f64,
    pub lit_opacity: f64,
    pub dim_opacity: f64,

    pub jitter_amplitude: f64,
    /// Chance that a given device moves on a refresh tick.
    pub jitter_probability: f64,
    /// Above this many devices only some ticks refresh positions.
    pub dense_threshold: usize,
    pub dense_refresh_probability: f64,
}

impl Default for RadarSettings {
    fn default() -> Self {
        Self {
            center_x: 130.0,
            center_y: 130.0,
            radius: 130.0,
            cap_distance: 5.0,
            edge_margin: 1.0,
            min_separation: 20.0,
            retry_step_deg: 36.0,
            max_attempts: 10,
            tick_interval_ms: 100,
            // One revolution every three seconds at the default tick.
            sweep_step_deg: 12.0,
            sweep_tolerance_deg: 20.0,
            lit_opacity: 1.0,
            dim_opacity: 0.8,
            jitter_amplitude: 0.5,
            jitter_probability: 0.5,
            dense_threshold: 5,
            dense_refresh_probability: 1.0 / 3.0,
        }
    }
}

/// Meter ranges and bearing spread used when putting a device on a map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoSettings {
    pub close_range_m: (f64, f64),
    pub medium_range_m: (f64, f64),
    pub far_range_m: (f64, f64),
    /// Estimator distance below which a device counts as close.
    pub close_below: f64,
    pub medium_below: f64,
    /// Widest bearing deviation from the user's heading, for the weakest signal.
    pub max_bearing_spread_deg: f64,
    /// Deviation kept even for the strongest signal.
    pub min_bearing_spread_deg: f64,
    /// Used when no user fix is available. `None` reports the estimate as unavailable.
    pub fallback_origin: Option<LatLon>,
}

impl Default for GeoSettings {
    fn default() -> Self {
        Self {
            close_range_m: (5.0, 20.0),
            medium_range_m: (20.0, 60.0),
            far_range_m: (60.0, 150.0),
            close_below: 1.0,
            medium_below: 3.0,
            max_bearing_spread_deg: 180.0,
            min_bearing_spread_deg: 15.0,
            fallback_origin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub connect_timeout_ms: u64,
    /// Delay of the simulated proxy link before it reports success.
    pub simulated_link_delay_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            simulated_link_delay_ms: 1_500,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // Estimation
    #[serde(default)]
    pub estimator: DistanceModel,
    #[serde(default)]
    pub radar: RadarSettings,
    #[serde(default)]
    pub geo: GeoSettings,
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Seconds without a sighting before a device is evicted. `None` keeps
    /// devices until the next scan starts.
    #[serde(default)]
    pub stale_after_secs: Option<u64>,

    /// Fixed seed for jitter and geo randomness.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    /// Load from an explicit path, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}: {})",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("ProximityRadar");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn set_estimator(&mut self, model: DistanceModel) -> anyhow::Result<()> {
        self.settings.estimator = model;
        self.save()
    }
}
