use std::path::Path;
use std::str::FromStr;

use ini::Ini;
use log::{info, warn};

use crate::core::input::Lane;
use crate::error::{EngineError, EngineResult};
use crate::game::gameplay::EngineSettings;
use crate::game::judgment::JudgmentPolicy;
use crate::game::lanes::{LaneGeometry, LanePoints};
use crate::game::note::NoteLifetimes;
use crate::game::scroll::ScrollSettings;
use crate::game::timing_windows::TierTable;

pub const CONFIG_PATH: &str = "stepline.ini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    // [Scroll]
    pub lead_time_seconds: f32,
    pub scroll_speed: f32,
    pub speed_multiplier: f32,
    // [Notes]
    pub hit_window_radius: f32,
    pub miss_grace_seconds: f32,
    pub retire_delay_seconds: f32,
    pub hit_linger_seconds: f32,
    pub judgment_policy: JudgmentPolicy,
    // [Judgment]
    pub tiers: TierTable,
    // [Lanes]
    pub lanes: LaneGeometry,
}

impl Default for Config {
    fn default() -> Self {
        let scroll = ScrollSettings::default();
        let lifetimes = NoteLifetimes::default();
        Self {
            log_level: LogLevel::default(),
            lead_time_seconds: scroll.lead_time,
            scroll_speed: scroll.scroll_speed,
            speed_multiplier: scroll.speed_multiplier,
            hit_window_radius: lifetimes.hit_window_radius,
            miss_grace_seconds: lifetimes.max_miss_grace,
            retire_delay_seconds: lifetimes.retire_delay,
            hit_linger_seconds: lifetimes.hit_linger,
            judgment_policy: JudgmentPolicy::default(),
            tiers: TierTable::default(),
            lanes: LaneGeometry::default(),
        }
    }
}

const TIER_KEYS: [&str; 4] = [
    "PerfectThreshold",
    "GreatThreshold",
    "GoodThreshold",
    "OkThreshold",
];

fn get<'a>(conf: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    conf.get_from(Some(section), key).map(str::trim)
}

/// Reads a float key, falling back to `default` when it is missing, does not
/// parse, or fails `valid`.
fn get_f32(conf: &Ini, section: &str, key: &str, default: f32, valid: fn(f32) -> bool) -> f32 {
    let Some(raw) = get(conf, section, key) else {
        return default;
    };
    match raw.parse::<f32>() {
        Ok(v) if v.is_finite() && valid(v) => v,
        _ => {
            warn!("Invalid {section}.{key} '{raw}', using default {default}.");
            default
        }
    }
}

/// The four tier thresholds. Rejects the whole table when any key is malformed
/// or the ordering is broken, so a half-applied table can never result.
pub fn parse_tier_table(conf: &Ini) -> EngineResult<TierTable> {
    let defaults = TierTable::default().thresholds();
    let mut thresholds = defaults;
    for ((slot, key), default) in thresholds.iter_mut().zip(TIER_KEYS).zip(defaults) {
        *slot = match get(conf, "Judgment", key) {
            None => default,
            Some(raw) => raw
                .parse::<f32>()
                .map_err(|_| EngineError::Config(format!("Judgment.{key} '{raw}' is not a number")))?,
        };
    }
    TierTable::from_thresholds(thresholds).map_err(EngineError::Config)
}

fn parse_lanes(conf: &Ini) -> LaneGeometry {
    if conf.section(Some("Lanes")).is_none() {
        return LaneGeometry::default();
    }
    let mut geometry = LaneGeometry::empty();
    for lane in Lane::ALL {
        let Some(raw) = get(conf, "Lanes", lane.as_str()) else {
            warn!("Lanes.{lane} is not set; notes in that lane will be rejected.");
            continue;
        };
        match LanePoints::parse(raw) {
            Ok(points) => geometry.set(lane, Some(points)),
            Err(e) => warn!("Invalid Lanes.{lane}: {e}; notes in that lane will be rejected."),
        }
    }
    geometry
}

impl Config {
    /// Parses an INI document. Missing or malformed keys keep their defaults.
    pub fn from_ini(conf: &Ini) -> Self {
        let default = Self::default();
        let log_level = get(conf, "Options", "LogLevel")
            .and_then(|v| {
                let parsed = LogLevel::from_str(v).ok();
                if parsed.is_none() {
                    warn!("Invalid Options.LogLevel '{v}', using {}.", default.log_level.as_str());
                }
                parsed
            })
            .unwrap_or(default.log_level);
        let judgment_policy = get(conf, "Notes", "JudgmentPolicy")
            .and_then(|v| match JudgmentPolicy::from_str(v) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("{e}, using {}.", default.judgment_policy.as_str());
                    None
                }
            })
            .unwrap_or(default.judgment_policy);
        let tiers = parse_tier_table(conf).unwrap_or_else(|e| {
            warn!("{e}; keeping default judgment thresholds.");
            default.tiers
        });

        Self {
            log_level,
            lead_time_seconds: get_f32(conf, "Scroll", "LeadTimeSeconds", default.lead_time_seconds, |v| {
                v >= 0.0
            }),
            scroll_speed: get_f32(conf, "Scroll", "ScrollSpeed", default.scroll_speed, |v| v > 0.0),
            speed_multiplier: get_f32(conf, "Scroll", "SpeedMultiplier", default.speed_multiplier, |v| {
                v > 0.0
            }),
            hit_window_radius: get_f32(conf, "Notes", "HitWindowRadius", default.hit_window_radius, |v| {
                v >= 0.0
            }),
            miss_grace_seconds: get_f32(conf, "Notes", "MissGraceSeconds", default.miss_grace_seconds, |v| {
                v >= 0.0
            }),
            retire_delay_seconds: get_f32(
                conf,
                "Notes",
                "RetireDelaySeconds",
                default.retire_delay_seconds,
                |v| v >= 0.0,
            ),
            hit_linger_seconds: get_f32(conf, "Notes", "HitLingerSeconds", default.hit_linger_seconds, |v| {
                v >= 0.0
            }),
            judgment_policy,
            tiers,
            lanes: parse_lanes(conf),
        }
    }

    pub fn load_from(path: &Path) -> EngineResult<Self> {
        let conf = Ini::load_from_file(path)
            .map_err(|e| EngineError::Config(format!("failed to read '{}': {e}", path.display())))?;
        let config = Self::from_ini(&conf);
        info!("Loaded configuration from '{}'.", path.display());
        Ok(config)
    }

    /// Loads `path`, writing a default file first when it does not exist. Any
    /// failure falls back to the built-in defaults.
    pub fn load_or_create(path: &Path) -> Self {
        if !path.exists()
            && let Err(e) = create_default_config_file(path)
        {
            warn!("Failed to create default config file: {e}");
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e}; using default configuration.");
                Self::default()
            }
        }
    }

    pub fn to_ini(&self) -> Ini {
        let mut conf = Ini::new();
        conf.with_section(Some("Options"))
            .set("LogLevel", self.log_level.as_str());
        conf.with_section(Some("Scroll"))
            .set("LeadTimeSeconds", self.lead_time_seconds.to_string())
            .set("ScrollSpeed", self.scroll_speed.to_string())
            .set("SpeedMultiplier", self.speed_multiplier.to_string());
        conf.with_section(Some("Notes"))
            .set("HitWindowRadius", self.hit_window_radius.to_string())
            .set("MissGraceSeconds", self.miss_grace_seconds.to_string())
            .set("RetireDelaySeconds", self.retire_delay_seconds.to_string())
            .set("HitLingerSeconds", self.hit_linger_seconds.to_string())
            .set("JudgmentPolicy", self.judgment_policy.as_str());
        let thresholds = self.tiers.thresholds();
        for (key, value) in TIER_KEYS.iter().zip(thresholds) {
            conf.with_section(Some("Judgment"))
                .set(*key, value.to_string());
        }
        for lane in Lane::ALL {
            if let Some(points) = self.lanes.get(lane) {
                conf.with_section(Some("Lanes"))
                    .set(lane.as_str(), points.to_ini_value());
            }
        }
        conf
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        self.to_ini().write_to_file(path)?;
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            scroll: ScrollSettings {
                lead_time: self.lead_time_seconds,
                scroll_speed: self.scroll_speed,
                speed_multiplier: self.speed_multiplier,
            },
            lifetimes: NoteLifetimes {
                hit_window_radius: self.hit_window_radius,
                retire_delay: self.retire_delay_seconds,
                hit_linger: self.hit_linger_seconds,
                max_miss_grace: self.miss_grace_seconds,
            },
            tiers: self.tiers,
            policy: self.judgment_policy,
            geometry: self.lanes,
        }
    }
}

fn create_default_config_file(path: &Path) -> EngineResult<()> {
    info!("'{}' not found, creating with default values.", path.display());
    Config::default().save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn parse(text: &str) -> Config {
        Config::from_ini(&Ini::load_from_str(text).expect("valid ini"))
    }

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse(""), Config::default());
    }

    #[test]
    fn reads_tunables() {
        let config = parse(
            "[Options]\nLogLevel=debug\n\
             [Scroll]\nLeadTimeSeconds=2.5\nScrollSpeed=400\nSpeedMultiplier=1.5\n\
             [Notes]\nHitWindowRadius=50\nJudgmentPolicy=Ungated\nHitLingerSeconds=0.2\n",
        );
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.lead_time_seconds, 2.5);
        assert_eq!(config.scroll_speed, 400.0);
        assert_eq!(config.speed_multiplier, 1.5);
        assert_eq!(config.hit_window_radius, 50.0);
        assert_eq!(config.hit_linger_seconds, 0.2);
        assert_eq!(config.judgment_policy, JudgmentPolicy::Ungated);

        let settings = config.engine_settings();
        assert_eq!(settings.scroll.lead_time, 2.5);
        assert_eq!(settings.lifetimes.hit_linger, 0.2);
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = parse(
            "[Options]\nLogLevel=chatty\n[Scroll]\nLeadTimeSeconds=-1\nScrollSpeed=fast\n\
             [Notes]\nJudgmentPolicy=loose\n",
        );
        let default = Config::default();
        assert_eq!(config.log_level, default.log_level);
        assert_eq!(config.lead_time_seconds, default.lead_time_seconds);
        assert_eq!(config.scroll_speed, default.scroll_speed);
        assert_eq!(config.judgment_policy, JudgmentPolicy::Gated);
    }

    #[test]
    fn non_monotonic_thresholds_are_rejected() {
        let conf = Ini::load_from_str(
            "[Judgment]\nPerfectThreshold=0.2\nGreatThreshold=0.1\nGoodThreshold=0.15\nOkThreshold=0.25\n",
        )
        .expect("valid ini");
        assert!(matches!(parse_tier_table(&conf), Err(EngineError::Config(_))));
        assert_eq!(Config::from_ini(&conf).tiers, TierTable::default());
    }

    #[test]
    fn retuned_thresholds_are_applied() {
        let config = parse("[Judgment]\nPerfectThreshold=0.02\nOkThreshold=0.3\n");
        let t = config.tiers.thresholds();
        assert!((t[0] - 0.02).abs() <= 1e-6);
        assert!((t[1] - 0.10).abs() <= 1e-6, "unset keys keep their defaults");
        assert!((config.tiers.ok_threshold() - 0.3).abs() <= 1e-6);
    }

    #[test]
    fn lanes_section_replaces_default_geometry() {
        let config = parse("[Lanes]\nLeft=0,100|0,-100|0,-80\nUp=bogus\n");
        let left = config.lanes.get(Lane::Left).expect("left lane set");
        assert_eq!(left.spawn, Vec2::new(0.0, 100.0));
        assert_eq!(left.hit, Vec2::new(0.0, -80.0));
        assert!(config.lanes.get(Lane::Up).is_none(), "malformed lane stays unset");
        assert!(config.lanes.get(Lane::Down).is_none(), "unlisted lane stays unset");
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_PATH);
        let config = Config::load_or_create(&path);
        assert!(path.exists(), "default config file should be written");
        assert_eq!(config, Config::default());
        assert_eq!(Config::load_from(&path).expect("reload"), Config::default());
    }

    #[test]
    fn save_round_trips_custom_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.ini");
        let config = Config {
            log_level: LogLevel::Trace,
            lead_time_seconds: 1.75,
            judgment_policy: JudgmentPolicy::Ungated,
            lanes: LaneGeometry::empty().with_lane(
                Lane::Right,
                LanePoints::new(Vec2::new(5.0, 10.0), Vec2::new(5.0, -10.0), Vec2::new(5.0, -8.0)),
            ),
            ..Config::default()
        };
        config.save(&path).expect("save");
        assert_eq!(Config::load_from(&path).expect("load"), config);
    }

    #[test]
    fn unreadable_path_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load_from(&dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)), "got {err:?}");
    }
}
