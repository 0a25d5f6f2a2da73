/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// Read or parse failures are logged and never stop the game.

use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::entity::MIN_DURATION;
use crate::domain::motion::MotionConfig;
use crate::sim::reveal::{RevealRules, RevealSettings};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub reveal: RevealSettings,
    pub budget: BudgetConfig,
    pub patrol: PatrolConfig,
    pub gamepad: GamepadConfig,
    pub levels_dir: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
    pub motion: MotionConfig,
    pub item_fade: f32,
    pub exit_fade: f32,
    pub obstacle_fade: f32,
    /// Pause between reaching an exit and arriving in the next zone.
    pub transition_delay: f32,
}

#[derive(Clone, Debug)]
pub struct BudgetConfig {
    /// Budget for zones that don't set one; `None` = unlimited.
    pub default_zone_budget: Option<u32>,
    /// Turns granted by `@slot` rules that don't say how many.
    pub default_extra_turns: u32,
}

#[derive(Clone, Debug)]
pub struct PatrolConfig {
    pub default_distance: u32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub restart: Vec<String>,
    pub stick_deadzone: f32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("{path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    reveal: TomlReveal,
    #[serde(default)]
    budget: TomlBudget,
    #[serde(default)]
    patrol: TomlPatrol,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_move_duration")]
    move_duration: f32,
    #[serde(default = "default_bump_duration")]
    bump_duration: f32,
    #[serde(default = "default_bump_distance")]
    bump_distance: f32,
    #[serde(default = "default_item_fade")]
    item_fade: f32,
    #[serde(default = "default_exit_fade")]
    exit_fade: f32,
    #[serde(default = "default_obstacle_fade")]
    obstacle_fade: f32,
    #[serde(default = "default_transition_delay")]
    transition_delay: f32,
}

#[derive(Deserialize, Debug)]
struct TomlReveal {
    #[serde(default = "default_initial_visible")]
    initial_visible: usize,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default)]
    hide_completed_batches: bool,
    #[serde(default)]
    hide_previous_batches: bool,
    #[serde(default)]
    reset_on_enter: bool,
    #[serde(default = "default_true")]
    clear_registry_globally: bool,
}

#[derive(Deserialize, Debug)]
struct TomlBudget {
    #[serde(default)]
    default_zone_budget: Option<u32>,
    #[serde(default = "default_extra_turns")]
    default_extra_turns: u32,
}

#[derive(Deserialize, Debug)]
struct TomlPatrol {
    #[serde(default = "default_patrol_distance")]
    default_distance: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
    #[serde(default = "default_restart")]
    restart: Vec<String>,
    #[serde(default = "default_deadzone")]
    stick_deadzone: f32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default = "default_log_file")]
    log_file: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }
fn default_move_duration() -> f32 { 0.15 }
fn default_bump_duration() -> f32 { 0.1 }   // per leg: toward the wall, then back
fn default_bump_distance() -> f32 { 0.2 }
fn default_item_fade() -> f32 { 0.6 }
fn default_exit_fade() -> f32 { 0.8 }
fn default_obstacle_fade() -> f32 { 0.5 }
fn default_transition_delay() -> f32 { 0.6 }

fn default_initial_visible() -> usize { 1 }
fn default_batch_size() -> usize { 2 }
fn default_true() -> bool { true }

fn default_extra_turns() -> u32 { 1 }
fn default_patrol_distance() -> u32 { 3 }

fn default_confirm() -> Vec<String> { vec!["Start".into(), "A".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into(), "B".into()] }
fn default_restart() -> Vec<String> { vec!["Y".into()] }
fn default_deadzone() -> f32 { 0.25 }

fn default_levels_dir() -> String { "levels".into() }
fn default_log_file() -> String { "starseeker.log".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            tick_rate_ms: default_tick_rate(),
            move_duration: default_move_duration(),
            bump_duration: default_bump_duration(),
            bump_distance: default_bump_distance(),
            item_fade: default_item_fade(),
            exit_fade: default_exit_fade(),
            obstacle_fade: default_obstacle_fade(),
            transition_delay: default_transition_delay(),
        }
    }
}

impl Default for TomlReveal {
    fn default() -> Self {
        TomlReveal {
            initial_visible: default_initial_visible(),
            batch_size: default_batch_size(),
            hide_completed_batches: false,
            hide_previous_batches: false,
            reset_on_enter: false,
            clear_registry_globally: true,
        }
    }
}

impl Default for TomlBudget {
    fn default() -> Self {
        TomlBudget { default_zone_budget: None, default_extra_turns: default_extra_turns() }
    }
}

impl Default for TomlPatrol {
    fn default() -> Self {
        TomlPatrol { default_distance: default_patrol_distance() }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            confirm: default_confirm(),
            cancel: default_cancel(),
            restart: default_restart(),
            stick_deadzone: default_deadzone(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { levels_dir: default_levels_dir(), log_file: default_log_file() }
    }
}

/// Clamp a duration to a minimal positive value, warning when it had to.
fn positive(name: &str, value: f32) -> f32 {
    if value.is_finite() && value >= MIN_DURATION {
        value
    } else {
        warn!("[Config] {name} = {value} is not a positive duration; using {MIN_DURATION}");
        MIN_DURATION
    }
}

// ── Loading ──

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::from_toml(TomlConfig::default(), &[])
    }
}

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = match load_toml(&search_dirs) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("[Config] {e}; using default settings");
                TomlConfig::default()
            }
        };
        GameConfig::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse config text directly (no file search).
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(GameConfig::from_toml(cfg, &[]))
    }

    fn from_toml(cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let t = &cfg.timing;
        let timing = TimingConfig {
            tick_rate_ms: t.tick_rate_ms.max(1),
            motion: MotionConfig {
                move_duration: positive("move_duration", t.move_duration),
                bump_duration: positive("bump_duration", t.bump_duration),
                bump_distance: t.bump_distance,
            }
            .sanitized(),
            item_fade: positive("item_fade", t.item_fade),
            exit_fade: positive("exit_fade", t.exit_fade),
            obstacle_fade: positive("obstacle_fade", t.obstacle_fade),
            transition_delay: positive("transition_delay", t.transition_delay),
        };

        let r = &cfg.reveal;
        if r.batch_size == 0 {
            warn!("[Config] reveal.batch_size = 0; using 1");
        }
        let reveal = RevealSettings {
            defaults: RevealRules {
                initial_visible: r.initial_visible,
                batch_size: r.batch_size.max(1),
                hide_completed_batches: r.hide_completed_batches,
                hide_previous_batches: r.hide_previous_batches,
                reset_on_enter: r.reset_on_enter,
            },
            clear_registry_globally: r.clear_registry_globally,
            item_fade: timing.item_fade,
            exit_fade: timing.exit_fade,
        };

        let deadzone = cfg.gamepad.stick_deadzone;
        let deadzone = if (0.0..1.0).contains(&deadzone) { deadzone } else { default_deadzone() };

        GameConfig {
            timing,
            reveal,
            budget: BudgetConfig {
                default_zone_budget: cfg.budget.default_zone_budget,
                default_extra_turns: cfg.budget.default_extra_turns,
            },
            patrol: PatrolConfig { default_distance: cfg.patrol.default_distance },
            gamepad: GamepadConfig {
                confirm: cfg.gamepad.confirm,
                cancel: cfg.gamepad.cancel,
                restart: cfg.gamepad.restart,
                stick_deadzone: deadzone,
            },
            levels_dir: resolve_dir(&cfg.general.levels_dir, search_dirs),
            log_file: PathBuf::from(&cfg.general.log_file),
        }
    }
}

/// Absolute paths are kept; relative ones are looked up in the search dirs.
fn resolve_dir(name: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let path = PathBuf::from(name);
    if path.is_absolute() {
        return path;
    }
    search_dirs
        .iter()
        .map(|d| d.join(name))
        .find(|p| p.is_dir())
        .unwrap_or(path)
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
pub fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }
    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> Result<TomlConfig, ConfigError> {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            let cfg = read_toml(&path)?;
            info!("[Config] loaded {}", path.display());
            return Ok(cfg);
        }
    }
    Ok(TomlConfig::default())
}

fn read_toml(path: &Path) -> Result<TomlConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str::<TomlConfig>(&text)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_gives_defaults() {
        let cfg = GameConfig::parse("").unwrap();
        assert_eq!(cfg.timing.tick_rate_ms, 16);
        assert_eq!(cfg.timing.motion, MotionConfig::default());
        assert_eq!(cfg.reveal.defaults, RevealRules::default());
        assert!(cfg.reveal.clear_registry_globally);
        assert_eq!(cfg.budget.default_zone_budget, None);
        assert_eq!(cfg.budget.default_extra_turns, 1);
        assert_eq!(cfg.patrol.default_distance, 3);
        assert_eq!(cfg.log_file, PathBuf::from("starseeker.log"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = GameConfig::parse(
            "[timing]\nmove_duration = 0.3\n[reveal]\nbatch_size = 3\nreset_on_enter = true\n[budget]\ndefault_zone_budget = 12\n",
        )
        .unwrap();
        assert_eq!(cfg.timing.motion.move_duration, 0.3);
        assert_eq!(cfg.timing.motion.bump_duration, 0.1);
        assert_eq!(cfg.reveal.defaults.batch_size, 3);
        assert_eq!(cfg.reveal.defaults.initial_visible, 1);
        assert!(cfg.reveal.defaults.reset_on_enter);
        assert_eq!(cfg.budget.default_zone_budget, Some(12));
    }

    #[test]
    fn bad_durations_are_clamped() {
        let cfg = GameConfig::parse(
            "[timing]\nmove_duration = 0.0\nitem_fade = -1.0\n[reveal]\nbatch_size = 0\n[gamepad]\nstick_deadzone = 3.0\n",
        )
        .unwrap();
        assert!(cfg.timing.motion.move_duration > 0.0);
        assert!(cfg.timing.item_fade > 0.0);
        assert_eq!(cfg.reveal.defaults.batch_size, 1);
        assert_eq!(cfg.gamepad.stick_deadzone, 0.25);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(GameConfig::parse("[timing\n").is_err());
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = read_toml(Path::new("/definitely/not/here/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
