/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    KeyCode, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use log::{info, warn};

use config::GameConfig;
use domain::rules::AxisInput;
use sim::level::{load_level, load_levels, LevelDef};
use sim::step;
use sim::world::{Phase, WorldState};
use ui::gamepad::GamepadState;
use ui::input::{InputState, KEYS_DOWN, KEYS_UP};
use ui::renderer::Renderer;
use ui::sound::{self, SoundEngine};

const FRAME_SLEEP: Duration = Duration::from_millis(5);

/// Longest simulated step; a stalled terminal must not skip whole moves.
const MAX_DT: f32 = 0.1;

/// Rows of the level list visible at once.
const SELECT_VISIBLE: usize = 16;

fn main() {
    let config = GameConfig::load();
    init_logging(&config);

    let levels = load_levels(&config);
    info!("[Level] {} levels available", levels.len());

    let mut world = WorldState::new(&config);
    world.level_names = levels.iter().map(|l| l.name.clone()).collect();
    world.total_levels = levels.len();

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }
    let enhanced = enable_key_release();

    let audio = SoundEngine::new();
    let result = game_loop(&mut world, &levels, &mut renderer, audio.as_ref(), &config, enhanced);

    if enhanced {
        let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
    }
    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Starseeker!");
}

/// Log to the configured file; the terminal belongs to the renderer.
/// `RUST_LOG` overrides the default `warn` filter.
fn init_logging(config: &GameConfig) {
    use env_logger::{Builder, Env, Target};

    match File::create(&config.log_file) {
        Ok(file) => {
            Builder::from_env(Env::default().default_filter_or("warn"))
                .target(Target::Pipe(Box::new(file)))
                .init();
        }
        Err(e) => eprintln!("Cannot open log file {}: {e}", config.log_file.display()),
    }
}

/// Ask the terminal for Release events. Returns whether they are on.
fn enable_key_release() -> bool {
    if !matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
        return false;
    }
    let flags = KeyboardEnhancementFlags::REPORT_EVENT_TYPES;
    match execute!(io::stdout(), PushKeyboardEnhancementFlags(flags)) {
        Ok(()) => true,
        Err(e) => {
            warn!("[Input] keyboard enhancement failed: {e}");
            false
        }
    }
}

fn game_loop(
    world: &mut WorldState,
    levels: &[LevelDef],
    renderer: &mut Renderer,
    audio: Option<&SoundEngine>,
    config: &GameConfig,
    honor_release: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = honor_release;
    let mut gp = GamepadState::new(&config.gamepad);
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.timing.tick_rate_ms);

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }
        if handle_meta(world, levels, &kb, &gp, config) {
            break;
        }

        let elapsed = last_tick.elapsed();
        if elapsed >= tick_rate {
            last_tick = Instant::now();
            let dt = elapsed.as_secs_f32().min(MAX_DT);
            let events = step::step(world, movement(&kb, &gp), dt);
            if let Some(engine) = audio {
                for cue in sound::cues(&events) {
                    engine.play(cue);
                }
            }
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Keyboard first; the gamepad only when no direction key is held.
fn movement(kb: &InputState, gp: &GamepadState) -> AxisInput {
    let axis = kb.axis();
    if axis.is_released() {
        gp.axis()
    } else {
        axis
    }
}

// ── Key Constants ──

const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r')];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::Char('p'), KeyCode::F(1)];
const KEYS_SELECT: &[KeyCode] = &[KeyCode::Char('l')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q')];

/// Reset to the title screen, keeping the level list.
fn return_to_title(world: &mut WorldState, config: &GameConfig) {
    let names = std::mem::take(&mut world.level_names);
    let total = world.total_levels;
    *world = WorldState::new(config);
    world.level_names = names;
    world.total_levels = total;
    world.phase = Phase::Title;
}

fn open_level_select(world: &mut WorldState) {
    world.paused = false;
    world.phase = Phase::LevelSelect;
    world.select_cursor = world.current_level.min(world.level_names.len().saturating_sub(1));
    world.select_scroll = world.select_cursor.saturating_sub(SELECT_VISIBLE / 2);
}

fn start_level(world: &mut WorldState, levels: &[LevelDef], idx: usize, config: &GameConfig) {
    world.paused = false;
    load_level(world, levels, idx, config);
}

/// Menu, pause and retry keys. Returns true to quit.
fn handle_meta(
    world: &mut WorldState,
    levels: &[LevelDef],
    kb: &InputState,
    gp: &GamepadState,
    config: &GameConfig,
) -> bool {
    let confirm = kb.any_pressed(KEYS_CONFIRM) || gp.confirm_pressed();
    let cancel = kb.any_pressed(&[KeyCode::Esc]) || gp.cancel_pressed();
    let restart = kb.any_pressed(KEYS_RESTART) || gp.restart_pressed();

    match world.phase {
        Phase::Title => {
            if confirm {
                start_level(world, levels, 0, config);
            } else if kb.any_pressed(KEYS_SELECT) {
                open_level_select(world);
            } else if cancel || kb.any_pressed(KEYS_QUIT) {
                return true;
            }
        }
        Phase::LevelSelect => {
            let count = world.level_names.len();
            if kb.any_pressed(KEYS_UP) && world.select_cursor > 0 {
                world.select_cursor -= 1;
            } else if kb.any_pressed(KEYS_DOWN) && world.select_cursor + 1 < count {
                world.select_cursor += 1;
            }
            if world.select_cursor < world.select_scroll {
                world.select_scroll = world.select_cursor;
            } else if world.select_cursor >= world.select_scroll + SELECT_VISIBLE {
                world.select_scroll = world.select_cursor + 1 - SELECT_VISIBLE;
            }

            if confirm && count > 0 {
                let idx = world.select_cursor;
                start_level(world, levels, idx, config);
            } else if cancel {
                world.phase = Phase::Title;
            }
        }
        Phase::Playing if world.paused => {
            if kb.any_pressed(KEYS_PAUSE) || confirm {
                step::toggle_pause(world);
            } else if restart {
                let idx = world.current_level;
                start_level(world, levels, idx, config);
                world.set_message("Level restarted", 1.5);
            } else if kb.any_pressed(KEYS_SELECT) {
                open_level_select(world);
            } else if cancel {
                return_to_title(world, config);
            }
        }
        Phase::Playing => {
            if kb.any_pressed(KEYS_PAUSE) || cancel {
                step::toggle_pause(world);
            } else if restart {
                let idx = world.current_level;
                start_level(world, levels, idx, config);
                world.set_message("Level restarted", 1.5);
            }
        }
        Phase::ZoneTransition => {}
        Phase::LevelComplete => {
            if confirm {
                let next = world.current_level + 1;
                start_level(world, levels, next, config);
            } else if cancel {
                return_to_title(world, config);
            }
        }
        Phase::GameOver => {
            if confirm || restart {
                let idx = world.current_level;
                start_level(world, levels, idx, config);
            } else if cancel {
                return_to_title(world, config);
            }
        }
        Phase::GameComplete => {
            if confirm || cancel {
                return_to_title(world, config);
            }
        }
    }
    false
}
