/// Sound engine: procedural chiptune effects via rodio.
///
/// Every effect is synthesized into an in-memory WAV buffer at startup and
/// played fire-and-forget through a detached `Sink`.
///
/// The mapping from game events to effects (`cues`) is plain code and
/// always compiled; without the "sound" feature the engine is a stub.

use crate::domain::rules::MoveKind;
use crate::sim::event::GameEvent;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sfx {
    Pickup,
    Bump,
    Reveal,
    ExitOpened,
    Unlock,
    ExtraTurns,
    GameOver,
    ZoneClear,
}

impl Sfx {
    pub const ALL: [Sfx; 8] = [
        Sfx::Pickup,
        Sfx::Bump,
        Sfx::Reveal,
        Sfx::ExitOpened,
        Sfx::Unlock,
        Sfx::ExtraTurns,
        Sfx::GameOver,
        Sfx::ZoneClear,
    ];
}

/// Effects for one tick's events, deduplicated and in event order.
pub fn cues(events: &[GameEvent]) -> Vec<Sfx> {
    let mut out = vec![];
    for ev in events {
        let sfx = match ev {
            GameEvent::ItemCollected { .. } => Sfx::Pickup,
            GameEvent::TurnCompleted { kind: MoveKind::Bump, .. } => Sfx::Bump,
            GameEvent::BatchRevealed { .. } => Sfx::Reveal,
            GameEvent::ZoneExitOpened { .. } => Sfx::ExitOpened,
            GameEvent::ObstacleUnlocked { .. } => Sfx::Unlock,
            GameEvent::TurnsCredited { .. } => Sfx::ExtraTurns,
            GameEvent::GameOver { .. } => Sfx::GameOver,
            GameEvent::ExitReached { .. } | GameEvent::LevelCleared => Sfx::ZoneClear,
            _ => continue,
        };
        if !out.contains(&sfx) {
            out.push(sfx);
        }
    }
    out
}

#[cfg(feature = "sound")]
mod inner {
    use std::f32::consts::TAU;
    use std::io::Cursor;
    use std::sync::Arc;

    use log::info;
    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::Sfx;

    const SAMPLE_RATE: u32 = 22050;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        buffers: Vec<(Sfx, Arc<Vec<u8>>)>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    info!("[Sound] no output device: {e}");
                    return None;
                }
            };
            let buffers = Sfx::ALL
                .iter()
                .map(|&sfx| (sfx, Arc::new(make_wav(&synth(sfx)))))
                .collect();
            Some(SoundEngine { _stream: stream, handle, buffers })
        }

        pub fn play(&self, sfx: Sfx) {
            let Some((_, buf)) = self.buffers.iter().find(|(s, _)| *s == sfx) else {
                return;
            };
            let Ok(sink) = Sink::try_new(&self.handle) else {
                return;
            };
            if let Ok(src) = rodio::Decoder::new(Cursor::new(buf.as_ref().clone())) {
                sink.append(src);
                sink.detach();
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Synthesis
    // ════════════════════════════════════════════════════════════

    /// One note: frequency (Hz), length (s), overtone mix (0 = pure sine).
    type Note = (f32, f32, f32);

    fn synth(sfx: Sfx) -> Vec<f32> {
        match sfx {
            Sfx::Pickup => notes(&[(988.0, 0.04, 0.3), (1319.0, 0.06, 0.3)], 0.25),
            Sfx::Bump => thud(),
            Sfx::Reveal => sweep(500.0, 1200.0, 0.14, 0.18),
            Sfx::ExitOpened => notes(&[(784.0, 0.08, 0.3), (1047.0, 0.08, 0.3), (1568.0, 0.18, 0.3)], 0.28),
            Sfx::Unlock => sweep(1400.0, 300.0, 0.18, 0.22),
            Sfx::ExtraTurns => notes(&[(659.0, 0.05, 0.5), (880.0, 0.05, 0.5), (659.0, 0.05, 0.5), (1175.0, 0.1, 0.5)], 0.22),
            Sfx::GameOver => notes(&[(392.0, 0.14, 0.0), (330.0, 0.14, 0.0), (262.0, 0.32, 0.0)], 0.3),
            Sfx::ZoneClear => notes(&[(523.0, 0.09, 0.4), (659.0, 0.09, 0.4), (784.0, 0.09, 0.4), (1047.0, 0.3, 0.4)], 0.28),
        }
    }

    /// Sequence of notes, each with its own decay.
    fn notes(seq: &[Note], volume: f32) -> Vec<f32> {
        let mut out = vec![];
        for &(freq, dur, overtone) in seq {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            out.extend((0..n).map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).sqrt();
                let wave = (t * freq * TAU).sin() * (1.0 - overtone) + (t * freq * 2.0 * TAU).sin() * overtone;
                wave * env * volume
            }));
        }
        out
    }

    /// Linear pitch sweep from `from` to `to` Hz.
    fn sweep(from: f32, to: f32, dur: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * dur) as usize;
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let p = i as f32 / n as f32;
                phase += (from + (to - from) * p) * TAU / SAMPLE_RATE as f32;
                phase.sin() * (1.0 - p) * volume
            })
            .collect()
    }

    /// Low square thud with a noise edge, for walking into a wall.
    fn thud() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.07) as usize;
        let mut seed: u32 = 0x2545_f491;
        (0..n)
            .map(|i| {
                let p = i as f32 / n as f32;
                let t = i as f32 / SAMPLE_RATE as f32;
                let square = if (t * 110.0 * TAU).sin() >= 0.0 { 1.0 } else { -1.0 };
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                let noise = seed as f32 / u32::MAX as f32 * 2.0 - 1.0;
                (square * 0.7 + noise * 0.3) * (1.0 - p).powi(2) * 0.2
            })
            .collect()
    }

    // ════════════════════════════════════════════════════════════
    //  WAV container (16-bit mono PCM)
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let data_len = samples.len() as u32 * 2;
        let mut buf = Vec::with_capacity(44 + data_len as usize);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_len).to_le_bytes());
        buf.extend_from_slice(b"WAVEfmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // mono
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_len.to_le_bytes());
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

}

// ════════════════════════════════════════════════════════════
//  Public API — compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> {
        Some(SoundEngine)
    }

    pub fn play(&self, _sfx: Sfx) {}
}
