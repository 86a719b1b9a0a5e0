//! Alert gating.
//!
//! Every qualifying frame gets the visual overlay. The audible alert is
//! rate-limited by a cooldown evaluated lazily on each trigger, with no timer
//! thread. Audio runs on a detached thread so a slow or broken sound backend
//! cannot stall the render loop, and its failures are only logged. At most
//! one sound plays at a time; a grant that arrives while one is still
//! playing is counted but not played.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{AlertSettings, AudioMode};

/// Audio output for alerts.
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Play one alert sound. May block; always called off the render thread.
    fn play(&self) -> Result<()>;
}

/// Terminal bell on stderr.
pub struct TerminalBell;

impl AudioBackend for TerminalBell {
    fn name(&self) -> &'static str {
        "bell"
    }

    fn play(&self) -> Result<()> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07").context("write terminal bell")?;
        stderr.flush().context("flush terminal bell")?;
        Ok(())
    }
}

/// External `beep` utility (PC speaker).
pub struct CommandBeep {
    pub tone_hz: u32,
    pub tone_ms: u32,
}

impl AudioBackend for CommandBeep {
    fn name(&self) -> &'static str {
        "beep"
    }

    fn play(&self) -> Result<()> {
        let status = Command::new("beep")
            .arg("-f")
            .arg(self.tone_hz.to_string())
            .arg("-l")
            .arg(self.tone_ms.to_string())
            .status()
            .context("run beep")?;
        if !status.success() {
            return Err(anyhow!("beep exited with {}", status));
        }
        Ok(())
    }
}

/// No audio.
pub struct Silent;

impl AudioBackend for Silent {
    fn name(&self) -> &'static str {
        "none"
    }

    fn play(&self) -> Result<()> {
        Ok(())
    }
}

pub fn audio_backend_for(settings: &AlertSettings) -> Arc<dyn AudioBackend> {
    match settings.audio {
        AudioMode::Bell => Arc::new(TerminalBell),
        AudioMode::Beep => Arc::new(CommandBeep {
            tone_hz: settings.tone_hz,
            tone_ms: settings.tone_ms,
        }),
        AudioMode::None => Arc::new(Silent),
    }
}

/// Cooldown bookkeeping. `None` means the alert has never fired, which
/// behaves like a timestamp in the distant past.
#[derive(Clone, Debug)]
pub struct AlertState {
    pub last_fired_at: Option<Instant>,
    pub cooldown: Duration,
}

impl AlertState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_fired_at: None,
            cooldown,
        }
    }

    /// Grant and record a fire when strictly more than `cooldown` has passed.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        let ready = match self.last_fired_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
        };
        if ready {
            self.last_fired_at = Some(now);
        }
        ready
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.last_fired_at
            .is_some_and(|last| now.saturating_duration_since(last) <= self.cooldown)
    }
}

/// What a trigger was granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertDecision {
    /// Always true: the overlay is not rate-limited.
    pub visual: bool,
    pub audio: bool,
}

/// Owned by the render loop; mutated only through [`AlertManager::trigger`].
pub struct AlertManager {
    state: AlertState,
    audio: Arc<dyn AudioBackend>,
    audio_busy: Arc<AtomicBool>,
    audio_fired: Arc<AtomicU64>,
    audio_failed: Arc<AtomicU64>,
    audio_skipped: AtomicU64,
}

impl AlertManager {
    pub fn new(cooldown: Duration, audio: Arc<dyn AudioBackend>) -> Self {
        Self {
            state: AlertState::new(cooldown),
            audio,
            audio_busy: Arc::new(AtomicBool::new(false)),
            audio_fired: Arc::new(AtomicU64::new(0)),
            audio_failed: Arc::new(AtomicU64::new(0)),
            audio_skipped: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &AlertSettings) -> Self {
        Self::new(settings.cooldown, audio_backend_for(settings))
    }

    /// Request an alert at `now` for a target labelled `label`.
    /// Dispatches audio when the cooldown allows.
    pub fn trigger(&mut self, now: Instant, label: &str, confidence: f32) -> AlertDecision {
        let audio = self.state.try_fire(now);
        if audio {
            self.audio_fired.fetch_add(1, Ordering::Relaxed);
            log::warn!("alert: {} detected (confidence {:.2})", label, confidence);
            self.dispatch_audio();
        }
        AlertDecision {
            visual: true,
            audio,
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Audio alerts granted so far.
    pub fn audio_fired(&self) -> u64 {
        self.audio_fired.load(Ordering::Relaxed)
    }

    /// Audio dispatches whose backend reported an error.
    pub fn audio_failed(&self) -> u64 {
        self.audio_failed.load(Ordering::Relaxed)
    }

    /// Granted alerts not played because the previous sound was still playing.
    pub fn audio_skipped(&self) -> u64 {
        self.audio_skipped.load(Ordering::Relaxed)
    }

    fn dispatch_audio(&self) {
        if self.audio_busy.swap(true, Ordering::AcqRel) {
            self.audio_skipped.fetch_add(1, Ordering::Relaxed);
            log::debug!("alert audio still playing; skipping");
            return;
        }
        let audio = self.audio.clone();
        let busy = self.audio_busy.clone();
        let failed = self.audio_failed.clone();
        let spawned = std::thread::Builder::new()
            .name("alert-audio".to_string())
            .spawn(move || {
                if let Err(err) = audio.play() {
                    failed.fetch_add(1, Ordering::Relaxed);
                    log::debug!("alert audio ({}) failed: {:#}", audio.name(), err);
                }
                busy.store(false, Ordering::Release);
            });
        if let Err(err) = spawned {
            self.audio_busy.store(false, Ordering::Release);
            self.audio_failed.fetch_add(1, Ordering::Relaxed);
            log::debug!("alert audio thread could not start: {}", err);
        }
    }
}
