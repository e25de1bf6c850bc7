//! Cross-pass symbol visibility and fade animation.
//!
//! Placement passes decide which symbols are visible for the current view.
//! Between passes the decisions change, and symbols must fade in and out
//! instead of popping. [`Placement`] keeps the per-symbol opacity state
//! across passes; [`FrameHistory`] records zoom samples so the renderer
//! knows whether it has to keep scheduling frames for a running fade.

use std::collections::{HashMap, VecDeque};

use web_time::{Duration, Instant};

/// Cross-tile stable identity of a symbol.
///
/// Two placements of the same label in different tiles (or in re-parses of
/// the same tile) must fade as one symbol, so the key is built from the
/// layer, the label text and the anchor position rounded to whole tile
/// units in the tile's own coordinate space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    /// Name of the style layer.
    pub layer: String,
    /// Label text, empty for icon-only symbols.
    pub text: String,
    /// Anchor position rounded to whole tile units.
    pub anchor: (i32, i32),
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum FadeState {
    Hidden,
    FadingIn { start: Instant },
    Visible,
    FadingOut { start: Instant },
}

/// Opacity tracking of one symbol.
#[derive(Debug, Clone)]
struct OpacityState {
    state: FadeState,
    seen_in_last_pass: bool,
}

impl OpacityState {
    fn opacity(&self, now: Instant, fade_duration: Duration) -> f32 {
        match self.state {
            FadeState::Hidden => 0.0,
            FadeState::Visible => 1.0,
            FadeState::FadingIn { start } => fade_progress(start, now, fade_duration),
            FadeState::FadingOut { start } => 1.0 - fade_progress(start, now, fade_duration),
        }
    }

    fn is_fading(&self, now: Instant, fade_duration: Duration) -> bool {
        match self.state {
            FadeState::FadingIn { start } | FadeState::FadingOut { start } => {
                now.duration_since(start) < fade_duration
            }
            _ => false,
        }
    }
}

fn fade_progress(start: Instant, now: Instant, duration: Duration) -> f32 {
    if duration.is_zero() {
        return 1.0;
    }

    (now.duration_since(start).as_secs_f64() / duration.as_secs_f64()).min(1.0) as f32
}

/// Tracks symbol visibility across placement passes and drives the opacity
/// ramp of appearing and disappearing symbols.
#[derive(Debug)]
pub struct Placement {
    states: HashMap<SymbolKey, OpacityState, ahash::RandomState>,
    fade_duration: Duration,
}

impl Placement {
    /// Creates a tracker with the given fade duration.
    pub fn new(fade_duration: Duration) -> Self {
        Self {
            states: HashMap::default(),
            fade_duration,
        }
    }

    /// Applies the result of one placement pass.
    ///
    /// `placed` is the set of symbols visible after the pass. Newly placed
    /// symbols start fading in, symbols missing from the set start fading
    /// out, and symbols that finished fading out are forgotten.
    pub fn run_pass(&mut self, placed: impl IntoIterator<Item = SymbolKey>, now: Instant) {
        for state in self.states.values_mut() {
            state.seen_in_last_pass = false;
        }

        for key in placed {
            let state = self.states.entry(key).or_insert(OpacityState {
                state: FadeState::Hidden,
                seen_in_last_pass: false,
            });
            state.seen_in_last_pass = true;

            state.state = match state.state {
                FadeState::Hidden => FadeState::FadingIn { start: now },
                FadeState::FadingOut { start } => FadeState::FadingIn {
                    // Reverse mid-fade from the opacity already reached.
                    start: reversed_fade_start(start, now, self.fade_duration),
                },
                other => promote_finished(other, now, self.fade_duration),
            };
        }

        let fade_duration = self.fade_duration;
        for state in self.states.values_mut() {
            if !state.seen_in_last_pass {
                state.state = match state.state {
                    FadeState::Visible => FadeState::FadingOut { start: now },
                    FadeState::FadingIn { start } => FadeState::FadingOut {
                        start: reversed_fade_start(start, now, fade_duration),
                    },
                    other => other,
                };
            }
        }

        self.states.retain(|_, state| {
            !matches!(state.state, FadeState::Hidden)
                && !matches!(state.state, FadeState::FadingOut { start }
                    if now.duration_since(start) >= fade_duration && !state.seen_in_last_pass)
        });
    }

    /// Current opacity of the symbol, `0` if it is not tracked.
    pub fn opacity(&self, key: &SymbolKey, now: Instant) -> f32 {
        self.states
            .get(key)
            .map(|s| s.opacity(now, self.fade_duration))
            .unwrap_or(0.0)
    }

    /// True while any symbol's fade started less than `duration` ago, which
    /// means the renderer must keep scheduling frames.
    pub fn needs_animation(&self, now: Instant, duration: Duration) -> bool {
        self.states
            .values()
            .any(|s| s.is_fading(now, duration.min(self.fade_duration)))
    }

    /// Number of tracked symbols.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}

fn promote_finished(state: FadeState, now: Instant, fade_duration: Duration) -> FadeState {
    match state {
        FadeState::FadingIn { start } if now.duration_since(start) >= fade_duration => {
            FadeState::Visible
        }
        other => other,
    }
}

fn reversed_fade_start(start: Instant, now: Instant, duration: Duration) -> Instant {
    // A fade reversed at progress `t` continues from progress `1 - t`.
    let elapsed = now.duration_since(start).min(duration);
    now.checked_sub(duration.saturating_sub(elapsed))
        .unwrap_or(now)
}

/// One recorded frame.
#[derive(Debug, Copy, Clone, PartialEq)]
struct FrameSample {
    timestamp: Instant,
    zoom: f64,
}

/// Bounded record of recent `{timestamp, zoom}` samples.
#[derive(Debug)]
pub struct FrameHistory {
    samples: VecDeque<FrameSample>,
    window: Duration,
    last_zoom_change: Option<Instant>,
}

impl FrameHistory {
    /// Creates a history trimmed to the given time window.
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
            last_zoom_change: None,
        }
    }

    /// Appends a sample and trims everything older than the window.
    pub fn record(&mut self, now: Instant, zoom: f64) {
        if let Some(last) = self.samples.back() {
            if last.zoom != zoom {
                self.last_zoom_change = Some(now);
            }
        }

        self.samples.push_back(FrameSample {
            timestamp: now,
            zoom,
        });

        while let Some(front) = self.samples.front() {
            if now.duration_since(front.timestamp) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// True while the zoom changed less than `duration` ago, which keeps the
    /// zoom-dependent fade animation running.
    pub fn needs_animation(&self, now: Instant, duration: Duration) -> bool {
        self.last_zoom_change
            .is_some_and(|at| now.duration_since(at) < duration)
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if no samples are retained.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
