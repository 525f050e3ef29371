// Live decoding of key-down / key-up events
// Char and word timers segment the input; decoded characters adapt the expected speeds

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::fallback::ClusterFallbackDecoder;
use crate::runtime::{Clock, Scheduler, SystemClock, ThreadScheduler, TimerHandle};
use crate::speed::{Speed, SpeedGroup, FUDGE_FACTOR};
use crate::stats::RollingStats;
use crate::types::{code_string, KeyParams, Signal, Symbol, Token};

/// Receives decoded tokens in the order they were decoded.
///
/// Called with the key's lock held: a listener must not call back into the
/// same key.
pub trait MorseListener: Send + Sync {
    fn morse_received(&self, token: Token);
}

impl<F> MorseListener for F
where
    F: Fn(Token) + Send + Sync,
{
    fn morse_received(&self, token: Token) {
        self(token)
    }
}

/// Drift smaller than this fraction of the current dot is ignored.
const ADAPTIVE_MIN_MOVE: f64 = 0.05;
/// One adaptation step moves the dot by at most this fraction.
const ADAPTIVE_MAX_MOVE: f64 = 0.20;
/// Gap speeds may be at most this much slower than the speed below them.
const ADAPTIVE_DIFFERENCE_LIMIT: f64 = 1.25;
/// The session-gap threshold is never shorter than this many word spaces.
const INTERWORD_HEADROOM: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Char,
    Word,
}

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    handle: TimerHandle,
    generation: u64,
}

struct KeyState {
    pending: Vec<Signal>,
    key_down: bool,
    in_char: bool,
    in_word: bool,
    last_down: Option<Duration>,
    last_up: Option<Duration>,
    last_token: Option<Token>,
    speeds: SpeedGroup,
    floor: SpeedGroup,
    ceiling: SpeedGroup,
    adaptive: bool,
    max_interword: Duration,
    stats: RollingStats,
    char_timer: Option<ArmedTimer>,
    word_timer: Option<ArmedTimer>,
    generation: u64,
}

impl KeyState {
    fn new(speeds: SpeedGroup, floor: SpeedGroup, ceiling: SpeedGroup, adaptive: bool, max_interword: Duration) -> Self {
        let mut state = Self {
            pending: Vec::new(),
            key_down: false,
            in_char: false,
            in_word: false,
            last_down: None,
            last_up: None,
            last_token: None,
            speeds,
            floor,
            ceiling,
            adaptive,
            max_interword,
            stats: RollingStats::new(),
            char_timer: None,
            word_timer: None,
            generation: 0,
        };
        state.clamp_speeds();
        state
    }

    fn max_interword_length(&self) -> Duration {
        let floor = self.speeds.word.space_ms() as f64 * INTERWORD_HEADROOM;
        self.max_interword.max(Duration::from_millis(floor as u64))
    }

    fn clamp_speeds(&mut self) {
        self.speeds = self.speeds.clamp(&self.floor, &self.ceiling);
    }

    fn timer_slot(&mut self, kind: TimerKind) -> &mut Option<ArmedTimer> {
        match kind {
            TimerKind::Char => &mut self.char_timer,
            TimerKind::Word => &mut self.word_timer,
        }
    }

    fn adapt_mark_speed(&mut self) {
        if !self.stats.can_adapt() {
            return;
        }

        // three independent estimates of one dot
        let target = (self.stats.mark_average() + self.stats.dot_average() + self.stats.dash_average() / 3.0) / 3.0;
        if let Some(next) = step_toward(self.speeds.mark, target) {
            debug!(from_ms = self.speeds.mark.dot_ms(), to_ms = next.dot_ms(), target_ms = target, "adapting mark speed");
            self.speeds.mark = next;
        }

        self.clamp_speeds();
    }

    fn adapt_char_speed(&mut self) {
        if !self.stats.can_adapt() {
            return;
        }

        let mark = self.speeds.mark;
        if let Some(bounded) = out_of_band(self.speeds.char, mark) {
            debug!(to_ms = bounded.dot_ms(), "char speed outside band, clamping");
            self.speeds.char = bounded;
        } else {
            let target = band_clamp(self.stats.char_average() / 3.0, mark);
            if let Some(next) = step_toward(self.speeds.char, target) {
                debug!(from_ms = self.speeds.char.dot_ms(), to_ms = next.dot_ms(), target_ms = target, "adapting char speed");
                self.speeds.char = next;
            }
        }

        self.clamp_speeds();
    }

    fn adapt_word_speed(&mut self) {
        if !self.stats.can_adapt() {
            return;
        }

        let char = self.speeds.char;
        if let Some(bounded) = out_of_band(self.speeds.word, char) {
            debug!(to_ms = bounded.dot_ms(), "word speed outside band, clamping");
            self.speeds.word = bounded;
        } else if self.stats.word_average() > 0.0 {
            let target = band_clamp(self.stats.word_average() / 7.0, char);
            if let Some(next) = step_toward(self.speeds.word, target) {
                debug!(from_ms = self.speeds.word.dot_ms(), to_ms = next.dot_ms(), target_ms = target, "adapting word speed");
                self.speeds.word = next;
            }
        }

        self.clamp_speeds();
    }
}

/// One bounded adaptation step from `current` toward a dot of `target_ms`.
/// `None` inside the dead zone.
fn step_toward(current: Speed, target_ms: f64) -> Option<Speed> {
    let dot = current.dot_ms() as f64;
    if target_ms <= 0.0 || (target_ms - dot).abs() <= dot * ADAPTIVE_MIN_MOVE {
        return None;
    }

    let slowest = (dot * (1.0 + ADAPTIVE_MAX_MOVE)) as u32;
    let fastest = (dot * (1.0 - ADAPTIVE_MAX_MOVE)) as u32;
    Some(Speed::from_dot_ms((target_ms.round() as u32).clamp(fastest, slowest)))
}

/// Dot range a gap speed may take relative to the speed below it.
fn band(base: Speed) -> (u32, u32) {
    let low = base.dot_ms();
    let high = (low as f64 * ADAPTIVE_DIFFERENCE_LIMIT) as u32;
    (low, high)
}

fn band_clamp(target_ms: f64, base: Speed) -> f64 {
    let (low, high) = band(base);
    target_ms.clamp(low as f64, high as f64)
}

/// The nearest band edge if `speed` lies outside the band over `base`.
fn out_of_band(speed: Speed, base: Speed) -> Option<Speed> {
    let (low, high) = band(base);
    if speed.dot_ms() > high {
        Some(Speed::from_dot_ms(high))
    } else if speed.dot_ms() < low {
        Some(Speed::from_dot_ms(low))
    } else {
        None
    }
}

fn fudged(ms: u32) -> Duration {
    Duration::from_millis((ms as f64 * FUDGE_FACTOR) as u64)
}

struct Shared {
    state: Mutex<KeyState>,
    dictionary: &'static Dictionary,
    listener: Box<dyn MorseListener>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
}

impl Shared {
    fn down(self: &Arc<Self>, now: Duration) {
        let mut state = self.state.lock();
        if state.key_down {
            trace!("repeated key down ignored");
            return;
        }
        state.key_down = true;
        state.last_down = Some(now);

        if let Some(last_up) = state.last_up {
            let silence = now.saturating_sub(last_up);
            let session_gap = silence >= state.max_interword_length();
            trace!(silence_ms = silence.as_millis() as u64, "key down");

            if !state.pending.is_empty() {
                state.stats.add_mark_silence(silence);
            } else if !state.in_char && state.in_word && state.last_token.is_some() {
                state.stats.add_char_silence(silence);
            } else if !state.in_char && !state.in_word && !session_gap {
                state.stats.add_word_silence(silence);
                if state.adaptive && state.last_token.is_some() {
                    state.adapt_word_speed();
                }
            }

            if session_gap {
                let speeds = state.speeds;
                state.stats.reset(&speeds);
                debug!(silence_ms = silence.as_millis() as u64, "long pause, statistics reset");
            } else {
                state.pending.push(Signal::off(silence));
            }
        }

        self.cancel_timers(&mut state);
        state.in_char = true;
        state.in_word = true;
    }

    fn up(self: &Arc<Self>, now: Duration) {
        let mut state = self.state.lock();
        if !state.key_down {
            trace!("key up without key down ignored");
            return;
        }
        state.key_down = false;

        let mark = now.saturating_sub(state.last_down.unwrap_or(now));
        state.last_up = Some(now);
        state.pending.push(Signal::on(mark));
        trace!(mark_ms = mark.as_millis() as u64, "key up");

        let char_delay = fudged(state.speeds.char.dash_ms());
        let word_delay = fudged(state.speeds.word.space_ms()).max(char_delay);
        self.arm(&mut state, TimerKind::Char, char_delay);
        self.arm(&mut state, TimerKind::Word, word_delay);
    }

    /// Arm a timer of `kind`, superseding any one already in flight.
    fn arm(self: &Arc<Self>, state: &mut KeyState, kind: TimerKind, delay: Duration) {
        state.generation += 1;
        let generation = state.generation;
        let weak: Weak<Shared> = Arc::downgrade(self);
        let handle = self.scheduler.arm(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.fire(kind, generation);
                }
            }),
        );

        if let Some(previous) = state.timer_slot(kind).replace(ArmedTimer { handle, generation }) {
            self.scheduler.cancel(previous.handle);
        }
    }

    fn cancel_timers(&self, state: &mut KeyState) {
        for timer in [state.char_timer.take(), state.word_timer.take()].into_iter().flatten() {
            self.scheduler.cancel(timer.handle);
        }
    }

    fn fire(&self, kind: TimerKind, generation: u64) {
        let mut state = self.state.lock();
        let slot = state.timer_slot(kind);
        if slot.map(|t| t.generation) != Some(generation) {
            trace!(?kind, generation, "stale timer ignored");
            return;
        }
        *slot = None;

        match kind {
            TimerKind::Char => self.handle_char_done(&mut state),
            TimerKind::Word => {
                // the character this space follows goes out first
                if let Some(timer) = state.char_timer.take() {
                    self.scheduler.cancel(timer.handle);
                    self.handle_char_done(&mut state);
                }
                self.handle_word_done(&mut state);
            }
        }
    }

    fn handle_char_done(&self, state: &mut KeyState) {
        state.in_char = false;
        if state.pending.is_empty() {
            return;
        }

        let signal = std::mem::take(&mut state.pending);
        let mark = state.speeds.mark;
        let code: Vec<Symbol> = signal
            .iter()
            .filter(|s| s.on)
            .map(|s| {
                let symbol = mark.classify(s.duration);
                match symbol {
                    Symbol::Dot => state.stats.add_dot(s.duration),
                    Symbol::Dash => state.stats.add_dash(s.duration),
                };
                symbol
            })
            .collect();

        let primary = self.dictionary.lookup(&code);
        let fallback = ClusterFallbackDecoder::new(self.dictionary, mark).decode(&signal, primary);

        match fallback {
            Some(decode) => {
                info!(
                    primary = ?primary,
                    tokens = ?decode.tokens,
                    mark_wpm = decode.speeds.mark.wpm(),
                    "fallback decoder took over, speeds resynchronised"
                );
                for &token in &decode.tokens {
                    self.emit(token);
                }
                state.last_token = decode.tokens.last().copied();
                state.speeds = decode.speeds;
                state.clamp_speeds();
            }
            None => match primary {
                Some(token) => {
                    self.emit(token);
                    state.last_token = Some(token);
                }
                None => {
                    debug!(code = %code_string(&code), "unrecognised pattern dropped");
                    state.last_token = None;
                }
            },
        }

        if state.adaptive && state.last_token.is_some() {
            state.adapt_mark_speed();
            state.adapt_char_speed();
        }
    }

    fn handle_word_done(&self, state: &mut KeyState) {
        state.in_word = false;
        if let Some(Token::Prosign(prosign)) = state.last_token {
            if prosign.implies_boundary() {
                return;
            }
        }
        self.emit(Token::Space);
    }

    fn emit(&self, token: Token) {
        debug!(%token, "decoded");
        self.listener.morse_received(token);
    }
}

/// A Morse key: feed it [`down`](Self::down) / [`up`](Self::up) events and
/// it reports decoded tokens to its listener.
pub struct MorseKey {
    shared: Arc<Shared>,
}

impl MorseKey {
    /// A key with default settings, running on the wall clock with a
    /// background timer thread.
    pub fn new<L: MorseListener + 'static>(listener: L) -> Result<Self> {
        Self::with_params(listener, &KeyParams::default())
    }

    pub fn with_params<L: MorseListener + 'static>(listener: L, params: &KeyParams) -> Result<Self> {
        Self::with_runtime(listener, params, Arc::new(SystemClock::new()), Arc::new(ThreadScheduler::new()))
    }

    /// A key on an injected clock and scheduler.
    pub fn with_runtime<L: MorseListener + 'static>(
        listener: L,
        params: &KeyParams,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let speeds = SpeedGroup::from_wpm(&params.initial_speed)?;
        let floor = SpeedGroup::from_wpm(&params.floor_wpm)?;
        let ceiling = SpeedGroup::from_wpm(&params.ceiling_wpm)?;
        SpeedGroup::check_range(&floor, &ceiling)?;

        let state = KeyState::new(
            speeds,
            floor,
            ceiling,
            params.adaptive,
            Duration::from_millis(params.max_interword_ms),
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                dictionary: Dictionary::shared(),
                listener: Box::new(listener),
                clock,
                scheduler,
            }),
        })
    }

    /// The key was pressed.
    pub fn down(&self) {
        let now = self.shared.clock.now();
        self.shared.down(now);
    }

    /// The key was released.
    pub fn up(&self) {
        let now = self.shared.clock.now();
        self.shared.up(now);
    }

    /// Drop any half-received character and start over from the current
    /// speeds.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        self.shared.cancel_timers(&mut state);
        state.pending.clear();
        state.key_down = false;
        state.in_char = false;
        state.in_word = false;
        state.last_down = None;
        state.last_up = None;
        state.last_token = None;
        let speeds = state.speeds;
        state.stats.reset(&speeds);
    }

    /// Set all three expected speeds.
    pub fn set_speed(&self, speeds: SpeedGroup) {
        let mut state = self.shared.state.lock();
        state.speeds = speeds;
        state.clamp_speeds();
    }

    pub fn set_speed_floor(&self, floor: SpeedGroup) -> Result<()> {
        let mut state = self.shared.state.lock();
        SpeedGroup::check_range(&floor, &state.ceiling)?;
        state.floor = floor;
        state.clamp_speeds();
        Ok(())
    }

    pub fn set_speed_ceiling(&self, ceiling: SpeedGroup) -> Result<()> {
        let mut state = self.shared.state.lock();
        SpeedGroup::check_range(&state.floor, &ceiling)?;
        state.ceiling = ceiling;
        state.clamp_speeds();
        Ok(())
    }

    pub fn set_adaptive(&self, adaptive: bool) {
        self.shared.state.lock().adaptive = adaptive;
    }

    /// Override the session-gap threshold. The effective value never drops
    /// below 1.5 word spaces at the current word speed.
    pub fn set_max_interword_length(&self, length: Duration) {
        self.shared.state.lock().max_interword = length;
    }

    pub fn is_adaptive(&self) -> bool {
        self.shared.state.lock().adaptive
    }

    pub fn speed_group(&self) -> SpeedGroup {
        self.shared.state.lock().speeds
    }

    /// Speed expected of dots, dashes and the silences between them.
    pub fn mark_speed(&self) -> Speed {
        self.speed_group().mark
    }

    /// Speed expected of silences between characters.
    pub fn char_speed(&self) -> Speed {
        self.speed_group().char
    }

    /// Speed expected of silences between words.
    pub fn word_speed(&self) -> Speed {
        self.speed_group().word
    }

    pub fn speed_floor(&self) -> SpeedGroup {
        self.shared.state.lock().floor
    }

    pub fn speed_ceiling(&self) -> SpeedGroup {
        self.shared.state.lock().ceiling
    }

    pub fn max_interword_length(&self) -> Duration {
        self.shared.state.lock().max_interword_length()
    }

    /// Snapshot of the rolling statistics.
    pub fn stats(&self) -> RollingStats {
        self.shared.state.lock().stats.clone()
    }

    pub fn dictionary(&self) -> &'static Dictionary {
        self.shared.dictionary
    }
}

impl Drop for MorseKey {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        self.shared.cancel_timers(&mut state);
    }
}
