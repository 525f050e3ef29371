// WebAssembly bindings for signal generation and key decoding
use std::sync::Arc;

use crossbeam_channel::Receiver;
use js_sys::Array;
use morsekey_core::types::*;
use morsekey_core::{Clock, MorseError, MorseKey, VirtualTime};
use wasm_bindgen::prelude::*;

mod support;

pub fn to_js_error(e: MorseError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// JavaScript-compatible result types
#[wasm_bindgen]
pub struct SignalResult {
    signals: Vec<Signal>,
}

#[wasm_bindgen]
impl SignalResult {
    #[wasm_bindgen(getter)]
    pub fn length(&self) -> usize {
        self.signals.len()
    }

    /// `[{on, durationMs}, ...]`
    #[wasm_bindgen(getter)]
    pub fn signals(&self) -> Result<Array, JsValue> {
        let array = Array::new();
        for signal in &self.signals {
            let obj = js_sys::Object::new();
            js_sys::Reflect::set(&obj, &"on".into(), &signal.on.into())?;
            js_sys::Reflect::set(&obj, &"durationMs".into(), &signal.millis().into())?;
            array.push(&obj);
        }
        Ok(array)
    }

    #[wasm_bindgen(getter, js_name = totalMs)]
    pub fn total_ms(&self) -> f64 {
        self.signals.iter().map(Signal::millis).sum()
    }
}

#[wasm_bindgen]
pub struct DecodeResult {
    tokens: Vec<Token>,
}

#[wasm_bindgen]
impl DecodeResult {
    #[wasm_bindgen(getter)]
    pub fn text(&self) -> String {
        self.tokens.iter().map(Token::to_string).collect()
    }

    #[wasm_bindgen(getter)]
    pub fn tokens(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.tokens)?)
    }

    #[wasm_bindgen(getter)]
    pub fn length(&self) -> usize {
        self.tokens.len()
    }
}

// Main JavaScript API functions

wasm_fn! {
    pub fn generate_morse_signal(text: &str, config_json: &str) -> Result<SignalResult, JsValue>
    with morsekey_core::morse_signal, GeneratorParams, |signals| SignalResult { signals }
}

#[wasm_bindgen]
pub fn decode_morse_signals(signals_json: &str, config_json: &str) -> Result<DecodeResult, JsValue> {
    let signals = morsekey_core::signals_from_json(signals_json).map_err(to_js_error)?;
    let params = support::parse_config::<KeyParams>(config_json).map_err(to_js_error)?;

    morsekey_core::decode_signals(&signals, &params)
        .map(|tokens| DecodeResult { tokens })
        .map_err(to_js_error)
}

/// A live key driven by JavaScript timestamps.
///
/// Timers only fire when the page reports the time, so call `poll` from an
/// animation frame or interval to collect tokens as they complete.
#[wasm_bindgen(js_name = MorseKey)]
pub struct MorseKeyJs {
    time: Arc<VirtualTime>,
    key: MorseKey,
    tokens: Receiver<Token>,
}

#[wasm_bindgen(js_class = MorseKey)]
impl MorseKeyJs {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<MorseKeyJs, JsValue> {
        let params = support::parse_config::<KeyParams>(config_json).map_err(to_js_error)?;
        let time = Arc::new(VirtualTime::new());
        let (tx, tokens) = crossbeam_channel::unbounded();
        let key = MorseKey::with_runtime(
            move |token: Token| {
                let _ = tx.send(token);
            },
            &params,
            time.clone(),
            time.clone(),
        )
        .map_err(to_js_error)?;

        Ok(MorseKeyJs { time, key, tokens })
    }

    pub fn down(&self, now_ms: f64) {
        self.catch_up(now_ms);
        self.key.down();
    }

    pub fn up(&self, now_ms: f64) {
        self.catch_up(now_ms);
        self.key.up();
    }

    /// Fire any timers due by `now_ms` and return the text decoded since the
    /// last poll.
    pub fn poll(&self, now_ms: f64) -> String {
        self.catch_up(now_ms);
        self.tokens.try_iter().map(|t| t.to_string()).collect()
    }

    pub fn reset(&self) {
        self.key.reset();
    }

    #[wasm_bindgen(getter)]
    pub fn adaptive(&self) -> bool {
        self.key.is_adaptive()
    }

    #[wasm_bindgen(setter)]
    pub fn set_adaptive(&self, adaptive: bool) {
        self.key.set_adaptive(adaptive);
    }

    #[wasm_bindgen(getter, js_name = markWpm)]
    pub fn mark_wpm(&self) -> f64 {
        self.key.mark_speed().wpm()
    }

    #[wasm_bindgen(getter, js_name = charWpm)]
    pub fn char_wpm(&self) -> f64 {
        self.key.char_speed().wpm()
    }

    #[wasm_bindgen(getter, js_name = wordWpm)]
    pub fn word_wpm(&self) -> f64 {
        self.key.word_speed().wpm()
    }
}

impl MorseKeyJs {
    fn catch_up(&self, now_ms: f64) {
        let now = support::millis_to_duration(now_ms);
        if now < self.time.now() {
            web_sys::console::warn_1(&format!("MorseKey: timestamp {now_ms} ms is in the past, ignored").into());
            return;
        }
        self.time.advance_to(now);
    }
}
