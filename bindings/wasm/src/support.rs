// Support utilities for WASM bindings
use std::time::Duration;

use morsekey_core::MorseError;
use serde::de::DeserializeOwned;

/// Parse a JSON config, filling omitted fields with defaults.
/// An empty string or `{}` yields the default; malformed JSON is an error.
pub fn parse_config<T: DeserializeOwned + Default>(config_json: &str) -> Result<T, MorseError> {
    if config_json.trim().is_empty() || config_json.trim() == "{}" {
        Ok(T::default())
    } else {
        Ok(serde_json::from_str::<T>(config_json)?)
    }
}

/// A JavaScript timestamp in milliseconds as an offset from time zero.
/// Negative and non-finite values clamp to zero.
pub fn millis_to_duration(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

/// Generate a WASM function wrapper that parses its JSON config and calls a
/// core function.
///
/// Usage:
/// ```ignore
/// wasm_fn! {
///     pub fn function_name(text: &str, config_json: &str) -> Result<OutputType, JsValue>
///     with core_function, ConfigType, |value| OutputType { value }
/// }
/// ```
#[macro_export]
macro_rules! wasm_fn {
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident($text:ident: &str, $config:ident: &str)
        -> Result<$result:ty, JsValue>
        with $core_fn:path, $config_type:ty, $result_wrapper:expr
    ) => {
        #[wasm_bindgen]
        $(#[$meta])*
        $vis fn $name($text: &str, $config: &str) -> Result<$result, JsValue> {
            let params = $crate::support::parse_config::<$config_type>($config).map_err($crate::to_js_error)?;
            $core_fn($text, &params)
                .map($result_wrapper)
                .map_err($crate::to_js_error)
        }
    };
}
