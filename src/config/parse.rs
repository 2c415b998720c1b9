//! Helpers for reading typed settings out of the process environment.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Value of `key`, or `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Value of `key`; an empty value counts as unset.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// `1`/`true`/`on` and `0`/`false`/`off`, any case. Anything else is `default`.
pub fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "on") => true,
        Some("0" | "false" | "off") => false,
        _ => default,
    }
}

/// `key` parsed through `FromStr`; unset yields `default`, garbage is an error.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    let Some(value) = env_opt(key) else {
        return Ok(default);
    };
    value.parse().map_err(|e: T::Err| ConfigError::Parse {
        key: key.into(),
        error: e.to_string(),
        value,
    })
}

const DURATION_UNITS: [(&str, u64); 4] = [("s", 1), ("m", 60), ("h", 3_600), ("d", 86_400)];

/// Duration such as `250ms`, `30s`, `2m`, `1h`, `1d` or bare seconds.
///
/// `off`, `0` and the empty string mean "disabled" and yield `None`.
pub fn parse_duration(s: &str) -> Result<Option<Duration>, String> {
    let s = s.trim().to_ascii_lowercase();
    if matches!(s.as_str(), "" | "0" | "off") {
        return Ok(None);
    }

    if let Some(millis) = s.strip_suffix("ms") {
        return parse_number(millis).map(|n| Some(Duration::from_millis(n)));
    }
    let (digits, scale) = DURATION_UNITS
        .iter()
        .find_map(|(unit, scale)| s.strip_suffix(unit).map(|d| (d, *scale)))
        .unwrap_or((s.as_str(), 1));

    parse_number(digits).map(|n| Some(Duration::from_secs(n * scale)))
}

fn parse_number(s: &str) -> Result<u64, String> {
    s.parse().map_err(|_| format!("invalid number: {:?}", s))
}

/// Parse environment variable as duration, falling back to `default` when unset or "off".
pub fn env_duration(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let Some(value) = env_opt(key) else {
        return Ok(default);
    };
    match parse_duration(&value) {
        Ok(parsed) => Ok(parsed.unwrap_or(default)),
        Err(error) => Err(ConfigError::Parse {
            key: key.into(),
            value,
            error,
        }),
    }
}
