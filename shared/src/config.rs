//! Small env-var parsing helpers shared by both binaries' `Config::from_env`,
//! following the "env var, else hard default" style of the teacher's
//! `AppConfig::from_env`.

use std::env;
use std::str::FromStr;

/// Read `key` from the environment, falling back to `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse `key`, falling back to `default` when unset. Returns an
/// error string (suitable for propagating through `Config::from_env`) when
/// the variable is set but fails to parse.
pub fn env_parse_or<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| format!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated list, dropping empty entries.
pub fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a boolean-ish env var ("true"/"1"/"yes", case-insensitive).
pub fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_list_drops_blanks() {
        // SAFETY: tests run single-threaded per-process by default for env mutation purposes here.
        unsafe { std::env::set_var("__SHARED_TEST_LIST", "a, b,,c") };
        assert_eq!(env_list("__SHARED_TEST_LIST"), vec!["a", "b", "c"]);
        unsafe { std::env::remove_var("__SHARED_TEST_LIST") };
    }

    #[test]
    fn env_parse_or_falls_back() {
        unsafe { std::env::remove_var("__SHARED_TEST_PORT") };
        let port: u16 = env_parse_or("__SHARED_TEST_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }
}
