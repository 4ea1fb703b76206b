//! Strategy file validation.
//!
//! Typed readers for `[strategy.<name>]` and `[risk_profiles]` sections. Every
//! reader reports the offending section and key so a bad file can be fixed
//! without guessing.

use std::collections::BTreeMap;

use crate::domain::condition::Condition;
use crate::domain::condition_parser::parse_list;
use crate::domain::error::ProbeError;
use crate::domain::strategy::{Category, DirectionGate};
use crate::ports::config_port::ConfigPort;

pub const STRATEGY_SECTION_PREFIX: &str = "strategy.";
pub const RISK_PROFILE_SECTION: &str = "risk_profiles";
pub const DETAIL_KEY_PREFIX: &str = "detail.";

pub const CONDITION_KEYS: [&str; 4] = ["entry_long", "entry_short", "exit_long", "exit_short"];

const STRATEGY_KEYS: [&str; 15] = [
    "id",
    "display_name",
    "philosophy",
    "category",
    "tags",
    "direction",
    "entry_long",
    "entry_short",
    "exit_long",
    "exit_short",
    "atr_stop_mult",
    "atr_target_mult",
    "trailing_atr_mult",
    "time_stop_bars",
    "required_indicators",
];

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ProbeError {
    ProbeError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Value of `key`, trimmed, or `None` when absent or blank.
fn non_blank(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// All strategy section names, sorted.
pub fn strategy_sections(config: &dyn ConfigPort) -> Vec<String> {
    config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(STRATEGY_SECTION_PREFIX))
        .collect()
}

/// Strategy name encoded in a section header: `strategy.ema_cross` -> `ema_cross`.
pub fn strategy_name(section: &str) -> Result<&str, ProbeError> {
    match section.strip_prefix(STRATEGY_SECTION_PREFIX) {
        Some(name) if !name.trim().is_empty() => Ok(name.trim()),
        _ => Err(invalid(section, "", "section must be named strategy.<name>")),
    }
}

/// Structural checks on a strategy section: a usable name, a present id and
/// no unrecognised keys.
pub fn validate_strategy_section(config: &dyn ConfigPort, section: &str) -> Result<(), ProbeError> {
    strategy_name(section)?;
    if non_blank(config, section, "id").is_none() {
        return Err(ProbeError::ConfigMissing {
            section: section.to_string(),
            key: "id".to_string(),
        });
    }
    for key in config.keys(section) {
        if !STRATEGY_KEYS.contains(&key.as_str()) && !key.starts_with(DETAIL_KEY_PREFIX) {
            return Err(invalid(section, &key, "unknown key"));
        }
    }
    Ok(())
}

pub fn strategy_id(config: &dyn ConfigPort, section: &str) -> Result<u32, ProbeError> {
    let raw = non_blank(config, section, "id").ok_or_else(|| ProbeError::ConfigMissing {
        section: section.to_string(),
        key: "id".to_string(),
    })?;
    raw.parse::<u32>()
        .map_err(|_| invalid(section, "id", format!("id must be a non-negative integer, got '{raw}'")))
}

pub fn direction_gate(config: &dyn ConfigPort, section: &str) -> Result<DirectionGate, ProbeError> {
    match non_blank(config, section, "direction") {
        None => Ok(DirectionGate::default()),
        Some(raw) => raw.parse().map_err(|reason: String| invalid(section, "direction", reason)),
    }
}

pub fn category(config: &dyn ConfigPort, section: &str) -> Result<Category, ProbeError> {
    match non_blank(config, section, "category") {
        None => Ok(Category::default()),
        Some(raw) => raw.parse().map_err(|reason: String| invalid(section, "category", reason)),
    }
}

/// Optional ATR multiple. Absent, blank or `none` disables the mechanism;
/// anything else must be a positive finite number.
pub fn atr_multiplier(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, ProbeError> {
    let raw = match non_blank(config, section, key) {
        None => return Ok(None),
        Some(raw) if raw.eq_ignore_ascii_case("none") => return Ok(None),
        Some(raw) => raw,
    };
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
        _ => Err(invalid(
            section,
            key,
            format!("{key} must be a positive number, got '{raw}'"),
        )),
    }
}

pub fn time_stop_bars(config: &dyn ConfigPort, section: &str) -> Result<Option<usize>, ProbeError> {
    let raw = match non_blank(config, section, "time_stop_bars") {
        None => return Ok(None),
        Some(raw) if raw.eq_ignore_ascii_case("none") => return Ok(None),
        Some(raw) => raw,
    };
    match raw.parse::<usize>() {
        Ok(v) if v >= 1 => Ok(Some(v)),
        _ => Err(invalid(
            section,
            "time_stop_bars",
            format!("time_stop_bars must be at least 1, got '{raw}'"),
        )),
    }
}

/// `;`-separated condition list. A parse failure carries the caret-annotated
/// source line.
pub fn condition_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<Condition>, ProbeError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(Vec::new());
    };
    parse_list(&raw).map_err(|e| ProbeError::InvalidCondition {
        section: section.to_string(),
        key: key.to_string(),
        detail: e.display_with_context(&raw),
    })
}

/// Comma-separated list, trimmed, blanks dropped.
pub fn string_list(config: &dyn ConfigPort, section: &str, key: &str) -> Vec<String> {
    config
        .get_string(section, key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Free-form `detail.<name>` entries, keyed by `<name>`.
pub fn details(config: &dyn ConfigPort, section: &str) -> BTreeMap<String, String> {
    config
        .keys(section)
        .into_iter()
        .filter_map(|key| {
            let name = key.strip_prefix(DETAIL_KEY_PREFIX)?.to_string();
            let value = config.get_string(section, &key).unwrap_or_default();
            Some((name, value.trim().to_string()))
        })
        .collect()
}

/// `[risk_profiles]` entries as `(name, scale)`, sorted by name. Scales must
/// be positive and finite.
pub fn risk_profile_scales(config: &dyn ConfigPort) -> Result<Vec<(String, f64)>, ProbeError> {
    config
        .keys(RISK_PROFILE_SECTION)
        .into_iter()
        .map(|name| {
            let raw = non_blank(config, RISK_PROFILE_SECTION, &name).unwrap_or_default();
            match raw.parse::<f64>() {
                Ok(scale) if scale.is_finite() && scale > 0.0 => Ok((name, scale)),
                _ => Err(invalid(
                    RISK_PROFILE_SECTION,
                    &name,
                    format!("risk scale must be a positive number, got '{raw}'"),
                )),
            }
        })
        .collect()
}
