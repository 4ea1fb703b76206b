//! Risk profiles: one scale factor over a strategy's ATR exit distances.

use std::collections::BTreeMap;

use crate::domain::error::ProbeError;
use crate::domain::strategy::StrategyDef;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskProfile {
    pub name: String,
    pub scale: f64,
}

impl RiskProfile {
    pub fn new(name: impl Into<String>, scale: f64) -> Self {
        Self {
            name: name.into(),
            scale,
        }
    }

    pub fn low() -> Self {
        Self::new("low", 0.75)
    }

    pub fn medium() -> Self {
        Self::new("medium", 1.0)
    }

    pub fn high() -> Self {
        Self::new("high", 1.5)
    }

    pub fn presets() -> Vec<RiskProfile> {
        vec![Self::low(), Self::medium(), Self::high()]
    }

    pub fn preset(name: &str) -> Option<RiskProfile> {
        match name {
            "low" => Some(Self::low()),
            "medium" => Some(Self::medium()),
            "high" => Some(Self::high()),
            _ => None,
        }
    }
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self::medium()
    }
}

/// Profile-scaled exit parameters, still in ATR multiples.
///
/// Multipliers that are absent, non-finite or not positive after scaling are
/// dropped, so a present value always describes a usable distance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExitParams {
    pub stop_mult: Option<f64>,
    pub target_mult: Option<f64>,
    pub trailing_mult: Option<f64>,
    pub time_stop_bars: Option<usize>,
}

impl ExitParams {
    pub fn scaled(strategy: &StrategyDef, profile: &RiskProfile) -> Self {
        let scale = |mult: Option<f64>| {
            mult.map(|m| m * profile.scale)
                .filter(|m| m.is_finite() && *m > 0.0)
        };
        Self {
            stop_mult: scale(strategy.atr_stop_mult),
            target_mult: scale(strategy.atr_target_mult),
            trailing_mult: scale(strategy.trailing_atr_mult),
            time_stop_bars: strategy.time_stop_bars.filter(|bars| *bars > 0),
        }
    }
}

/// Named profiles available to a run: the presets plus configured overrides.
#[derive(Debug, Clone)]
pub struct RiskProfileSet {
    profiles: BTreeMap<String, RiskProfile>,
}

impl Default for RiskProfileSet {
    fn default() -> Self {
        Self {
            profiles: RiskProfile::presets()
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }
}

impl RiskProfileSet {
    /// Add or replace a profile.
    pub fn insert(&mut self, profile: RiskProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Result<&RiskProfile, ProbeError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ProbeError::UnknownRiskProfile {
                name: name.to_string(),
            })
    }

    /// Resolve a list of names, preserving order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<RiskProfile>, ProbeError> {
        names
            .iter()
            .map(|name| self.get(name.as_ref().trim()).cloned())
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
