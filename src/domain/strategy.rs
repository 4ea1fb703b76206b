//! Declarative strategy definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::condition::Condition;
use crate::domain::trade::Direction;

/// Which sides a strategy may trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionGate {
    #[default]
    LongShort,
    LongOnly,
    ShortOnly,
}

impl DirectionGate {
    pub fn allows(self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.allows_long(),
            Direction::Short => self.allows_short(),
        }
    }

    pub fn allows_long(self) -> bool {
        matches!(self, DirectionGate::LongShort | DirectionGate::LongOnly)
    }

    pub fn allows_short(self) -> bool {
        matches!(self, DirectionGate::LongShort | DirectionGate::ShortOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DirectionGate::LongShort => "long_short",
            DirectionGate::LongOnly => "long_only",
            DirectionGate::ShortOnly => "short_only",
        }
    }
}

impl fmt::Display for DirectionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirectionGate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long_short" => Ok(DirectionGate::LongShort),
            "long_only" => Ok(DirectionGate::LongOnly),
            "short_only" => Ok(DirectionGate::ShortOnly),
            other => Err(format!(
                "expected long_short, long_only or short_only, got '{other}'"
            )),
        }
    }
}

/// Catalog grouping used by the registry and the catalog projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Trend,
    MeanReversion,
    Breakout,
    VolumeFlow,
    Pattern,
    Regime,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Trend,
        Category::MeanReversion,
        Category::Breakout,
        Category::VolumeFlow,
        Category::Pattern,
        Category::Regime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Trend => "trend",
            Category::MeanReversion => "mean_reversion",
            Category::Breakout => "breakout",
            Category::VolumeFlow => "volume_flow",
            Category::Pattern => "pattern",
            Category::Regime => "regime",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown category '{wanted}'"))
    }
}

/// Immutable declarative bundle replayed by the probe engine.
///
/// Entry lists are conjunctions (an empty list disables that side); exit
/// lists are disjunctions (an empty list never fires). The ATR multipliers
/// are `None` when the corresponding exit mechanism is disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDef {
    pub id: u32,
    pub name: String,
    pub display_name: String,
    pub philosophy: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub direction: DirectionGate,
    pub entry_long: Vec<Condition>,
    pub entry_short: Vec<Condition>,
    pub exit_long: Vec<Condition>,
    pub exit_short: Vec<Condition>,
    pub atr_stop_mult: Option<f64>,
    pub atr_target_mult: Option<f64>,
    pub trailing_atr_mult: Option<f64>,
    pub time_stop_bars: Option<usize>,
    pub required_indicators: Vec<String>,
    pub details: BTreeMap<String, String>,
}

impl StrategyDef {
    /// A long/short strategy with no conditions and every exit disabled.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            display_name: name.clone(),
            name,
            philosophy: String::new(),
            category: Category::default(),
            tags: Vec::new(),
            direction: DirectionGate::default(),
            entry_long: Vec::new(),
            entry_short: Vec::new(),
            exit_long: Vec::new(),
            exit_short: Vec::new(),
            atr_stop_mult: None,
            atr_target_mult: None,
            trailing_atr_mult: None,
            time_stop_bars: None,
            required_indicators: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    pub fn entry_conditions(&self, direction: Direction) -> &[Condition] {
        match direction {
            Direction::Long => &self.entry_long,
            Direction::Short => &self.entry_short,
        }
    }

    pub fn exit_conditions(&self, direction: Direction) -> &[Condition] {
        match direction {
            Direction::Long => &self.exit_long,
            Direction::Short => &self.exit_short,
        }
    }

    /// Whether the gate permits `direction` and that side has entry conditions.
    pub fn can_enter(&self, direction: Direction) -> bool {
        self.direction.allows(direction) && !self.entry_conditions(direction).is_empty()
    }

    /// True if at least one permitted side has entry conditions.
    pub fn has_usable_entry(&self) -> bool {
        self.can_enter(Direction::Long) || self.can_enter(Direction::Short)
    }

    /// Every column any condition reads, including implicit OHLC/ATR inputs.
    pub fn referenced_columns(&self) -> BTreeSet<String> {
        self.entry_long
            .iter()
            .chain(&self.entry_short)
            .chain(&self.exit_long)
            .chain(&self.exit_short)
            .flat_map(Condition::referenced_columns)
            .collect()
    }

    pub fn catalog_record(&self) -> CatalogRecord {
        CatalogRecord {
            id: self.id,
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            philosophy: self.philosophy.clone(),
            category: self.category,
            direction: self.direction,
            details: self.details.clone(),
        }
    }
}

/// Projection of a strategy's metadata for an external catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecord {
    pub id: u32,
    pub name: String,
    pub display_name: String,
    pub philosophy: String,
    pub category: Category,
    pub direction: DirectionGate,
    pub details: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::{above, below, crosses_above};

    fn sample_strategy() -> StrategyDef {
        let mut s = StrategyDef::new(59, "keltner_breakout");
        s.display_name = "Keltner-style Breakout".into();
        s.category = Category::Breakout;
        s.entry_long = vec![crosses_above("close", "kc_upper")];
        s.entry_short = vec![below("close", "kc_lower")];
        s.exit_long = vec![below("close", "ema_20")];
        s.atr_stop_mult = Some(2.0);
        s.atr_target_mult = Some(3.0);
        s.details.insert("exit".into(), "Return to EMA20".into());
        s
    }

    #[test]
    fn new_disables_every_exit() {
        let s = StrategyDef::new(1, "x");
        assert_eq!(s.display_name, "x");
        assert!(s.atr_stop_mult.is_none());
        assert!(s.atr_target_mult.is_none());
        assert!(s.trailing_atr_mult.is_none());
        assert!(s.time_stop_bars.is_none());
        assert!(!s.has_usable_entry());
    }

    #[test]
    fn direction_gate_limits_usable_entries() {
        let mut s = sample_strategy();
        assert!(s.can_enter(Direction::Long));
        assert!(s.can_enter(Direction::Short));

        s.direction = DirectionGate::LongOnly;
        assert!(!s.can_enter(Direction::Short));

        s.entry_long.clear();
        assert!(!s.has_usable_entry());

        s.direction = DirectionGate::ShortOnly;
        assert!(s.has_usable_entry());
    }

    #[test]
    fn gate_and_category_parse() {
        assert_eq!("long_only".parse::<DirectionGate>().unwrap(), DirectionGate::LongOnly);
        assert_eq!(" Short_Only ".parse::<DirectionGate>().unwrap(), DirectionGate::ShortOnly);
        assert!("sideways".parse::<DirectionGate>().is_err());
        assert_eq!("volume_flow".parse::<Category>().unwrap(), Category::VolumeFlow);
        assert!("momentum".parse::<Category>().is_err());
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn referenced_columns_span_all_lists() {
        let mut s = sample_strategy();
        s.exit_short = vec![above("rsi_14", 70.0)];
        let cols = s.referenced_columns();
        for name in ["close", "kc_upper", "kc_lower", "ema_20", "rsi_14"] {
            assert!(cols.contains(name), "missing {name}");
        }
    }

    #[test]
    fn catalog_record_projects_metadata() {
        let record = sample_strategy().catalog_record();
        assert_eq!(record.name, "keltner_breakout");
        assert_eq!(record.display_name, "Keltner-style Breakout");
        assert_eq!(record.category, Category::Breakout);
        assert_eq!(record.direction, DirectionGate::LongShort);
        assert_eq!(record.details.get("exit").map(String::as_str), Some("Return to EMA20"));
    }

    #[test]
    fn strategy_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StrategyDef>();
    }
}
