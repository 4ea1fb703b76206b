//! In-memory strategy catalog keyed by id and name.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::info;

use crate::domain::error::ProbeError;
use crate::domain::strategy::{Category, StrategyDef};

/// Strategies are stored behind `Arc` so runs on other threads can hold them
/// without cloning condition trees.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    by_id: BTreeMap<u32, Arc<StrategyDef>>,
    by_name: HashMap<String, u32>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy. Ids and names must both be unique.
    pub fn register(&mut self, strategy: StrategyDef) -> Result<Arc<StrategyDef>, ProbeError> {
        if let Some(existing) = self.by_id.get(&strategy.id) {
            return Err(ProbeError::DuplicateStrategyId {
                id: strategy.id,
                name: strategy.name,
                existing: existing.name.clone(),
            });
        }
        if let Some(&existing) = self.by_name.get(&strategy.name) {
            return Err(ProbeError::DuplicateStrategyName {
                name: strategy.name,
                id: strategy.id,
                existing,
            });
        }
        let strategy = Arc::new(strategy);
        self.by_name.insert(strategy.name.clone(), strategy.id);
        self.by_id.insert(strategy.id, Arc::clone(&strategy));
        Ok(strategy)
    }

    /// Register every strategy, stopping at the first collision.
    pub fn register_all(
        &mut self,
        strategies: impl IntoIterator<Item = StrategyDef>,
    ) -> Result<usize, ProbeError> {
        let mut count = 0;
        for strategy in strategies {
            self.register(strategy)?;
            count += 1;
        }
        info!(count, total = self.len(), "registered strategies");
        Ok(count)
    }

    pub fn get(&self, id: u32) -> Option<Arc<StrategyDef>> {
        self.by_id.get(&id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<StrategyDef>> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// All strategies in id order.
    pub fn all(&self) -> Vec<Arc<StrategyDef>> {
        self.by_id.values().cloned().collect()
    }

    pub fn by_category(&self, category: Category) -> Vec<Arc<StrategyDef>> {
        self.by_id
            .values()
            .filter(|s| s.category == category)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: u32, name: &str, category: Category) -> StrategyDef {
        let mut s = StrategyDef::new(id, name);
        s.category = category;
        s
    }

    fn sample_registry() -> StrategyRegistry {
        let mut reg = StrategyRegistry::new();
        reg.register_all([
            def(7, "rsi_reversion", Category::MeanReversion),
            def(2, "ema_cross", Category::Trend),
            def(59, "keltner_breakout", Category::Breakout),
            def(3, "macd_trend", Category::Trend),
        ])
        .unwrap();
        reg
    }

    #[test]
    fn all_sorted_by_id() {
        let ids: Vec<u32> = sample_registry().all().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3, 7, 59]);
    }

    #[test]
    fn lookup_by_id_and_name() {
        let reg = sample_registry();
        assert_eq!(reg.get(59).unwrap().name, "keltner_breakout");
        assert_eq!(reg.get_by_name("ema_cross").unwrap().id, 2);
        assert!(reg.get(1).is_none());
        assert!(reg.get_by_name("nope").is_none());
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn by_category_filters() {
        let reg = sample_registry();
        let trend: Vec<u32> = reg.by_category(Category::Trend).iter().map(|s| s.id).collect();
        assert_eq!(trend, vec![2, 3]);
        assert!(reg.by_category(Category::Pattern).is_empty());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut reg = sample_registry();
        let err = reg.register(def(7, "other", Category::Trend)).unwrap_err();
        match err {
            ProbeError::DuplicateStrategyId { id, name, existing } => {
                assert_eq!(id, 7);
                assert_eq!(name, "other");
                assert_eq!(existing, "rsi_reversion");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = sample_registry();
        let err = reg.register(def(8, "ema_cross", Category::Trend)).unwrap_err();
        assert!(matches!(
            err,
            ProbeError::DuplicateStrategyName { id: 8, existing: 2, .. }
        ));
        assert!(reg.get(8).is_none());
    }
}
