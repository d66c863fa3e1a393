//! Stock level classification.

use serde::{Deserialize, Serialize};

use atelier_core::{DomainError, DomainResult};

/// One named stock range, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub name: String,
    pub min: i64,
    pub max: i64,
}

impl StockLevel {
    pub fn new(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }
}

/// Validated, ordered stock levels that partition `0..`.
///
/// The first level is the "low" level that raises alerts. Stock above the
/// last level's `max` still falls into the last level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StockThresholds {
    levels: Vec<StockLevel>,
}

impl StockThresholds {
    pub fn new(levels: Vec<StockLevel>) -> DomainResult<Self> {
        let Some(first) = levels.first() else {
            return Err(DomainError::validation("at least one stock level is required"));
        };
        if first.min != 0 {
            return Err(DomainError::validation(format!(
                "stock level {} must start at 0",
                first.name
            )));
        }
        for level in &levels {
            if level.name.trim().is_empty() {
                return Err(DomainError::validation("stock level name cannot be empty"));
            }
            if level.min > level.max {
                return Err(DomainError::validation(format!(
                    "stock level {} has min {} above max {}",
                    level.name, level.min, level.max
                )));
            }
        }
        for pair in levels.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.max.checked_add(1) != Some(next.min) {
                return Err(DomainError::validation(format!(
                    "stock levels {} and {} are not contiguous",
                    prev.name, next.name
                )));
            }
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[StockLevel] {
        &self.levels
    }

    pub fn low(&self) -> &StockLevel {
        // Non-empty by construction.
        &self.levels[0]
    }

    pub fn is_low(&self, stock: i64) -> bool {
        stock <= self.low().max
    }

    pub fn level_for(&self, stock: i64) -> &StockLevel {
        self.levels
            .iter()
            .find(|l| stock >= l.min && stock <= l.max)
            .unwrap_or_else(|| if stock < 0 { self.low() } else { self.top() })
    }

    fn top(&self) -> &StockLevel {
        &self.levels[self.levels.len() - 1]
    }
}

impl Default for StockThresholds {
    fn default() -> Self {
        Self {
            levels: vec![
                StockLevel::new("low", 0, 3),
                StockLevel::new("medium", 4, 10),
                StockLevel::new("high", 11, 999),
            ],
        }
    }
}

impl<'de> Deserialize<'de> for StockThresholds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let levels = Vec::<StockLevel>::deserialize(deserializer)?;
        StockThresholds::new(levels).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_levels_classify_stock() {
        let t = StockThresholds::default();
        assert_eq!(t.level_for(0).name, "low");
        assert_eq!(t.level_for(3).name, "low");
        assert_eq!(t.level_for(4).name, "medium");
        assert_eq!(t.level_for(11).name, "high");
        assert_eq!(t.level_for(5_000).name, "high");
        assert!(t.is_low(2));
        assert!(!t.is_low(4));
    }

    #[test]
    fn rejects_gaps_overlaps_and_bad_start() {
        let gap = vec![StockLevel::new("low", 0, 3), StockLevel::new("high", 5, 10)];
        assert!(StockThresholds::new(gap).is_err());

        let overlap = vec![StockLevel::new("low", 0, 3), StockLevel::new("high", 3, 10)];
        assert!(StockThresholds::new(overlap).is_err());

        let late = vec![StockLevel::new("low", 1, 3)];
        assert!(StockThresholds::new(late).is_err());

        let inverted = vec![StockLevel::new("low", 0, -1)];
        assert!(StockThresholds::new(inverted).is_err());

        assert!(StockThresholds::new(vec![]).is_err());
    }

    #[test]
    fn deserialize_validates() {
        let ok: StockThresholds =
            serde_json::from_str(r#"[{"name":"bajo","min":0,"max":2},{"name":"alto","min":3,"max":9}]"#)
                .unwrap();
        assert_eq!(ok.low().name, "bajo");

        let bad = serde_json::from_str::<StockThresholds>(r#"[{"name":"bajo","min":2,"max":5}]"#);
        assert!(bad.is_err());
    }
}
