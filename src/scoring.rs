//! Folding rule outcomes into category and overall scores

use crate::rules::{AuditResults, RuleCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Point budget per category
///
/// Defaults to the fixed budgets 35/25/20/15/5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryWeights(BTreeMap<RuleCategory, u32>);

impl Default for CategoryWeights {
    fn default() -> Self {
        Self(
            RuleCategory::ALL
                .iter()
                .map(|category| (*category, category.budget()))
                .collect(),
        )
    }
}

impl CategoryWeights {
    pub fn new(weights: BTreeMap<RuleCategory, u32>) -> Self {
        Self(weights)
    }

    /// Budget of `category`, 0 if it has none
    pub fn get(&self, category: RuleCategory) -> u32 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleCategory, u32)> + '_ {
        self.0.iter().map(|(category, weight)| (*category, *weight))
    }
}

/// Normalized scores of one audit, each in `0..=100`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub overall: u32,
    pub per_category: BTreeMap<RuleCategory, u32>,
}

pub struct ScoreAggregator;

impl ScoreAggregator {
    /// Computes per-category and overall scores
    ///
    /// A category scores `round(100 × points / budget)`, capped at 100; a zero
    /// budget scores 0.
    /// The overall score is the budget-weighted mean of the category scores.
    /// Results for rules missing from `rule_categories` are ignored.
    pub fn compute_scores(
        results: &AuditResults,
        rule_categories: &HashMap<String, RuleCategory>,
        weights: &CategoryWeights,
    ) -> ScoreSummary {
        let mut points: BTreeMap<RuleCategory, u32> = BTreeMap::new();
        for (rule_id, result) in results {
            let Some(category) = rule_categories.get(rule_id) else {
                tracing::debug!("No category for rule {}; not scored", rule_id);
                continue;
            };
            *points.entry(*category).or_insert(0) += result.score;
        }

        let per_category: BTreeMap<RuleCategory, u32> = weights
            .iter()
            .map(|(category, budget)| {
                let earned = points.get(&category).copied().unwrap_or(0);
                (category, percent(earned, budget))
            })
            .collect();

        let total = weights.total();
        let overall = if total == 0 {
            0
        } else {
            let weighted: f64 = weights
                .iter()
                .map(|(category, budget)| {
                    let score = per_category.get(&category).copied().unwrap_or(0);
                    f64::from(score) * f64::from(budget)
                })
                .sum();
            (weighted / f64::from(total)).round() as u32
        };

        ScoreSummary {
            overall,
            per_category,
        }
    }
}

fn percent(earned: u32, budget: u32) -> u32 {
    if budget == 0 {
        return 0;
    }
    let score = (f64::from(earned) * 100.0 / f64::from(budget)).round() as u32;
    score.min(100)
}
