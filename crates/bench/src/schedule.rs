use std::str::FromStr;

use crate::BenchError;

/// Ordered, non-empty list of positive `maxSteps` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBudgetSchedule {
    budgets: Vec<u32>,
}

impl StepBudgetSchedule {
    /// # Errors
    ///
    /// `BenchError::EmptySchedule` for an empty list and
    /// `BenchError::ZeroBudget` if any entry is zero.
    pub fn new(budgets: Vec<u32>) -> Result<Self, BenchError> {
        if budgets.is_empty() {
            return Err(BenchError::EmptySchedule);
        }
        if let Some(index) = budgets.iter().position(|&b| b == 0) {
            return Err(BenchError::ZeroBudget { index });
        }
        Ok(Self { budgets })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }

    #[must_use]
    pub fn get(&self, stage: usize) -> Option<u32> {
        self.budgets.get(stage).copied()
    }

    #[must_use]
    pub fn first(&self) -> u32 {
        self.budgets[0]
    }

    /// Index of the terminal stage.
    #[must_use]
    pub fn last_stage(&self) -> usize {
        self.budgets.len() - 1
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.budgets
    }
}

impl Default for StepBudgetSchedule {
    fn default() -> Self {
        Self { budgets: vec![10, 20, 40, 80, 160, 320] }
    }
}

/// Parses a comma separated list such as `2,8,32`.
impl FromStr for StepBudgetSchedule {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let budgets = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u32>().map_err(|_| BenchError::Parse(part.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(budgets)
    }
}
