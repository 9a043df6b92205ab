//! Plans offered for sale, keyed by the provider price id.

use serde::Serialize;

pub const DEFAULT_TRIAL_PERIOD_DAYS: u32 = 7;

const CUSTOM_PLAN_NAME: &str = "Custom Plan";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub code: String,
    pub name: String,
    pub price_id: String,
}

#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
    trial_price_id: Option<String>,
    trial_period_days: u32,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>, trial_price_id: Option<String>, trial_period_days: u32) -> Self {
        Self {
            plans,
            trial_price_id,
            trial_period_days,
        }
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// An empty catalog accepts any price id.
    pub fn is_known(&self, price_id: &str) -> bool {
        self.plans.is_empty() || self.plans.iter().any(|p| p.price_id == price_id)
    }

    pub fn display_name(&self, price_id: &str) -> &str {
        self.plans
            .iter()
            .find(|p| p.price_id == price_id)
            .map(|p| p.name.as_str())
            .unwrap_or(CUSTOM_PLAN_NAME)
    }

    pub fn is_trial_eligible_plan(&self, price_id: &str) -> bool {
        self.trial_price_id.as_deref() == Some(price_id)
    }

    pub fn trial_period_days(&self) -> u32 {
        self.trial_period_days
    }
}
