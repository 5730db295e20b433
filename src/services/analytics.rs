//! Waste and cost analytics over the latest user set.
//!
//! Two waste totals are produced on purpose. The organization KPI sums each
//! user's waste once, while the SKU table sums per license and so counts a
//! user once per wasted SKU. The two are reported side by side and never
//! reconciled.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::models::sku::{SkuCatalog, TenantSku};
use crate::models::user::CanonicalUser;

const MONTHS_PER_YEAR: f64 = 12.0;

/// Inputs of the waste predicate.
#[derive(Debug, Clone, Copy)]
pub struct WastePolicy {
    pub now: DateTime<Utc>,
    pub threshold_days: i64,
}

impl WastePolicy {
    pub fn new(now: DateTime<Utc>, threshold_days: i64) -> Self {
        Self {
            now,
            threshold_days,
        }
    }

    /// Active, licensed and not signed in for at least the threshold.
    /// A missing sign-in always counts as inactive.
    pub fn is_waste(&self, user: &CanonicalUser) -> bool {
        if !user.status.is_active() || user.licenses.is_empty() {
            return false;
        }
        match user.last_sign_in {
            None => true,
            // A threshold too large to represent is never reached.
            Some(last) => TimeDelta::try_days(self.threshold_days)
                .is_some_and(|threshold| self.now.signed_duration_since(last) >= threshold),
        }
    }
}

/// Per-SKU rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuAnalytics {
    pub sku_id: String,
    pub display_name: String,
    pub assigned_count: u32,
    pub total_annual_cost: f64,
    pub waste_count: u32,
    pub total_waste: f64,
}

/// Monthly and annual figures for a single user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCost {
    pub monthly_cost: f64,
    pub monthly_waste: f64,
    pub annual_waste: f64,
}

/// Organization-level KPIs plus the SKU table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_users: usize,
    pub licensed_users: usize,
    pub wasted_users: usize,
    pub threshold_days: i64,
    pub total_annual_spend: f64,
    /// Sum of per-user annual waste; each user counted once.
    pub total_annual_waste: f64,
    /// Sum of `totalWaste` over the SKU table.
    pub sku_table_waste: f64,
    pub waste_percent: f64,
    pub skus: Vec<SkuAnalytics>,
}

pub fn user_cost(user: &CanonicalUser, catalog: &SkuCatalog, policy: &WastePolicy) -> UserCost {
    let monthly_cost: f64 = user
        .licenses
        .iter()
        .map(|sku| catalog.monthly_cost(sku))
        .sum();
    let monthly_waste = if policy.is_waste(user) {
        monthly_cost
    } else {
        0.0
    };
    UserCost {
        monthly_cost,
        monthly_waste,
        annual_waste: monthly_waste * MONTHS_PER_YEAR,
    }
}

/// SKU table: SKUs held by at least one user, by annual cost descending.
pub fn sku_table(
    users: &[CanonicalUser],
    catalog: &SkuCatalog,
    tenant_skus: &[TenantSku],
    policy: &WastePolicy,
) -> Vec<SkuAnalytics> {
    let mut counts: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for user in users {
        let wasted = policy.is_waste(user);
        for sku in &user.licenses {
            let entry = counts.entry(sku.as_str()).or_default();
            entry.0 += 1;
            if wasted {
                entry.1 += 1;
            }
        }
    }

    let mut table: Vec<SkuAnalytics> = counts
        .into_iter()
        .map(|(sku_id, (assigned_count, waste_count))| {
            let annual_unit = catalog.monthly_cost(sku_id) * MONTHS_PER_YEAR;
            SkuAnalytics {
                sku_id: sku_id.to_string(),
                display_name: catalog.display_name(sku_id, tenant_skus),
                assigned_count,
                total_annual_cost: f64::from(assigned_count) * annual_unit,
                waste_count,
                total_waste: f64::from(waste_count) * annual_unit,
            }
        })
        .collect();

    table.sort_by(|a, b| {
        b.total_annual_cost
            .total_cmp(&a.total_annual_cost)
            .then_with(|| a.sku_id.cmp(&b.sku_id))
    });
    table
}

pub fn summarize(
    users: &[CanonicalUser],
    catalog: &SkuCatalog,
    tenant_skus: &[TenantSku],
    policy: &WastePolicy,
) -> CostSummary {
    let mut total_annual_spend = 0.0;
    let mut total_annual_waste = 0.0;
    let mut wasted_users = 0;

    for user in users {
        let cost = user_cost(user, catalog, policy);
        total_annual_spend += cost.monthly_cost * MONTHS_PER_YEAR;
        total_annual_waste += cost.annual_waste;
        if policy.is_waste(user) {
            wasted_users += 1;
        }
    }

    let skus = sku_table(users, catalog, tenant_skus, policy);
    let sku_table_waste = skus.iter().map(|sku| sku.total_waste).sum();

    CostSummary {
        total_users: users.len(),
        licensed_users: users.iter().filter(|u| !u.licenses.is_empty()).count(),
        wasted_users,
        threshold_days: policy.threshold_days,
        total_annual_spend,
        total_annual_waste,
        sku_table_waste,
        waste_percent: waste_percent(total_annual_waste, total_annual_spend),
        skus,
    }
}

/// Share of spend that is waste, capped at 1. Zero when nothing is spent.
pub fn waste_percent(annual_waste: f64, annual_spend: f64) -> f64 {
    if annual_spend <= 0.0 {
        return 0.0;
    }
    (annual_waste / annual_spend).min(1.0)
}
