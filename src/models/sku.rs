//! License SKU reference data: the price catalog and synced tenant SKUs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of the price catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuPrice {
    pub sku_id: String,
    pub display_name: String,
    pub monthly_cost: f64,
}

/// Subscribed SKU as synced from Graph `/subscribedSkus`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantSku {
    pub tenant_id: String,
    pub sku_id: String,
    pub sku_part_number: Option<String>,
    pub display_name: Option<String>,
    pub prepaid_units: i32,
    pub synced_at: DateTime<Utc>,
}

/// Static SKU → (display name, monthly cost) table.
#[derive(Debug, Clone, Default)]
pub struct SkuCatalog {
    prices: HashMap<String, SkuPrice>,
}

/// Nonprofit price list used when no catalog file is configured.
const BUILTIN_PRICES: &[(&str, &str, f64)] = &[
    ("06ebc4ee-1bb5-47dd-8120-11324bc54e06", "Microsoft 365 E5 (Nonprofit Staff Pricing)", 22.80),
    ("cbdc14ab-d96c-4c30-b9f4-6ada7cdc1d46", "Microsoft 365 Business Premium (Nonprofit Staff Pricing)", 22.00),
    ("639dec6b-bb19-468b-871c-c5c441c4b0cb", "Microsoft 365 Copilot (Nonprofit Staff Pricing)", 25.50),
    ("efccb6f7-5641-4e0e-bd10-b4976e1bf68e", "Enterprise Mobility + Security E3 (Nonprofit Staff Pricing)", 2.25),
    ("c5928f49-12ba-48f7-ada3-0d743a3601d5", "Visio Plan 2 (Nonprofit Staff Pricing)", 5.00),
    ("c1d032e0-5619-4761-9b5c-75b6831e1711", "Power BI Premium Per User (Nonprofit Staff Pricing)", 3.00),
    ("1f2f344a-700d-42c9-9427-5cea1d5d7ba6", "Microsoft Stream (Nonprofit Staff Pricing)", 0.00),
    ("4755df59-3f73-41ab-a249-596ad72b5504", "Power Automate per user plan (Nonprofit Staff Pricing)", 0.00),
    ("4b74a65c-8b4a-4fc8-9f6b-5177ed11ddfa", "Power Virtual Agents (Nonprofit Staff Pricing)", 0.00),
    ("f30db892-07e9-47e9-837c-80727f46fd3d", "Power Automate Free", 0.00),
    ("0dab259f-bf13-4952-b7f8-7db8f131b28d", "Microsoft Teams Phone Standard (Nonprofit Staff Pricing)", 0.00),
    ("440eaaa8-b3e0-484b-a8be-62870b9ba70a", "Teams Phone Resource Account (Nonprofit Staff Pricing)", 0.00),
    ("606b54a9-78d8-4298-ad8b-df6ef4481c80", "Power Virtual Agents Viral (Nonprofit Staff Pricing)", 0.00),
    ("dcb1a3ae-b33f-4487-846a-a640262fadf4", "Power Apps Viral (Nonprofit Staff Pricing)", 0.00),
    ("295a8eb0-f78d-45c7-8b5b-1eed5ed02dff", "MCOCAP (Microsoft Communications Online Cap)", 0.00),
    ("aa2695c9-8d59-4800-9dc8-12e01f1735af", "Nonprofit Portal (Nonprofit Staff Pricing)", 0.00),
    ("47794cd0-f0e5-45c5-9033-2eb6b5fc84e0", "Teams Communications Credits (Nonprofit Staff Pricing)", 0.00),
    ("3f9f06f5-3c31-472c-985f-62d9c10ec167", "Power Pages vTrial for Makers", 0.00),
    ("6ee9b90c-0a7a-46c4-bc96-6698aa3bf8d2", "SharePoint Advanced Management Plan 1 (Nonprofit Staff Pricing)", 0.00),
    ("eda1941c-3c4f-4995-b5eb-e85a42175ab9", "Power Automate Attended RPA (Nonprofit Staff Pricing)", 0.00),
    ("52ea0e27-ae73-4983-a08f-13561ebdb823", "Teams Premium (for Departments)", 0.00),
    ("8c4ce438-32a7-4ac5-91a6-e22ae08d9c8b", "Azure Rights Management (Nonprofit Staff Pricing)", 0.00),
    ("5b631642-bd26-49fe-bd20-1daaa972ef80", "Power Apps Developer (Nonprofit Staff Pricing)", 0.00),
    ("18181a46-0d4e-45cd-891e-60aabd171b4e", "Office 365 E1 (Nonprofit Staff Pricing)", 0.00),
];

impl SkuCatalog {
    pub fn new(prices: impl IntoIterator<Item = SkuPrice>) -> Self {
        Self {
            prices: prices
                .into_iter()
                .map(|price| (price.sku_id.clone(), price))
                .collect(),
        }
    }

    /// The built-in nonprofit price list.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_PRICES.iter().map(|(id, name, cost)| SkuPrice {
            sku_id: id.to_string(),
            display_name: name.to_string(),
            monthly_cost: *cost,
        }))
    }

    /// Monthly cost of a SKU; unknown SKUs cost nothing.
    pub fn monthly_cost(&self, sku_id: &str) -> f64 {
        self.prices
            .get(sku_id)
            .map(|price| price.monthly_cost)
            .unwrap_or(0.0)
    }

    /// Display name: catalog, then a synced tenant SKU, then the raw id.
    pub fn display_name(&self, sku_id: &str, tenant_skus: &[TenantSku]) -> String {
        if let Some(price) = self.prices.get(sku_id) {
            return price.display_name.clone();
        }
        tenant_skus
            .iter()
            .find(|sku| sku.sku_id == sku_id || sku.sku_part_number.as_deref() == Some(sku_id))
            .and_then(|sku| {
                sku.display_name
                    .clone()
                    .or_else(|| sku.sku_part_number.clone())
            })
            .unwrap_or_else(|| sku_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant_sku(id: &str, part: Option<&str>, name: Option<&str>) -> TenantSku {
        TenantSku {
            tenant_id: "t1".to_string(),
            sku_id: id.to_string(),
            sku_part_number: part.map(str::to_string),
            display_name: name.map(str::to_string),
            prepaid_units: 0,
            synced_at: Utc::now(),
        }
    }

    #[test]
    fn builtin_catalog_has_known_prices() {
        let catalog = SkuCatalog::builtin();
        assert_eq!(catalog.len(), BUILTIN_PRICES.len());
        assert_eq!(
            catalog.monthly_cost("06ebc4ee-1bb5-47dd-8120-11324bc54e06"),
            22.80
        );
    }

    #[test]
    fn unknown_sku_costs_zero_and_keeps_raw_id() {
        let catalog = SkuCatalog::builtin();
        assert_eq!(catalog.monthly_cost("not-a-sku"), 0.0);
        assert_eq!(catalog.display_name("not-a-sku", &[]), "not-a-sku");
    }

    #[test]
    fn display_name_falls_back_to_tenant_sku() {
        let catalog = SkuCatalog::default();
        let skus = vec![
            tenant_sku("a", Some("SPE_E3"), None),
            tenant_sku("b", Some("FLOW_FREE"), Some("Power Automate Free")),
        ];
        assert_eq!(catalog.display_name("a", &skus), "SPE_E3");
        assert_eq!(catalog.display_name("b", &skus), "Power Automate Free");
        assert_eq!(catalog.display_name("FLOW_FREE", &skus), "Power Automate Free");
    }
}
