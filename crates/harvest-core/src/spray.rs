//! # Spray Applications and Chemical Inventory
//!
//! Derived records that the vendor API does not provide directly.
//!
//! ```text
//!  FieldOperation (type ~ "spray" | "application")
//!        │ products[] with a name
//!        ▼
//!  NewSprayApplication { source: vendor }  ── insert-if-absent on
//!                                              (field, product, date, source)
//!
//!  ManualSprayLog ──► NewSprayApplication { source: manual }
//!        └──────────► ChemicalInventoryItem.quantity -= amount  (floor 0)
//! ```
//!
//! Low stock is computed on read and never stored.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::FieldOperation;
use crate::vendor::Fields;

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ChemicalInventoryItem {
    pub id: String,
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: f64,
    pub unit: String,
    /// Zero disables the low-stock flag.
    pub low_stock_threshold: f64,
    pub updated_at: DateTime<Utc>,
}

impl ChemicalInventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.low_stock_threshold > 0.0 && self.quantity <= self.low_stock_threshold
    }
}

/// An inventory row as shown to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemStatus {
    #[serde(flatten)]
    pub item: ChemicalInventoryItem,
    pub is_low_stock: bool,
}

impl From<ChemicalInventoryItem> for InventoryItemStatus {
    fn from(item: ChemicalInventoryItem) -> Self {
        let is_low_stock = item.is_low_stock();
        InventoryItemStatus { item, is_low_stock }
    }
}

/// Add or update an inventory item.
///
/// Items are matched by `id` when given, otherwise by product id, otherwise
/// by product name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryUpdate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub low_stock_threshold: f64,
}

// =============================================================================
// Spray Applications
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SpraySource {
    /// Derived from a synced field operation.
    Vendor,
    /// Logged by hand through the dashboard.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SprayApplication {
    pub id: String,
    pub field_id: String,
    pub product_name: String,
    pub equipment_id: Option<String>,
    pub equipment_name: Option<String>,
    pub operation_id: Option<String>,
    pub amount: Option<f64>,
    pub unit: Option<String>,
    pub application_date: NaiveDate,
    pub source: SpraySource,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A spray application before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSprayApplication {
    pub field_id: String,
    pub product_name: String,
    pub equipment_id: Option<String>,
    pub equipment_name: Option<String>,
    pub operation_id: Option<String>,
    pub amount: Option<f64>,
    pub unit: Option<String>,
    pub application_date: NaiveDate,
    pub source: SpraySource,
    pub notes: Option<String>,
}

/// Manual application entered through the inventory boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSprayLog {
    pub field_id: String,
    pub product_name: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub unit: Option<String>,
    pub application_date: NaiveDate,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub equipment_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ManualSprayLog {
    pub fn to_application(&self) -> NewSprayApplication {
        NewSprayApplication {
            field_id: self.field_id.clone(),
            product_name: self.product_name.clone(),
            equipment_id: self.equipment_id.clone(),
            equipment_name: self.equipment_name.clone(),
            operation_id: None,
            amount: Some(self.amount),
            unit: self.unit.clone(),
            application_date: self.application_date,
            source: SpraySource::Manual,
            notes: self.notes.clone(),
        }
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// Case-insensitive match on "spray" or "application".
pub fn is_spray_operation(operation_type: &str) -> bool {
    let lowered = operation_type.to_lowercase();
    lowered.contains("spray") || lowered.contains("application")
}

/// Spray applications implied by one field operation.
///
/// ## Arguments
/// * `op` - A persisted field operation
/// * `today` - Date used when the operation has no start date
///
/// ## Returns
/// One vendor-sourced application per embedded product with a name; empty
/// when the operation is not a spray.
pub fn derive_spray_applications(op: &FieldOperation, today: NaiveDate) -> Vec<NewSprayApplication> {
    if !is_spray_operation(&op.operation_type) {
        return Vec::new();
    }

    let operation = Fields::new(&op.raw_data);
    let equipment_id = operation.opt_string(&["machine.id", "machines.0.id", "equipment.id"]);
    let equipment_name = operation.opt_string(&["machine.name", "machines.0.name", "equipment.name"]);
    let application_date = op.start_date.map(|d| d.date_naive()).unwrap_or(today);

    let products = op.products.as_array().map(Vec::as_slice).unwrap_or(&[]);
    products
        .iter()
        .filter_map(|product| {
            let f = Fields::new(product);
            let product_name = f.opt_string(&["name", "productName", "product.name"])?;
            Some(NewSprayApplication {
                field_id: op.field_id.clone(),
                product_name,
                equipment_id: equipment_id.clone(),
                equipment_name: equipment_name.clone(),
                operation_id: Some(op.id.clone()),
                amount: f.opt_number(&["rate", "appliedRate", "amount", "totalApplied"]),
                unit: f.opt_string(&["rate.unit", "unit", "rate.unitId", "amount.unit"]),
                application_date,
                source: SpraySource::Vendor,
                notes: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn operation(op_type: &str, products: serde_json::Value) -> FieldOperation {
        FieldOperation {
            id: "op-1".into(),
            field_id: "f1".into(),
            org_id: "org-1".into(),
            operation_type: op_type.into(),
            start_date: Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()),
            end_date: None,
            area: 10.0,
            products,
            measurements: json!({}),
            raw_data: json!({ "machine": { "id": "eq-1", "name": "Sprayer 1" } }),
            synced_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
    }

    #[test]
    fn test_spray_type_matching() {
        assert!(is_spray_operation("Application"));
        assert!(is_spray_operation("cropSpraying"));
        assert!(!is_spray_operation("harvest"));
        assert!(!is_spray_operation(""));
    }

    #[test]
    fn test_derive_from_spray_operation() {
        let op = operation(
            "application",
            json!([
                { "name": "Roundup", "rate": { "value": 1.5, "unit": "gal/ac" } },
                { "rate": { "value": 9.0 } },
                { "productName": "Atrazine" }
            ]),
        );
        let derived = derive_spray_applications(&op, today());
        assert_eq!(derived.len(), 2);

        let roundup = &derived[0];
        assert_eq!(roundup.product_name, "Roundup");
        assert_eq!(roundup.amount, Some(1.5));
        assert_eq!(roundup.unit.as_deref(), Some("gal/ac"));
        assert_eq!(roundup.application_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(roundup.source, SpraySource::Vendor);
        assert_eq!(roundup.equipment_id.as_deref(), Some("eq-1"));
        assert_eq!(roundup.operation_id.as_deref(), Some("op-1"));

        assert_eq!(derived[1].product_name, "Atrazine");
        assert_eq!(derived[1].amount, None);
    }

    #[test]
    fn test_missing_start_date_uses_today() {
        let mut op = operation("spray", json!([{ "name": "Roundup" }]));
        op.start_date = None;
        let derived = derive_spray_applications(&op, today());
        assert_eq!(derived[0].application_date, today());
    }

    #[test]
    fn test_non_spray_operation_derives_nothing() {
        let op = operation("harvest", json!([{ "name": "Corn" }]));
        assert!(derive_spray_applications(&op, today()).is_empty());
    }

    #[test]
    fn test_low_stock() {
        let mut item = ChemicalInventoryItem {
            id: "i1".into(),
            product_id: None,
            product_name: "Roundup".into(),
            quantity: 5.0,
            unit: "gal".into(),
            low_stock_threshold: 5.0,
            updated_at: Utc::now(),
        };
        assert!(item.is_low_stock());
        item.quantity = 5.5;
        assert!(!item.is_low_stock());
        item.quantity = 0.0;
        item.low_stock_threshold = 0.0;
        assert!(!item.is_low_stock());

        let status = InventoryItemStatus::from(item);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isLowStock"], json!(false));
        assert_eq!(json["product_name"], json!("Roundup"));
    }

    #[test]
    fn test_manual_log_to_application() {
        let log: ManualSprayLog = serde_json::from_value(json!({
            "fieldId": "f1",
            "productName": "Roundup",
            "amount": 2.5,
            "applicationDate": "2024-06-02"
        }))
        .unwrap();
        let app = log.to_application();
        assert_eq!(app.source, SpraySource::Manual);
        assert_eq!(app.amount, Some(2.5));
        assert_eq!(app.application_date, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
    }
}
