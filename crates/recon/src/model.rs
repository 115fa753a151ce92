//! Typed views of the remote payloads and the pipeline's own records.
//!
//! The backend's JSON is loosely shaped — fields come and go per record.
//! Every payload struct maps absent fields to explicit defaults at decode
//! time instead of threading optionality through the pipeline.

use serde::Deserialize;
use serde_json::Value;

/// The two defect classes an audit target can exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectKind {
    Missing,
    Missort,
}

impl DefectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DefectKind::Missing => "missing",
            DefectKind::Missort => "missort",
        }
    }
}

/// An audit target discovered under a validation task.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditTarget {
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub audit_target_type: i64,
    #[serde(default)]
    pub missing_qty: i64,
    #[serde(default)]
    pub missort_qty: i64,
}

impl AuditTarget {
    /// Target type with the backend's implicit default applied.
    pub fn effective_type(&self) -> i64 {
        if self.audit_target_type == 0 {
            2
        } else {
            self.audit_target_type
        }
    }

    /// Whether this target has anything to reconcile.
    pub fn has_defects(&self) -> bool {
        self.missing_qty > 0 || self.missort_qty > 0
    }
}

/// One parcel entry from an audit parcel page.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ParcelItem {
    #[serde(default)]
    pub shipment_id: String,
    #[serde(default)]
    pub validation_status: i64,
}

/// A target entry from the shipment-scoped target list; carries the
/// route/entity binding used for cross-reference resolution.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TargetBinding {
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub binding_entity: String,
}

/// Assignment/operator enrichment payload.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssignmentDetail {
    #[serde(default)]
    pub assigned_time: i64,
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default)]
    pub driver_name: String,
}

/// Target-view enrichment payload.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TargetView {
    #[serde(default)]
    pub binding_entity: String,
    #[serde(default)]
    pub validation_operator: String,
}

/// One accumulated parcel awaiting join: which task and target it came
/// from, what kind of defect, and the shipment involved.
#[derive(Debug, Clone)]
pub struct ParcelRow {
    pub task: String,
    pub target: String,
    pub kind: DefectKind,
    pub shipment: String,
}

/// The terminal joined output row.
#[derive(Debug, Clone)]
pub struct AuditRow {
    pub assigned_at: String,
    pub task: String,
    pub target: String,
    pub shipment: String,
    pub observed_binding: String,
    pub corrected_binding: String,
    pub operator: String,
    pub driver_id: String,
    pub driver_name: String,
    pub defect: String,
}

/// Report header, in the order operators expect from the original tool.
pub const AUDIT_HEADER: [&str; 10] = [
    "DATA_HORA",
    "VT",
    "AT",
    "BR",
    "ROTA_ENCONTRADA",
    "ROTA_CORRETA",
    "OPERADOR",
    "DRIVER_ID",
    "DRIVER_NAME",
    "TIPO_DE_ERRO",
];

impl AuditRow {
    pub fn into_fields(self) -> Vec<String> {
        vec![
            self.assigned_at,
            self.task,
            self.target,
            self.shipment,
            self.observed_binding,
            self.corrected_binding,
            self.operator,
            self.driver_id,
            self.driver_name,
            self.defect,
        ]
    }
}

/// Decode the `data.list` array of a response into typed records,
/// tolerating an absent or oddly shaped list as empty.
pub fn decode_list<T: for<'de> Deserialize<'de>>(response: &Value) -> Vec<T> {
    response["data"]["list"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Decode the `data` object of a response, falling back to defaults when
/// the payload is absent or malformed.
pub fn decode_data<T: for<'de> Deserialize<'de> + Default>(response: &Value) -> T {
    serde_json::from_value(response["data"].clone()).unwrap_or_default()
}

/// Render a loosely typed scalar field (the backend emits some ids and
/// statuses as either strings or numbers) for report output.
pub fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
