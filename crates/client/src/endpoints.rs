//! Endpoint catalog — the only place that knows remote URL shapes.
//!
//! Everything above this speaks [`Target`]s; everything below it is the
//! station backend's URL surface. Query values are percent-encoded.

use serde_json::Value;
use url::form_urlencoded;

use crate::fetch::Target;

/// Builds fetch targets against a station backend base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

fn query(pairs: &[(&str, &str)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get(&self, path: &str, pairs: &[(&str, &str)]) -> Target {
        Target::get(format!("{}{}?{}", self.base, path, query(pairs)))
    }

    /// Full tracking history for one shipment.
    pub fn tracking_info(&self, shipment: &str) -> Target {
        self.get(
            "/api/fleet_order/order/detail/tracking_info",
            &[("shipment_id", shipment)],
        )
    }

    /// Trade (item/SKU) detail for one shipment.
    pub fn trade_info(&self, shipment: &str) -> Target {
        self.get(
            "/api/fleet_order/order/detail/trade_info",
            &[("shipment_id", shipment)],
        )
    }

    /// Unmasked field lookup for one shipment. `extra` carries field-specific
    /// qualifiers, e.g. the SKU id when `data_field` is `name`.
    pub fn sensitive_data(&self, shipment: &str, data_field: &str, extra: &[(&str, &str)]) -> Target {
        let mut pairs = vec![("shipment_id", shipment), ("data_field", data_field)];
        pairs.extend_from_slice(extra);
        self.get("/api/fleet_order/order/detail/show_sensitive_data", &pairs)
    }

    /// Every order on a transfer order, in one oversized page.
    pub fn outbound_order_search(&self, transfer_order: &str) -> Target {
        self.get(
            "/api/in-station/general_to/outbound/order/search",
            &[("pageno", "1"), ("count", "1000000"), ("to_number", transfer_order)],
        )
    }

    /// Assignment/operator detail for one audit target.
    pub fn assignment_detail(&self, target: &str) -> Target {
        self.get(
            "/spx_delivery/admin/assignment/assignment_task/detail",
            &[("assignment_task_id", target)],
        )
    }

    /// All audit targets under a validation task.
    pub fn target_list_by_task(&self, task: &str) -> Target {
        self.get(
            "/api/in-station/lmhub/audit/target/list",
            &[("page_no", "1"), ("count", "9999"), ("task_id", task)],
        )
    }

    /// Audit targets that touched one shipment within a task — the
    /// cross-reference lookup behind corrected-binding resolution.
    pub fn target_list_by_shipment(&self, task: &str, shipment: &str) -> Target {
        self.get(
            "/api/in-station/lmhub/audit/target/list",
            &[
                ("shipment_id", shipment),
                ("task_id", task),
                ("page_no", "1"),
                ("count", "24"),
            ],
        )
    }

    /// Binding/operator view of one audit target.
    pub fn target_view(&self, task: &str, target: &str) -> Target {
        self.get(
            "/api/in-station/lmhub/audit/target/view",
            &[
                ("validation_task_id", task),
                ("target_id", target),
                ("audit_target_type", "2"),
            ],
        )
    }

    /// One page of missing-class parcels. `result=5` is the server-side
    /// filter for missing outcomes.
    pub fn parcel_list_missing(
        &self,
        task: &str,
        target: &str,
        target_type: i64,
        page_no: usize,
        count: usize,
    ) -> Target {
        self.get(
            "/api/in-station/lmhub/audit/parcel/list",
            &[
                ("validation_task_id", task),
                ("target_id", target),
                ("audit_target_type", &target_type.to_string()),
                ("page_no", &page_no.to_string()),
                ("count", &count.to_string()),
                ("result", "5"),
                ("shipment_id", ""),
            ],
        )
    }

    /// One page of missort-class parcels. `parcel_scan_status=2` is the
    /// server-side filter for scanned/mismatched parcels; callers apply the
    /// confirmed-status filter on top of it.
    pub fn parcel_list_missort(
        &self,
        task: &str,
        target: &str,
        target_type: i64,
        page_no: usize,
        count: usize,
    ) -> Target {
        self.get(
            "/api/in-station/lmhub/audit/parcel/list",
            &[
                ("validation_task_id", task),
                ("target_id", target),
                ("audit_target_type", &target_type.to_string()),
                ("page_no", &page_no.to_string()),
                ("count", &count.to_string()),
                ("parcel_scan_status", "2"),
            ],
        )
    }

    /// POST search used by lookups that page through tracking records.
    pub fn tracking_list_search(&self, body: Value) -> Target {
        Target::post(
            format!("{}/api/fleet_order/order/tracking_list/search", self.base),
            body,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::new("https://hub.example.com/")
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let t = endpoints().tracking_info("BR1");
        assert!(t.url.starts_with("https://hub.example.com/api/"));
    }

    #[test]
    fn query_values_are_encoded() {
        let t = endpoints().outbound_order_search("TO1 &2");
        assert!(t.url.contains("to_number=TO1+%262"));
    }

    #[test]
    fn sensitive_data_appends_field_qualifiers() {
        let t = endpoints().sensitive_data("BR9", "name", &[("id", "123456")]);
        assert!(t.url.contains("/show_sensitive_data?"));
        assert!(t.url.contains("shipment_id=BR9"));
        assert!(t.url.contains("data_field=name"));
        assert!(t.url.contains("id=123456"));
    }

    #[test]
    fn trade_info_is_shipment_scoped() {
        let t = endpoints().trade_info("BR9");
        assert!(t.url.contains("/trade_info?shipment_id=BR9"));
    }

    #[test]
    fn missing_page_carries_result_filter() {
        let t = endpoints().parcel_list_missing("VT1", "AT1", 2, 3, 200);
        assert!(t.url.contains("result=5"));
        assert!(t.url.contains("page_no=3"));
        assert!(t.url.contains("count=200"));
        assert!(t.url.contains("audit_target_type=2"));
        assert!(!t.url.contains("parcel_scan_status"));
    }

    #[test]
    fn missort_page_carries_scan_status_filter() {
        let t = endpoints().parcel_list_missort("VT1", "AT1", 2, 1, 200);
        assert!(t.url.contains("parcel_scan_status=2"));
        assert!(!t.url.contains("result=5"));
    }

    #[test]
    fn shipment_scoped_target_list() {
        let t = endpoints().target_list_by_shipment("VT1", "BR9");
        assert!(t.url.contains("shipment_id=BR9"));
        assert!(t.url.contains("task_id=VT1"));
        assert!(t.url.contains("count=24"));
    }
}
