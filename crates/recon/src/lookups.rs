//! Single-purpose lookup reports over the same fetch machinery.
//!
//! These are the simpler siblings of the audit pipeline: one batch fan-out
//! per run, one row (or row group) per input code, lookup misses rendered
//! as empty fields.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use lastmile_client::{run_batch, Endpoints, ResourceFetcher};
use lastmile_core::ids::{classify, dedup_preserving_order, parse_codes, IdClass};
use lastmile_core::time::format_epoch;
use lastmile_core::{AuditError, Config, Report};

use crate::model::scalar_string;

/// Status lookups log progress every Nth completion.
const LOOKUP_LOG_EVERY: usize = 10;

/// The returns report caps its input batch to keep one run bounded.
const RETURNS_MAX_IDS: usize = 200;

/// One node of a shipment's tracking tree. The event/status fields arrive
/// as strings or numbers depending on the record's age, so they stay raw.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TrackingNode {
    #[serde(default)]
    pub station_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub event_type: Value,
    #[serde(default)]
    pub event_code: Value,
    #[serde(default)]
    pub biz_code: Value,
    #[serde(default)]
    pub status_text: Value,
    #[serde(default)]
    pub children: Vec<TrackingNode>,
}

/// Flatten a tracking tree depth-first, parents before children.
pub fn flatten_tracking(nodes: Vec<TrackingNode>) -> Vec<TrackingNode> {
    fn walk(nodes: Vec<TrackingNode>, out: &mut Vec<TrackingNode>) {
        for mut node in nodes {
            let children = std::mem::take(&mut node.children);
            out.push(node);
            walk(children, out);
        }
    }
    let mut out = Vec::new();
    walk(nodes, &mut out);
    out
}

fn tracking_nodes(response: &Value) -> Vec<TrackingNode> {
    let nodes: Vec<TrackingNode> =
        serde_json::from_value(response["data"]["tracking_list"].clone()).unwrap_or_default();
    flatten_tracking(nodes)
}

fn latest(nodes: &[TrackingNode]) -> Option<&TrackingNode> {
    nodes.iter().max_by_key(|n| n.timestamp)
}

/// Contents of every `[...]` group in a message, in order.
fn bracket_groups(message: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut rest = message;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) => {
                groups.push(&after[..close]);
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    groups
}

/// First bracketed assignment-target id in a message, canonicalized.
fn assignment_id(message: &str) -> Option<String> {
    bracket_groups(message)
        .into_iter()
        .map(str::to_uppercase)
        .find(|g| IdClass::AssignmentTarget.matches(g))
}

/// Whether a node records the shipment entering an assignment task.
fn is_assignment_event(node: &TrackingNode) -> bool {
    let status = format!(
        "{} {} {} {}",
        scalar_string(&node.event_type),
        scalar_string(&node.event_code),
        scalar_string(&node.biz_code),
        scalar_string(&node.status_text),
    )
    .to_lowercase();
    status.contains("lmhub_assign")
        || node
            .message
            .to_lowercase()
            .contains("pedido em processamento na assignment task")
}

/// Whether a message is an on-hold notice ("Pedido em espera: ...").
fn is_on_hold_notice(message: &str) -> bool {
    let lower = message.trim_start().to_lowercase();
    match lower.strip_prefix("pedido em espera") {
        Some(rest) => rest.trim_start().starts_with(':'),
        None => false,
    }
}

/// Extract the transfer order and linehaul task from a return-flow message
/// ("Parcel [TO...] added into LH Task [...]" and its variant spelling).
fn parse_return_binding(message: &str) -> Option<(String, String)> {
    let tail = message.split("LH Task [").nth(1)?;
    let lh = tail.split(']').next()?.trim().to_string();
    if lh.is_empty() {
        return None;
    }
    let to = bracket_groups(message)
        .into_iter()
        .map(str::to_uppercase)
        .find(|g| IdClass::TransferOrder.matches(g))?;
    Some((to, lh))
}

#[derive(Debug, Clone, Deserialize, Default)]
struct OutboundOrder {
    #[serde(default)]
    sls_tracking_number: String,
    #[serde(default)]
    shipment_id: Value,
    #[serde(default)]
    fleet_order_id: Value,
    #[serde(default)]
    station_name: String,
    #[serde(default)]
    third_party_sorting_code: String,
    #[serde(default)]
    status: Value,
    #[serde(default)]
    receiver_name: String,
    #[serde(default)]
    ctime: i64,
    #[serde(default)]
    mtime: i64,
}

impl OutboundOrder {
    fn shipment(&self) -> String {
        if !self.sls_tracking_number.is_empty() {
            return self.sls_tracking_number.clone();
        }
        let shipment = scalar_string(&self.shipment_id);
        if !shipment.is_empty() {
            return shipment;
        }
        scalar_string(&self.fleet_order_id)
    }
}

/// List every shipment on each transfer order, one row per shipment.
/// A transfer order with no orders still gets one (mostly empty) row.
pub async fn transfer_order_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let tos = classify(raw, IdClass::TransferOrder);
    if tos.is_empty() {
        return Err(AuditError::NoValidInput { expected: "transfer order" });
    }
    info!(count = tos.len(), "transfer-order lookup started");

    let jobs: Vec<_> = tos.iter().map(|to| endpoints.outbound_order_search(to)).collect();
    let outcomes = run_batch(fetcher, &jobs, config.fetch_concurrency, |done, total, _| {
        info!(done, total, "transfer orders");
    })
    .await;

    let mut report = Report::new(&[
        "TO",
        "BR",
        "station_name",
        "third_party_sorting_code",
        "status",
        "receiver_name",
        "ctime",
        "mtime",
    ]);
    for (to, outcome) in tos.iter().zip(outcomes) {
        let orders: Vec<OutboundOrder> = match outcome {
            Ok(response) => crate::model::decode_list(&response),
            Err(_) => Vec::new(),
        };
        if orders.is_empty() {
            report.push_row(vec![to.clone(), String::new(), String::new(), String::new(),
                String::new(), String::new(), String::new(), String::new()]);
            continue;
        }
        for order in orders {
            report.push_row(vec![
                to.clone(),
                order.shipment(),
                order.station_name.clone(),
                order.third_party_sorting_code.clone(),
                scalar_string(&order.status),
                order.receiver_name.clone(),
                format_epoch(order.ctime),
                format_epoch(order.mtime),
            ]);
        }
    }
    Ok(report)
}

fn shipment_ids(raw: &str) -> Result<Vec<String>, AuditError> {
    let ids = classify(raw, IdClass::Shipment);
    if ids.is_empty() {
        return Err(AuditError::NoValidInput { expected: "shipment" });
    }
    Ok(ids)
}

/// Latest tracking message per shipment.
pub async fn last_status_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let ids = shipment_ids(raw)?;
    info!(count = ids.len(), "last-status lookup started");

    let jobs: Vec<_> = ids.iter().map(|id| endpoints.tracking_info(id)).collect();
    let outcomes = run_batch(fetcher, &jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "last status");
        }
    })
    .await;

    let mut report = Report::new(&["BR", "RESULTADO"]);
    for (id, outcome) in ids.iter().zip(outcomes) {
        let message = match outcome {
            Ok(response) => latest(&tracking_nodes(&response))
                .map(|node| node.message.clone())
                .unwrap_or_default(),
            Err(_) => String::new(),
        };
        report.push_row(vec![id.clone(), message]);
    }
    Ok(report)
}

/// Most recent station per shipment, from the paged tracking search.
pub async fn last_station_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let ids = shipment_ids(raw)?;
    info!(count = ids.len(), "last-station lookup started");

    let jobs: Vec<_> = ids
        .iter()
        .map(|id| {
            endpoints.tracking_list_search(json!({
                "shipment_id": id,
                "count": 24,
                "page_no": 1,
            }))
        })
        .collect();
    let outcomes = run_batch(fetcher, &jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "last station");
        }
    })
    .await;

    let mut report = Report::new(&["BR", "RESULTADO"]);
    for (id, outcome) in ids.iter().zip(outcomes) {
        let station = outcome
            .ok()
            .and_then(|response| {
                response["data"]["list"]
                    .get(0)
                    .and_then(|first| first["station_name"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        report.push_row(vec![id.clone(), station]);
    }
    Ok(report)
}

/// Hours each shipment spent at the configured station: the span between
/// its first and last tracking event there, to two decimals with a comma
/// separator (the format operators paste into their spreadsheets).
pub async fn station_aging_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let ids = shipment_ids(raw)?;
    info!(count = ids.len(), station = %config.station, "aging lookup started");

    let jobs: Vec<_> = ids.iter().map(|id| endpoints.tracking_info(id)).collect();
    let outcomes = run_batch(fetcher, &jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "aging");
        }
    })
    .await;

    let mut report = Report::new(&["BR", "RESULTADO"]);
    for (id, outcome) in ids.iter().zip(outcomes) {
        let aging = outcome
            .ok()
            .map(|response| tracking_nodes(&response))
            .map(|nodes| {
                let hits: Vec<&TrackingNode> = nodes
                    .iter()
                    .filter(|n| n.station_name == config.station && n.timestamp > 0)
                    .collect();
                match (hits.iter().map(|n| n.timestamp).min(), hits.iter().map(|n| n.timestamp).max()) {
                    (Some(first), Some(last)) if last >= first => {
                        let hours = (last - first) as f64 / 3600.0;
                        format!("{:.2} h", hours).replace('.', ",")
                    }
                    _ => String::new(),
                }
            })
            .unwrap_or_default();
        report.push_row(vec![id.clone(), aging]);
    }
    Ok(report)
}

/// Latest assignment-task id per shipment, read from tracking messages.
///
/// A node counts when its event/status fields mark an assignment transition
/// (or the message says so in so many words) and the message carries a
/// bracketed assignment-target id. The newest such node wins.
pub async fn last_assignment_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let ids = shipment_ids(raw)?;
    info!(count = ids.len(), "last-assignment lookup started");

    let jobs: Vec<_> = ids.iter().map(|id| endpoints.tracking_info(id)).collect();
    let outcomes = run_batch(fetcher, &jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "last assignment");
        }
    })
    .await;

    let mut report = Report::new(&["BR", "RESULTADO"]);
    for (id, outcome) in ids.iter().zip(outcomes) {
        let assignment = match outcome {
            Ok(response) => {
                let nodes: Vec<TrackingNode> = tracking_nodes(&response)
                    .into_iter()
                    .filter(|n| is_assignment_event(n) && assignment_id(&n.message).is_some())
                    .collect();
                latest(&nodes)
                    .and_then(|node| assignment_id(&node.message))
                    .unwrap_or_default()
            }
            Err(_) => String::new(),
        };
        report.push_row(vec![id.clone(), assignment]);
    }
    Ok(report)
}

/// Most recent on-hold reason per shipment: the last bracketed segment of
/// the newest "Pedido em espera" tracking message.
pub async fn on_hold_reason_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let ids = shipment_ids(raw)?;
    info!(count = ids.len(), "on-hold lookup started");

    let jobs: Vec<_> = ids.iter().map(|id| endpoints.tracking_info(id)).collect();
    let outcomes = run_batch(fetcher, &jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "on-hold");
        }
    })
    .await;

    let mut report = Report::new(&["BR", "RESULTADO"]);
    for (id, outcome) in ids.iter().zip(outcomes) {
        let reason = match outcome {
            Ok(response) => {
                let holds: Vec<TrackingNode> = tracking_nodes(&response)
                    .into_iter()
                    .filter(|n| is_on_hold_notice(&n.message))
                    .collect();
                latest(&holds)
                    .and_then(|node| {
                        bracket_groups(&node.message)
                            .last()
                            .map(|g| g.trim().to_string())
                    })
                    .unwrap_or_default()
            }
            Err(_) => String::new(),
        };
        report.push_row(vec![id.clone(), reason]);
    }
    Ok(report)
}

/// Chronological station history per shipment, consecutive repeats
/// collapsed and joined with `>`.
pub async fn station_history_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let ids = shipment_ids(raw)?;
    info!(count = ids.len(), "station-history lookup started");

    let jobs: Vec<_> = ids.iter().map(|id| endpoints.tracking_info(id)).collect();
    let outcomes = run_batch(fetcher, &jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "station history");
        }
    })
    .await;

    let mut report = Report::new(&["BR", "RESULTADO"]);
    for (id, outcome) in ids.iter().zip(outcomes) {
        let history = match outcome {
            Ok(response) => {
                let mut nodes = tracking_nodes(&response);
                nodes.sort_by_key(|n| n.timestamp);
                let mut sequence: Vec<String> = Vec::new();
                for node in nodes {
                    if node.station_name.is_empty() {
                        continue;
                    }
                    if sequence.last().map(String::as_str) != Some(node.station_name.as_str()) {
                        sequence.push(node.station_name);
                    }
                }
                sequence.join(" > ")
            }
            Err(_) => String::new(),
        };
        report.push_row(vec![id.clone(), history]);
    }
    Ok(report)
}

/// Declared item name per shipment: a two-stage fan-out. Trade info yields
/// the first SKU id; only shipments with one get the second, unmasking
/// request for the name field.
pub async fn item_name_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let ids = shipment_ids(raw)?;
    info!(count = ids.len(), "item-name lookup started");

    let trade_jobs: Vec<_> = ids.iter().map(|id| endpoints.trade_info(id)).collect();
    let trades = run_batch(fetcher, &trade_jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "trade info");
        }
    })
    .await;

    let mut request_index = Vec::new();
    let mut name_jobs = Vec::new();
    for (i, outcome) in trades.iter().enumerate() {
        let sku = match outcome {
            Ok(response) => scalar_string(&response["data"]["sku_list"][0]["id"]),
            Err(_) => String::new(),
        };
        if !sku.is_empty() {
            request_index.push(i);
            name_jobs.push(endpoints.sensitive_data(&ids[i], "name", &[("id", sku.as_str())]));
        }
    }
    info!(count = name_jobs.len(), "resolving item names");

    let mut names = vec![String::new(); ids.len()];
    let outcomes = run_batch(fetcher, &name_jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "item names");
        }
    })
    .await;
    for (k, outcome) in outcomes.into_iter().enumerate() {
        if let Ok(response) = outcome {
            names[request_index[k]] = scalar_string(&response["data"]["data_detail"]);
        }
    }

    let mut report = Report::new(&["BR", "RESULTADO"]);
    for (id, name) in ids.into_iter().zip(names) {
        report.push_row(vec![id, name]);
    }
    Ok(report)
}

/// Transfer order and linehaul task each return parcel was added to, taken
/// from the newest matching tracking message at the configured station.
/// Accepts current and legacy shipment ids, capped per run.
pub async fn returns_report(
    fetcher: &dyn ResourceFetcher,
    endpoints: &Endpoints,
    config: &Config,
    raw: &str,
) -> Result<Report, AuditError> {
    let mut ids = dedup_preserving_order(
        parse_codes(raw)
            .into_iter()
            .filter(|c| {
                IdClass::Shipment.matches(c) || IdClass::LegacyShipment.matches(c)
            })
            .collect(),
    );
    if ids.is_empty() {
        return Err(AuditError::NoValidInput { expected: "shipment" });
    }
    ids.truncate(RETURNS_MAX_IDS);
    info!(count = ids.len(), station = %config.station, "returns lookup started");

    let jobs: Vec<_> = ids.iter().map(|id| endpoints.tracking_info(id)).collect();
    let outcomes = run_batch(fetcher, &jobs, config.fetch_concurrency, |done, total, _| {
        if done % LOOKUP_LOG_EVERY == 0 {
            info!(done, total, "returns");
        }
    })
    .await;

    let mut report = Report::new(&["SPX TN", "DATA", "TO", "LH"]);
    for (id, outcome) in ids.iter().zip(outcomes) {
        let row = match outcome {
            Ok(response) => {
                let hits: Vec<TrackingNode> = tracking_nodes(&response)
                    .into_iter()
                    .filter(|n| {
                        n.station_name == config.station
                            && parse_return_binding(&n.message).is_some()
                    })
                    .collect();
                match latest(&hits) {
                    Some(node) => {
                        let (to, lh) = parse_return_binding(&node.message)
                            .unwrap_or_default();
                        vec![id.clone(), format_epoch(node.timestamp), to, lh]
                    }
                    None => vec![id.clone(), String::new(), String::new(), String::new()],
                }
            }
            Err(_) => vec![id.clone(), String::new(), String::new(), String::new()],
        };
        report.push_row(row);
    }
    Ok(report)
}
