use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::dispute::{
    DisputeValidation, DisputedItem, NormalizedDisputedItem, SnapshotItem,
};
use crate::models::receipt::ReceiptItem;
use crate::similarity::normalize_key;

static EVIDENCE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://.+\.(jpg|jpeg|png|gif|pdf|mp4|mov)$").expect("valid regex")
});

const NAME_FIELDS: [&str; 6] = ["name", "itemName", "description", "title", "item", "productName"];
const QTY_FIELDS: [&str; 3] = ["qty", "quantity", "count"];
const PRICE_FIELDS: [&str; 3] = ["unitPrice", "price", "amount"];
const NOTE_FIELDS: [&str; 3] = ["notes", "note", "details"];

/// Builds the confirmed-items snapshot from loosely shaped item JSON
/// (receipt items, vendor confirmations, customer edits). Entries without a
/// usable name are dropped; prices are dollar amounts converted to cents.
pub fn build_items_snapshot(raw: &Value) -> Vec<SnapshotItem> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let item = entry.as_object()?;
            let name = first_str(item, &NAME_FIELDS)?;

            let explicit_key = ["itemKey", "id"]
                .iter()
                .find_map(|field| item.get(*field).and_then(Value::as_str))
                .map(str::trim)
                .filter(|key| !key.is_empty());
            let item_key = match explicit_key {
                Some(key) => key.to_string(),
                None => default_item_key(&name, index),
            };

            Some(SnapshotItem {
                item_key,
                name,
                qty: pick_qty(item),
                unit_price_cents: pick_unit_price_cents(item),
                notes: first_str(item, &NOTE_FIELDS),
            })
        })
        .collect()
}

/// Snapshot taken straight from OCR-extracted receipt lines, used when the
/// customer confirms without editing the item list.
pub fn snapshot_from_receipt_items(items: &[ReceiptItem]) -> Vec<SnapshotItem> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.name.trim().is_empty())
        .map(|(index, item)| SnapshotItem {
            item_key: default_item_key(&item.name, index),
            name: item.name.trim().to_string(),
            qty: item.quantity.max(1),
            unit_price_cents: Some(item.price_cents).filter(|price| *price >= 0),
            notes: None,
        })
        .collect()
}

pub fn validate_disputed_items_against_snapshot(
    snapshot: &[SnapshotItem],
    disputed_items: &[DisputedItem],
) -> DisputeValidation {
    let mut by_key = HashMap::new();
    let mut by_name = HashMap::new();
    for item in snapshot {
        by_key.insert(normalize_key(&item.item_key), item);
        by_name.insert(normalize_key(&item.name), item);
    }

    let mut errors = Vec::new();
    let mut normalized = Vec::new();

    for (index, disputed) in disputed_items.iter().enumerate() {
        let lookup = normalize_key(&disputed.item_id_or_name);
        let Some(matched) = by_key.get(&lookup).or_else(|| by_name.get(&lookup)) else {
            errors.push(format!(
                "disputedItems[{index}] does not match any confirmed item: \"{}\"",
                disputed.item_id_or_name.trim()
            ));
            continue;
        };

        if disputed.qty_disputed == 0 {
            errors.push(format!("disputedItems[{index}] qtyDisputed must be at least 1"));
            continue;
        }

        if disputed.qty_disputed > matched.qty {
            errors.push(format!(
                "disputedItems[{index}] qtyDisputed exceeds confirmed quantity ({} > {})",
                disputed.qty_disputed, matched.qty
            ));
            continue;
        }

        normalized.push(NormalizedDisputedItem {
            item_key: matched.item_key.clone(),
            name: matched.name.clone(),
            qty_disputed: disputed.qty_disputed,
            reason: disputed.reason,
            details: disputed
                .details
                .as_deref()
                .map(str::trim)
                .filter(|details| !details.is_empty())
                .map(str::to_string),
        });
    }

    DisputeValidation {
        valid: errors.is_empty(),
        normalized,
        errors,
    }
}

pub fn requires_evidence_for_dispute(items: &[NormalizedDisputedItem]) -> bool {
    items.iter().any(|item| item.reason.needs_evidence())
}

/// A dispute without an explicit receipt confirmation, or one that needs
/// evidence and has none, cannot be adjudicated yet.
pub fn should_mark_needs_info_for_dispute(
    customer_confirmed: bool,
    items: &[NormalizedDisputedItem],
    evidence_urls: &[String],
) -> bool {
    if !customer_confirmed {
        return true;
    }
    requires_evidence_for_dispute(items) && evidence_urls.is_empty()
}

/// Returns the evidence URLs that are not http(s) links to an image, video
/// or PDF.
pub fn invalid_evidence_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .filter(|url| !EVIDENCE_URL_RE.is_match(url.trim()))
        .cloned()
        .collect()
}

fn first_str(item: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    let raw = first_present(item, fields)?;
    let trimmed = raw.as_str()?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// First field holding a non-null value; a `null` falls through to the next
/// alias.
fn first_present<'a>(item: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .find_map(|field| item.get(*field).filter(|value| !value.is_null()))
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}

fn pick_qty(item: &Map<String, Value>) -> u32 {
    first_present(item, &QTY_FIELDS)
        .and_then(as_number)
        .filter(|qty| *qty > 0.0)
        .map(|qty| qty.round().clamp(1.0, f64::from(u32::MAX)) as u32)
        .unwrap_or(1)
}

fn pick_unit_price_cents(item: &Map<String, Value>) -> Option<i64> {
    first_present(item, &PRICE_FIELDS)
        .and_then(as_number)
        .filter(|price| *price >= 0.0)
        .map(|price| (price * 100.0).round() as i64)
}

fn default_item_key(name: &str, index: usize) -> String {
    let cleaned: String = normalize_key(name)
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect();
    let base = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    let base = if base.is_empty() { "item" } else { base.as_str() };

    format!("{base}-{}", index + 1)
}
