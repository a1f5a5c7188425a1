use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::receipt::ReceiptItem;

static ITEM_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<qty>\d+)?\s*(?P<name>[A-Za-z0-9][A-Za-z0-9\s.'/#&-]{2,}?)\s+(?P<price>\d{1,3}\.\d{2})$",
    )
    .expect("valid regex")
});
static TOTAL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(subtotal|total|tax|change|cash|visa|mastercard|amex|debit)")
        .expect("valid regex")
});
static PHONE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(tel|phone)").expect("valid regex"));
static ADDRESS_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\d{1,5}\s+.+\s+(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|pike|trail|trl|way|court|ct)\b",
    )
    .expect("valid regex")
});
static CITY_STATE_ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{2}\s+\d{5}(?:-\d{4})?").expect("valid regex"));
static VENDOR_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\s.'&-]").expect("valid regex"));
static GREETING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)receipt|thank|visit|welcome").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParsedReceipt {
    pub vendor_name: String,
    pub location: String,
    pub items: Vec<ReceiptItem>,
}

/// Pulls a vendor, a location and priced line items out of raw OCR text.
pub fn parse_receipt_text(text: &str) -> ParsedReceipt {
    let lines: Vec<String> = text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();

    let mut parsed = ParsedReceipt::default();

    for (index, line) in lines.iter().enumerate() {
        let is_total = TOTAL_LINE_RE.is_match(line);

        if parsed.vendor_name.is_empty() && !is_total && !PHONE_LINE_RE.is_match(line) {
            let candidate = VENDOR_STRIP_RE.replace_all(line, "");
            let candidate = candidate.trim();
            if candidate.len() >= 3 && !GREETING_RE.is_match(candidate) {
                parsed.vendor_name = candidate.to_string();
            }
        }

        if parsed.location.is_empty()
            && (ADDRESS_LINE_RE.is_match(line) || CITY_STATE_ZIP_RE.is_match(line))
        {
            parsed.location = location_from(line, lines.get(index + 1).map(String::as_str));
        }

        if is_total {
            continue;
        }

        if let Some(item) = parse_item_line(line) {
            parsed.items.push(item);
        }
    }

    parsed
}

fn location_from(line: &str, next_line: Option<&str>) -> String {
    if CITY_STATE_ZIP_RE.is_match(line) {
        return line.to_string();
    }
    match next_line {
        Some(next) if CITY_STATE_ZIP_RE.is_match(next) => format!("{line}, {next}"),
        _ => line.to_string(),
    }
}

fn parse_item_line(line: &str) -> Option<ReceiptItem> {
    let captures = ITEM_LINE_RE.captures(line)?;
    let name = captures.name("name")?.as_str().trim();
    let price_cents = parse_price_cents(captures.name("price")?.as_str())?;
    let quantity = captures
        .name("qty")
        .and_then(|qty| qty.as_str().parse::<u32>().ok())
        .filter(|qty| *qty > 0)
        .unwrap_or(1);

    Some(ReceiptItem {
        name: name.to_string(),
        quantity,
        price_cents,
    })
}

/// Converts a `d.dd` price string to cents without going through floats.
fn parse_price_cents(raw: &str) -> Option<i64> {
    let (dollars, cents) = raw.split_once('.')?;
    let dollars: i64 = dollars.parse().ok()?;
    let cents: i64 = cents.parse().ok()?;
    Some(dollars * 100 + cents)
}
