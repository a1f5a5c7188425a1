use chrono::{DateTime, Duration, Utc};

use crate::models::receipt::{
    ReceiptReasonCode, ReceiptRiskDecision, ReceiptRiskInput, RiskBreakdown, RiskPenalty,
    RiskStatus,
};
use crate::similarity::fuzzy_match_score;

const BASE_SCORE: i32 = 100;

const APPROVE_THRESHOLD: u8 = 80;
const FLAG_THRESHOLD: u8 = 50;

const MAX_FUTURE_SKEW_MINUTES: i64 = 10;
const STALE_WINDOW_HOURS: i64 = 24;

const MERCHANT_MISMATCH_BELOW: f64 = 0.55;
const MERCHANT_WEAK_BELOW: f64 = 0.75;

/// Orders at or above this total also get a relative mismatch check.
const PERCENT_CHECK_MIN_CENTS: i64 = 5_000;
const PERCENT_MISMATCH_RATIO: f64 = 0.1;
const MATH_TOLERANCE_CENTS: i64 = 100;

/// Fraud-oriented receipt check: starts from 100 and subtracts a penalty per
/// reason code. Duplicates, missing or non-positive totals and stale receipts
/// reject outright.
pub fn score_receipt_risk(input: &ReceiptRiskInput, now: DateTime<Utc>) -> ReceiptRiskDecision {
    if input.is_duplicate {
        return short_circuit(
            ReceiptReasonCode::DuplicateReceipt,
            RiskStatus::Rejected,
            input.confidence.and_then(normalize_confidence),
        );
    }
    if input.ocr_error {
        return short_circuit(ReceiptReasonCode::OcrError, RiskStatus::Pending, None);
    }

    let mut ledger = PenaltyLedger::default();
    let normalized_confidence = input.confidence.and_then(normalize_confidence);

    match input.total_cents {
        None => ledger.add(ReceiptReasonCode::TotalNotFound, -60),
        Some(total) if total <= 0 => ledger.add(ReceiptReasonCode::InvalidTotal, -70),
        Some(_) => {}
    }

    match input.receipt_date {
        None => ledger.add(ReceiptReasonCode::DateMissing, -15),
        Some(date) => {
            if date > now + Duration::minutes(MAX_FUTURE_SKEW_MINUTES) {
                ledger.add(ReceiptReasonCode::FutureDate, -25);
            }
            if date < now - Duration::hours(STALE_WINDOW_HOURS) {
                ledger.add(ReceiptReasonCode::StaleReceipt, -60);
            }
        }
    }

    let mut fuzzy_score = None;
    let expected_vendor = trimmed(input.expected_vendor.as_deref());
    let merchant_name = trimmed(input.merchant_name.as_deref());
    if let Some(expected_vendor) = expected_vendor {
        match merchant_name {
            None => ledger.add(ReceiptReasonCode::MerchantMissing, -20),
            Some(merchant_name) => {
                let score = fuzzy_match_score(merchant_name, expected_vendor);
                if score < MERCHANT_MISMATCH_BELOW {
                    ledger.add(ReceiptReasonCode::MerchantMismatch, -35);
                } else if score < MERCHANT_WEAK_BELOW {
                    ledger.add(ReceiptReasonCode::MerchantWeakMatch, -15);
                }
                fuzzy_score = Some(score);
            }
        }
    }

    let diff_cents = match (input.total_cents, input.expected_total_cents) {
        (Some(total), Some(expected)) => {
            let diff = total.saturating_sub(expected).saturating_abs();
            if diff > 1_000 {
                ledger.add(ReceiptReasonCode::TotalLargeMismatch, -45);
            } else if diff > 500 {
                ledger.add(ReceiptReasonCode::TotalMismatch, -25);
            } else if diff > 200 {
                ledger.add(ReceiptReasonCode::TotalSmallMismatch, -10);
            }
            if expected >= PERCENT_CHECK_MIN_CENTS
                && diff as f64 / expected as f64 > PERCENT_MISMATCH_RATIO
            {
                ledger.add(ReceiptReasonCode::TotalPercentMismatch, -15);
            }
            Some(diff)
        }
        _ => None,
    };

    if input.subtotal_cents.is_none() {
        ledger.add(ReceiptReasonCode::SubtotalMissing, -5);
    }
    if input.tax_cents.is_none() {
        ledger.add(ReceiptReasonCode::TaxMissing, -5);
    }
    if input.tip_cents.is_none() {
        ledger.add(ReceiptReasonCode::TipMissing, -3);
    }
    if trimmed(input.currency.as_deref()).is_none() {
        ledger.add(ReceiptReasonCode::CurrencyMissing, -5);
    }

    if let Some(confidence) = normalized_confidence {
        if confidence < 50.0 {
            ledger.add(ReceiptReasonCode::LowConfidence, -20);
        }
        if confidence < 30.0 {
            ledger.add(ReceiptReasonCode::VeryLowConfidence, -35);
        }
    }

    if let (Some(subtotal), Some(tax), Some(tip), Some(total)) = (
        input.subtotal_cents,
        input.tax_cents,
        input.tip_cents,
        input.total_cents,
    ) {
        let computed = subtotal.saturating_add(tax).saturating_add(tip);
        if computed.saturating_sub(total).saturating_abs() > MATH_TOLERANCE_CENTS {
            ledger.add(ReceiptReasonCode::TotalMathMismatch, -15);
        }
    }

    let risk_score = (BASE_SCORE + ledger.total()).clamp(0, 100) as u8;
    let status = if ledger.codes.iter().any(|code| code.is_hard_reject()) {
        RiskStatus::Rejected
    } else if risk_score >= APPROVE_THRESHOLD {
        RiskStatus::Approved
    } else if risk_score >= FLAG_THRESHOLD {
        RiskStatus::Flagged
    } else {
        RiskStatus::Rejected
    };

    ReceiptRiskDecision {
        risk_score,
        status,
        reason_codes: ledger.codes,
        breakdown: RiskBreakdown {
            base: BASE_SCORE,
            penalties: ledger.penalties,
            fuzzy_score,
            diff_cents,
            expected_total_cents: input.expected_total_cents,
            extracted_total_cents: input.total_cents,
        },
        normalized_confidence,
    }
}

/// Accepts either a 0-1 or a 0-100 confidence; anything else is unknown.
fn normalize_confidence(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw < 0.0 {
        None
    } else if raw <= 1.0 {
        Some(raw * 100.0)
    } else if raw <= 100.0 {
        Some(raw)
    } else {
        None
    }
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn short_circuit(
    code: ReceiptReasonCode,
    status: RiskStatus,
    normalized_confidence: Option<f64>,
) -> ReceiptRiskDecision {
    ReceiptRiskDecision {
        risk_score: 0,
        status,
        reason_codes: vec![code],
        breakdown: RiskBreakdown {
            base: BASE_SCORE,
            penalties: vec![RiskPenalty { code, delta: -100 }],
            fuzzy_score: None,
            diff_cents: None,
            expected_total_cents: None,
            extracted_total_cents: None,
        },
        normalized_confidence,
    }
}

#[derive(Default)]
struct PenaltyLedger {
    penalties: Vec<RiskPenalty>,
    codes: Vec<ReceiptReasonCode>,
}

impl PenaltyLedger {
    fn add(&mut self, code: ReceiptReasonCode, delta: i32) {
        self.penalties.push(RiskPenalty { code, delta });
        if !self.codes.contains(&code) {
            self.codes.push(code);
        }
    }

    fn total(&self) -> i32 {
        self.penalties.iter().map(|penalty| penalty.delta).sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::score_receipt_risk;
    use crate::models::receipt::{ReceiptReasonCode, ReceiptRiskInput, RiskStatus};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 12, 0, 0).unwrap()
    }

    /// A complete, consistent receipt from the expected vendor.
    fn clean_receipt() -> ReceiptRiskInput {
        ReceiptRiskInput {
            expected_vendor: Some("Broski Kitchen".to_string()),
            expected_total_cents: Some(4200),
            merchant_name: Some("Broski Kitchen".to_string()),
            subtotal_cents: Some(3600),
            tax_cents: Some(300),
            tip_cents: Some(300),
            total_cents: Some(4200),
            receipt_date: Some(Utc.with_ymd_and_hms(2026, 2, 20, 10, 30, 0).unwrap()),
            currency: Some("USD".to_string()),
            confidence: Some(90.0),
            is_duplicate: false,
            ocr_error: false,
        }
    }

    #[test]
    fn duplicate_receipts_are_rejected_with_zero_score() {
        let input = ReceiptRiskInput {
            is_duplicate: true,
            ..ReceiptRiskInput::default()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.risk_score, 0);
        assert_eq!(out.status, RiskStatus::Rejected);
        assert_eq!(out.reason_codes, vec![ReceiptReasonCode::DuplicateReceipt]);
    }

    #[test]
    fn ocr_failure_is_pending() {
        let input = ReceiptRiskInput {
            ocr_error: true,
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.status, RiskStatus::Pending);
        assert_eq!(out.reason_codes, vec![ReceiptReasonCode::OcrError]);
        assert_eq!(out.normalized_confidence, None);
    }

    #[test]
    fn clean_receipt_with_store_number_is_approved() {
        let input = ReceiptRiskInput {
            expected_vendor: Some("Broski's Kitchen".to_string()),
            merchant_name: Some("Broski's Kitchen #104".to_string()),
            confidence: Some(0.95),
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.status, RiskStatus::Approved);
        assert_eq!(out.risk_score, 100);
        assert!(out.reason_codes.is_empty());
        assert_eq!(out.breakdown.fuzzy_score, Some(1.0));
        assert_eq!(out.normalized_confidence, Some(95.0));
    }

    #[test]
    fn missing_total_is_a_hard_reject() {
        let input = ReceiptRiskInput {
            total_cents: None,
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.status, RiskStatus::Rejected);
        assert!(out.reason_codes.contains(&ReceiptReasonCode::TotalNotFound));
        assert_eq!(out.breakdown.diff_cents, None);
    }

    #[test]
    fn zero_total_is_invalid() {
        let input = ReceiptRiskInput {
            total_cents: Some(0),
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.status, RiskStatus::Rejected);
        assert!(out.reason_codes.contains(&ReceiptReasonCode::InvalidTotal));
    }

    #[test]
    fn merchant_mismatch_is_flagged() {
        let input = ReceiptRiskInput {
            merchant_name: Some("Completely Different Cafe".to_string()),
            confidence: Some(92.0),
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.status, RiskStatus::Flagged);
        assert_eq!(out.risk_score, 65);
        assert_eq!(out.reason_codes, vec![ReceiptReasonCode::MerchantMismatch]);
    }

    #[test]
    fn missing_merchant_is_penalized_only_when_a_vendor_is_expected() {
        let missing = ReceiptRiskInput {
            merchant_name: Some("   ".to_string()),
            ..clean_receipt()
        };
        let unchecked = ReceiptRiskInput {
            expected_vendor: None,
            merchant_name: None,
            ..clean_receipt()
        };

        assert_eq!(
            score_receipt_risk(&missing, now()).reason_codes,
            vec![ReceiptReasonCode::MerchantMissing]
        );
        assert!(score_receipt_risk(&unchecked, now()).reason_codes.is_empty());
    }

    #[test]
    fn receipts_older_than_a_day_are_rejected() {
        let input = ReceiptRiskInput {
            receipt_date: Some(Utc.with_ymd_and_hms(2026, 2, 18, 9, 0, 0).unwrap()),
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.status, RiskStatus::Rejected);
        assert!(out.reason_codes.contains(&ReceiptReasonCode::StaleReceipt));
    }

    #[test]
    fn future_dates_beyond_clock_skew_are_penalized() {
        let slightly_ahead = ReceiptRiskInput {
            receipt_date: Some(Utc.with_ymd_and_hms(2026, 2, 20, 12, 5, 0).unwrap()),
            ..clean_receipt()
        };
        let far_ahead = ReceiptRiskInput {
            receipt_date: Some(Utc.with_ymd_and_hms(2026, 2, 21, 12, 0, 0).unwrap()),
            ..clean_receipt()
        };

        assert!(score_receipt_risk(&slightly_ahead, now()).reason_codes.is_empty());
        let out = score_receipt_risk(&far_ahead, now());
        assert_eq!(out.reason_codes, vec![ReceiptReasonCode::FutureDate]);
        assert_eq!(out.risk_score, 75);
        assert_eq!(out.status, RiskStatus::Flagged);
    }

    #[test]
    fn total_mismatch_is_graduated() {
        let with_total = |total_cents: i64| ReceiptRiskInput {
            total_cents: Some(total_cents),
            subtotal_cents: None,
            ..clean_receipt()
        };
        let codes = |total_cents: i64| {
            score_receipt_risk(&with_total(total_cents), now())
                .reason_codes
                .into_iter()
                .filter(|code| *code != ReceiptReasonCode::SubtotalMissing)
                .collect::<Vec<_>>()
        };

        assert!(codes(4400).is_empty());
        assert_eq!(codes(4500), vec![ReceiptReasonCode::TotalSmallMismatch]);
        assert_eq!(codes(3500), vec![ReceiptReasonCode::TotalMismatch]);
        assert_eq!(codes(5400), vec![ReceiptReasonCode::TotalLargeMismatch]);
    }

    #[test]
    fn large_orders_get_the_percent_penalty_too() {
        let input = ReceiptRiskInput {
            expected_total_cents: Some(10_000),
            subtotal_cents: Some(9_000),
            tax_cents: Some(500),
            tip_cents: Some(2_000),
            total_cents: Some(11_500),
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert!(out.reason_codes.contains(&ReceiptReasonCode::TotalLargeMismatch));
        assert!(out.reason_codes.contains(&ReceiptReasonCode::TotalPercentMismatch));
        assert!(!out.reason_codes.contains(&ReceiptReasonCode::TotalMathMismatch));
        assert_eq!(out.risk_score, 40);
        assert_eq!(out.status, RiskStatus::Rejected);
        assert_eq!(out.breakdown.diff_cents, Some(1_500));
    }

    #[test]
    fn line_totals_must_add_up() {
        let input = ReceiptRiskInput {
            tip_cents: Some(500),
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.reason_codes, vec![ReceiptReasonCode::TotalMathMismatch]);
        assert_eq!(out.risk_score, 85);
    }

    #[test]
    fn very_low_confidence_stacks_both_penalties() {
        let input = ReceiptRiskInput {
            confidence: Some(0.2),
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(
            out.reason_codes,
            vec![
                ReceiptReasonCode::LowConfidence,
                ReceiptReasonCode::VeryLowConfidence
            ]
        );
        assert_eq!(out.risk_score, 45);
        assert_eq!(out.status, RiskStatus::Rejected);
    }

    #[test]
    fn missing_optional_fields_cost_a_few_points_each() {
        let input = ReceiptRiskInput {
            subtotal_cents: None,
            tax_cents: None,
            tip_cents: None,
            currency: None,
            receipt_date: None,
            ..clean_receipt()
        };

        let out = score_receipt_risk(&input, now());

        assert_eq!(out.risk_score, 100 - 15 - 5 - 5 - 3 - 5);
        assert_eq!(out.status, RiskStatus::Flagged);
        assert_eq!(out.breakdown.penalties.len(), 5);
    }
}
