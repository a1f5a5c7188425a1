use crate::models::receipt::{
    ExpectedItem, ProofScoreInput, ProofScoreResult, ReceiptItem, VerificationStatus,
};
use crate::similarity::{dice_coefficient, normalize_merchant_name};

const CONFIDENCE_WEIGHT: f64 = 0.4;
const VENDOR_WEIGHT: f64 = 0.2;
const TOTAL_WEIGHT: f64 = 0.2;
const IMAGE_QUALITY_WEIGHT: f64 = 0.1;
const TAMPER_WEIGHT: f64 = 0.1;

const APPROVE_THRESHOLD: u8 = 80;
const FLAG_THRESHOLD: u8 = 60;
const ITEM_MATCH_FLOOR: u8 = 50;

const NAME_EXACT_POINTS: u32 = 30;
const NAME_FUZZY_POINTS: u32 = 20;
const NAME_FUZZY_THRESHOLD: f64 = 0.7;
const QUANTITY_POINTS: u32 = 20;
const PRICE_POINTS: u32 = 20;
const PRICE_TOLERANCE_CENTS: i64 = 100;

/// Source of an image-forensics signal in `[0, 100]`, higher meaning less
/// likely tampered. Returning `None` leaves the factor out of the composite.
pub trait TamperDetector: Send + Sync {
    fn tamper_score(&self, input: &ProofScoreInput) -> Option<f64>;
}

/// Used until a forensics model is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTamperSignal;

impl TamperDetector for NoTamperSignal {
    fn tamper_score(&self, _input: &ProofScoreInput) -> Option<f64> {
        None
    }
}

pub fn compute_proof_score(input: &ProofScoreInput) -> ProofScoreResult {
    compute_proof_score_with(input, &NoTamperSignal)
}

pub fn compute_proof_score_with(
    input: &ProofScoreInput,
    detector: &dyn TamperDetector,
) -> ProofScoreResult {
    let image_quality = input
        .image_quality
        .map(clamp_score)
        .or_else(|| input.confidence.map(|c| clamp_score(normalize_confidence(c))));
    let tamper_score = input
        .tamper_score
        .or_else(|| detector.tamper_score(input))
        .map(clamp_score);
    let vendor_match_score = input
        .expected_vendor
        .as_deref()
        .map(|expected| vendor_match_score(input.merchant_name.as_deref(), expected));
    let total_score = match (input.total_cents, input.expected_total_cents) {
        (Some(extracted), Some(expected)) => Some(total_match_score(extracted, expected)),
        _ => None,
    };

    let factors = [
        (input.confidence.map(normalize_confidence), CONFIDENCE_WEIGHT),
        (vendor_match_score.map(f64::from), VENDOR_WEIGHT),
        (total_score, TOTAL_WEIGHT),
        (image_quality.map(f64::from), IMAGE_QUALITY_WEIGHT),
        (tamper_score.map(f64::from), TAMPER_WEIGHT),
    ];
    let proof_score = weighted_average(&factors);
    let item_match_score = item_match_score(&input.items, &input.expected_items);

    let (status, locked) = decide(proof_score, item_match_score);

    ProofScoreResult {
        proof_score,
        item_match_score,
        image_quality: image_quality.unwrap_or(0),
        tamper_score,
        vendor_match_score,
        extracted_total_cents: input.total_cents,
        vendor_name: input.merchant_name.clone(),
        status,
        locked,
    }
}

/// Maps a composite and item score to a status and lock flag. A weak item
/// match caps the status at FLAGGED and prevents locking.
pub fn decide(proof_score: u8, item_match_score: u8) -> (VerificationStatus, bool) {
    let mut status = if proof_score >= APPROVE_THRESHOLD {
        VerificationStatus::Approved
    } else if proof_score >= FLAG_THRESHOLD {
        VerificationStatus::Flagged
    } else {
        VerificationStatus::Rejected
    };

    if item_match_score < ITEM_MATCH_FLOOR && status == VerificationStatus::Approved {
        status = VerificationStatus::Flagged;
    }

    let locked = status != VerificationStatus::Rejected && item_match_score >= ITEM_MATCH_FLOOR;
    (status, locked)
}

/// Accepts either a 0-1 or a 0-100 confidence.
pub fn normalize_confidence(confidence: f64) -> f64 {
    if !confidence.is_finite() || confidence < 0.0 {
        0.0
    } else if confidence <= 1.0 {
        confidence * 100.0
    } else if confidence <= 100.0 {
        confidence
    } else {
        0.0
    }
}

pub fn vendor_match_score(merchant_name: Option<&str>, expected_vendor: &str) -> u8 {
    let merchant = normalize_merchant_name(merchant_name.unwrap_or_default());
    let expected = normalize_merchant_name(expected_vendor);

    if merchant.is_empty() || expected.is_empty() {
        return 0;
    }
    if merchant == expected {
        return 100;
    }

    clamp_score(dice_coefficient(&merchant, &expected) * 100.0)
}

fn total_match_score(extracted_cents: i64, expected_cents: i64) -> f64 {
    match extracted_cents.abs_diff(expected_cents) {
        0..=100 => 100.0,
        101..=500 => 75.0,
        501..=1000 => 50.0,
        _ => 25.0,
    }
}

pub fn item_match_score(extracted: &[ReceiptItem], expected: &[ExpectedItem]) -> u8 {
    let expected: Vec<&ExpectedItem> = expected
        .iter()
        .filter(|item| !item.name.trim().is_empty())
        .collect();
    if expected.is_empty() || extracted.is_empty() {
        return 0;
    }

    let earned: u32 = expected
        .iter()
        .map(|wanted| {
            extracted
                .iter()
                .map(|candidate| score_item_pair(wanted, candidate))
                .max()
                .unwrap_or(0)
        })
        .sum();
    let possible = expected.len() as f64 * 100.0;

    clamp_score(f64::from(earned) / possible * 100.0)
}

fn score_item_pair(expected: &ExpectedItem, candidate: &ReceiptItem) -> u32 {
    let expected_name = normalize_merchant_name(&expected.name);
    let candidate_name = normalize_merchant_name(&candidate.name);

    let mut points = 0;
    if expected_name == candidate_name {
        points += NAME_EXACT_POINTS;
    } else if dice_coefficient(&expected_name, &candidate_name) > NAME_FUZZY_THRESHOLD {
        points += NAME_FUZZY_POINTS;
    }

    if expected.quantity == Some(candidate.quantity) {
        points += QUANTITY_POINTS;
    }

    if let Some(price) = expected.price_cents {
        if price.abs_diff(candidate.price_cents) <= PRICE_TOLERANCE_CENTS as u64 {
            points += PRICE_POINTS;
        }
    }

    points
}

/// Weighted mean over the factors that are present; absent factors drop out
/// of the denominator instead of counting as zero.
fn weighted_average(factors: &[(Option<f64>, f64)]) -> u8 {
    let (sum, weight) = factors
        .iter()
        .filter_map(|(score, weight)| score.map(|s| (s * weight, *weight)))
        .fold((0.0, 0.0), |(sum, total), (s, w)| (sum + s, total + w));

    if weight <= 0.0 {
        return 0;
    }
    clamp_score(sum / weight)
}

fn clamp_score(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::{
        compute_proof_score, compute_proof_score_with, decide, item_match_score,
        normalize_confidence, vendor_match_score, TamperDetector,
    };
    use crate::models::receipt::{
        ExpectedItem, ProofScoreInput, ReceiptItem, VerificationStatus,
    };

    fn item(name: &str, quantity: u32, price_cents: i64) -> ReceiptItem {
        ReceiptItem {
            name: name.to_string(),
            quantity,
            price_cents,
        }
    }

    fn expected(name: &str, quantity: u32, price_cents: i64) -> ExpectedItem {
        ExpectedItem {
            name: name.to_string(),
            quantity: Some(quantity),
            price_cents: Some(price_cents),
        }
    }

    fn matching_input() -> ProofScoreInput {
        ProofScoreInput {
            merchant_name: Some("Joe's Diner".to_string()),
            total_cents: Some(2475),
            confidence: Some(0.95),
            items: vec![item("Burger", 1, 850), item("Fries", 2, 325)],
            expected_vendor: Some("Joe's Diner".to_string()),
            expected_total_cents: Some(2475),
            expected_items: vec![expected("Burger", 1, 850), expected("Fries", 2, 325)],
            image_quality: None,
            tamper_score: None,
        }
    }

    struct FixedTamper(f64);

    impl TamperDetector for FixedTamper {
        fn tamper_score(&self, _input: &ProofScoreInput) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn exact_receipt_is_approved_and_locked() {
        let result = compute_proof_score(&matching_input());

        // name 30 + quantity 20 + price 20 per item
        assert_eq!(result.item_match_score, 70);
        assert_eq!(result.vendor_match_score, Some(100));
        assert_eq!(result.image_quality, 95);
        assert_eq!(result.tamper_score, None);
        assert_eq!(result.status, VerificationStatus::Approved);
        assert!(result.locked);
        assert!(result.proof_score >= 80);
    }

    #[test]
    fn confidence_accepts_both_scales() {
        assert_eq!(normalize_confidence(0.82), 82.0);
        assert_eq!(normalize_confidence(82.0), 82.0);
        assert_eq!(normalize_confidence(140.0), 0.0);
        assert_eq!(normalize_confidence(-1.0), 0.0);
        assert_eq!(normalize_confidence(f64::NAN), 0.0);
    }

    #[test]
    fn missing_expected_total_drops_the_factor() {
        let mut input = matching_input();
        input.expected_total_cents = None;
        input.confidence = Some(1.0);

        // confidence 100, vendor 100, image 100: the missing total is not a zero
        assert_eq!(compute_proof_score(&input).proof_score, 100);
    }

    #[test]
    fn total_mismatch_bands() {
        let mut input = matching_input();
        input.confidence = Some(1.0);
        input.expected_vendor = None;

        let mut score_for = |diff: i64| {
            input.total_cents = Some(2475 + diff);
            compute_proof_score(&input).proof_score
        };

        // weights: confidence 0.4, total 0.2, image 0.1 => denominator 0.7
        assert_eq!(score_for(100), 100);
        assert_eq!(score_for(-450), 93); // (40 + 15 + 10) / 0.7
        assert_eq!(score_for(900), 86); // (40 + 10 + 10) / 0.7
        assert_eq!(score_for(5000), 79); // (40 + 5 + 10) / 0.7
    }

    #[test]
    fn tamper_signal_from_detector_is_weighted_in() {
        let mut input = matching_input();
        input.confidence = Some(1.0);

        let result = compute_proof_score_with(&input, &FixedTamper(0.0));

        assert_eq!(result.tamper_score, Some(0));
        assert_eq!(result.proof_score, 90);
    }

    #[test]
    fn caller_supplied_tamper_score_wins_over_detector() {
        let mut input = matching_input();
        input.tamper_score = Some(100.0);

        let result = compute_proof_score_with(&input, &FixedTamper(0.0));

        assert_eq!(result.tamper_score, Some(100));
    }

    #[test]
    fn vendor_match_ignores_store_numbers() {
        assert_eq!(vendor_match_score(Some("WALGREENS #4411"), "Walgreens"), 100);
        assert_eq!(vendor_match_score(None, "Walgreens"), 0);
        let fuzzy = vendor_match_score(Some("Walgreen"), "Walgreens");
        assert!(fuzzy > 80 && fuzzy < 100);
    }

    #[test]
    fn item_rubric_awards_partial_points() {
        let extracted = vec![item("Cheeseburger", 2, 1299)];

        // exact name + qty, price off by more than a dollar
        assert_eq!(
            item_match_score(&extracted, &[expected("cheeseburger", 2, 999)]),
            50
        );
        // fuzzy name only
        assert_eq!(
            item_match_score(&extracted, &[expected("Chesseburger", 1, 500)]),
            20
        );
    }

    #[test]
    fn item_match_is_zero_without_items() {
        assert_eq!(item_match_score(&[], &[expected("Burger", 1, 850)]), 0);
        assert_eq!(item_match_score(&[item("Burger", 1, 850)], &[]), 0);
    }

    #[test]
    fn weak_item_match_downgrades_approval() {
        let mut input = matching_input();
        input.items = vec![item("Salad", 1, 1200)];

        let result = compute_proof_score(&input);

        assert!(result.proof_score >= 80);
        assert!(result.item_match_score < 50);
        assert_eq!(result.status, VerificationStatus::Flagged);
        assert!(!result.locked);
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(decide(80, 100), (VerificationStatus::Approved, true));
        assert_eq!(decide(79, 100), (VerificationStatus::Flagged, true));
        assert_eq!(decide(60, 49), (VerificationStatus::Flagged, false));
        assert_eq!(decide(59, 100), (VerificationStatus::Rejected, false));
    }

    #[test]
    fn empty_input_is_rejected() {
        let result = compute_proof_score(&ProofScoreInput::default());

        assert_eq!(result.proof_score, 0);
        assert_eq!(result.status, VerificationStatus::Rejected);
        assert!(!result.locked);
    }
}
