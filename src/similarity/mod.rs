use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

static STORE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bstore\s*#?\s*\d+\b").expect("valid regex"));
static HASH_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\s*\d+\b").expect("valid regex"));
static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid regex"));

/// Lowercases, trims, and collapses internal whitespace.
pub fn normalize_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalizes merchant and item names for comparison: drops store-number
/// suffixes (`Store #42`, `#42`) and punctuation.
pub fn normalize_merchant_name(value: &str) -> String {
    let lowered = value.to_lowercase();
    let stripped = STORE_NUMBER_RE.replace_all(&lowered, " ");
    let stripped = HASH_NUMBER_RE.replace_all(&stripped, " ");
    let stripped = NON_WORD_RE.replace_all(&stripped, " ");

    normalize_key(&stripped)
}

/// Dice coefficient over character bigram multisets, in `[0, 1]`.
pub fn dice_coefficient(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let a_pairs = bigrams(&a_chars);
    let b_pairs = bigrams(&b_chars);

    let intersection: usize = a_pairs
        .iter()
        .map(|(pair, count)| b_pairs.get(pair).map_or(0, |other| (*count).min(*other)))
        .sum();

    let total_pairs = a_chars.len().saturating_sub(1) + b_chars.len().saturating_sub(1);
    if total_pairs == 0 {
        return 0.0;
    }

    (2 * intersection) as f64 / total_pairs as f64
}

/// Jaccard index over whitespace-separated token sets, in `[0, 1]`.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b.split_whitespace().collect();
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let intersection = a_tokens.intersection(&b_tokens).count();
    let union = a_tokens.union(&b_tokens).count();
    intersection as f64 / union as f64
}

/// Blend of bigram and token similarity over normalized merchant names.
pub fn fuzzy_match_score(a: &str, b: &str) -> f64 {
    let a = normalize_merchant_name(a);
    let b = normalize_merchant_name(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    (dice_coefficient(&a, &b) * 0.6 + token_jaccard(&a, &b) * 0.4).clamp(0.0, 1.0)
}

fn bigrams(chars: &[char]) -> HashMap<(char, char), usize> {
    let mut pairs = HashMap::new();
    for window in chars.windows(2) {
        *pairs.entry((window[0], window[1])).or_insert(0) += 1;
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::{
        dice_coefficient, fuzzy_match_score, normalize_key, normalize_merchant_name, token_jaccard,
    };

    #[test]
    fn normalize_key_collapses_whitespace_and_case() {
        assert_eq!(normalize_key("  Large   Fries \t"), "large fries");
    }

    #[test]
    fn merchant_names_drop_store_numbers_and_punctuation() {
        assert_eq!(normalize_merchant_name("Walgreens Store #1234"), "walgreens");
        assert_eq!(normalize_merchant_name("McDonald's #552"), "mcdonald s");
        assert_eq!(normalize_merchant_name("  KROGER   store 77 "), "kroger");
    }

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(dice_coefficient("burger", "burger"), 1.0);
    }

    #[test]
    fn empty_or_single_char_strings_score_zero() {
        assert_eq!(dice_coefficient("", "burger"), 0.0);
        assert_eq!(dice_coefficient("a", "b"), 0.0);
    }

    #[test]
    fn near_misses_score_high() {
        // night/nacht share only "ht"; chesseburger/cheeseburger share most pairs
        assert!(dice_coefficient("night", "nacht") < 0.5);
        assert!(dice_coefficient("chesseburger", "cheeseburger") > 0.7);
    }

    #[test]
    fn repeated_bigrams_are_counted_as_a_multiset() {
        // "aaaa" has three "aa" pairs, "aa" has one
        let score = dice_coefficient("aaaa", "aa");
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn token_jaccard_ignores_order_and_duplicates() {
        assert_eq!(token_jaccard("pizza hut", "hut pizza pizza"), 1.0);
        assert!((token_jaccard("broski kitchen", "broski cafe") - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(token_jaccard("", "pizza"), 0.0);
    }

    #[test]
    fn fuzzy_match_treats_store_numbers_as_equal() {
        assert_eq!(fuzzy_match_score("Broski's Kitchen #104", "Broski's Kitchen"), 1.0);
        assert_eq!(fuzzy_match_score("", "Broski's Kitchen"), 0.0);
        assert!(fuzzy_match_score("Completely Different Cafe", "Broski Kitchen") < 0.55);
    }
}
