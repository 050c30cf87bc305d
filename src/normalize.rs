//! Shared text-to-number helpers used by every extractor.
//!
//! All unit arithmetic goes through `Decimal` so that `"0.3m"` becomes
//! exactly 300 and magnifications round half-to-even at two places.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
static RATIO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*:\s*(\d+\.?\d*)").unwrap());
static GRAMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d,]+\.?\d*)\s*(?:g|ｇ)").unwrap());
static YEN_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d,]+)\s*円").unwrap());
static YEN_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[￥¥]\s*([\d,]+)").unwrap());

/// Crop factor applied when a source quotes values relative to its sensor
/// instead of 35mm-equivalent ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equivalence {
    FullFrame,
    ApsC,
    MicroFourThirds,
}

impl Equivalence {
    pub fn factor(self) -> Decimal {
        match self {
            Equivalence::FullFrame => Decimal::ONE,
            Equivalence::ApsC => Decimal::new(15, 1),
            Equivalence::MicroFourThirds => Decimal::TWO,
        }
    }
}

// ── Pattern primitives ──

/// Capture groups of the first match of `re` in `text`, or empty when
/// nothing matches. Optional groups that did not participate yield "".
pub fn extract_groups(text: &str, re: &Regex) -> Vec<String> {
    match re.captures(text) {
        Some(caps) => caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect(),
        None => Vec::new(),
    }
}

/// Range-or-single policy for one value. Pair patterns are tried first, in
/// order, and must capture (wide, telephoto). Otherwise the first single
/// pattern that matches is duplicated into both ends.
pub fn pair_or_single(value: &str, pairs: &[&Regex], singles: &[&Regex]) -> Option<(String, String)> {
    for re in pairs {
        let groups = extract_groups(value, re);
        if groups.len() >= 2 {
            return Some((groups[0].clone(), groups[1].clone()));
        }
    }
    for re in singles {
        if let Some(first) = extract_groups(value, re).into_iter().next() {
            return Some((first.clone(), first));
        }
    }
    None
}

/// Column form of [`pair_or_single`]. Missing or unmatched values keep
/// their position with empty placeholders in both outputs.
pub fn extract_pair_or_single(
    values: &[Option<&str>],
    pairs: &[&Regex],
    singles: &[&Regex],
) -> (Vec<String>, Vec<String>) {
    values
        .iter()
        .map(|value| {
            value
                .and_then(|v| pair_or_single(v, pairs, singles))
                .unwrap_or_default()
        })
        .unzip()
}

// ── Numbers ──

/// Parse a captured number, tolerating thousands commas and a dangling
/// decimal point.
pub fn decimal(s: &str) -> Option<Decimal> {
    let cleaned: String = s.chars().filter(|c| !matches!(c, ',' | ' ')).collect();
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned).ok()
}

/// Goes through the decimal string so the result is the nearest f64 to the
/// printed value.
pub fn to_f64(d: Decimal) -> f64 {
    d.normalize().to_string().parse().unwrap_or_default()
}

/// Two decimal places, half-to-even.
pub fn round2(d: Decimal) -> f64 {
    to_f64(d.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
}

/// Integer part, like truncating a float.
pub fn truncate(d: Decimal) -> i64 {
    d.trunc().to_i64().unwrap_or_default()
}

/// Nearest integer, half-to-even.
pub fn round_int(d: Decimal) -> i64 {
    d.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
        .unwrap_or_default()
}

// ── Units ──

pub fn meters_to_mm(s: &str) -> Option<f64> {
    decimal(s).map(|d| to_f64(d * Decimal::ONE_THOUSAND))
}

pub fn centimeters_to_mm(s: &str) -> Option<f64> {
    decimal(s).map(|d| to_f64(d * Decimal::TEN))
}

pub fn millimeters(s: &str) -> Option<f64> {
    decimal(s).map(to_f64)
}

/// 35mm-equivalent focal length from a crop-relative one, truncated.
pub fn equivalent_focal_length(s: &str, eq: Equivalence) -> Option<i64> {
    decimal(s).map(|d| truncate(d * eq.factor()))
}

/// `a / b * factor`, rounded. `None` on a zero denominator.
pub fn magnification(numerator: &str, denominator: &str, eq: Equivalence) -> Option<f64> {
    let n = decimal(numerator)?;
    let d = decimal(denominator)?;
    let ratio = n.checked_div(d)?;
    Some(round2(ratio * eq.factor()))
}

/// First `a:b` ratio in `text` (ASCII or full-width colon) as a
/// magnification.
pub fn ratio_to_magnification(text: &str, eq: Equivalence) -> Option<f64> {
    let text = text.replace('：', ":");
    let groups = extract_groups(&text, &RATIO_RE);
    if groups.len() < 2 {
        return None;
    }
    magnification(&groups[0], &groups[1], eq)
}

/// Two numbers from a "diameter × length" cell.
pub fn dimensions(text: &str, re: &Regex) -> Option<(f64, f64)> {
    let groups = extract_groups(text, re);
    if groups.len() < 2 {
        return None;
    }
    Some((millimeters(&groups[0])?, millimeters(&groups[1])?))
}

pub fn grams(text: &str) -> Option<f64> {
    let groups = extract_groups(text, &GRAMS_RE);
    groups.first().and_then(|g| millimeters(g))
}

/// Yen price written either `98,000円` or `￥98,000`.
pub fn yen(text: &str) -> Option<i64> {
    [&*YEN_SUFFIX_RE, &*YEN_PREFIX_RE]
        .into_iter()
        .find_map(|re| extract_groups(text, re).into_iter().next())
        .and_then(|g| decimal(&g))
        .map(truncate)
}

#[cfg(test)]
mod tests {
    use super::*;

    static PAIR_M: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m / (\d+\.?\d*)m").unwrap());
    static SINGLE_M: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m").unwrap());
    static SINGLE_CM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)cm").unwrap());

    #[test]
    fn groups_of_first_match() {
        let re = Regex::new(r"(\d+)-(\d+)mm").unwrap();
        assert_eq!(extract_groups("12-35mm / 35-100mm", &re), vec!["12", "35"]);
        assert!(extract_groups("25mm", &re).is_empty());
    }

    #[test]
    fn unmatched_optional_group_is_empty() {
        let re = Regex::new(r"F(\d+)(?:-(\d+))?").unwrap();
        assert_eq!(extract_groups("F4", &re), vec!["4", ""]);
    }

    #[test]
    fn range_wins_over_single() {
        let (w, t) = pair_or_single("0.3m / 1.0m", &[&PAIR_M], &[&SINGLE_M]).unwrap();
        assert_eq!((w.as_str(), t.as_str()), ("0.3", "1.0"));
        assert_eq!(meters_to_mm(&w), Some(300.0));
        assert_eq!(meters_to_mm(&t), Some(1000.0));
    }

    #[test]
    fn single_is_duplicated() {
        let (w, t) = pair_or_single("0.5m", &[&PAIR_M], &[&SINGLE_M]).unwrap();
        assert_eq!(w, t);
        assert_eq!(meters_to_mm(&w), Some(500.0));
    }

    #[test]
    fn column_form_keeps_positions() {
        let values = [Some("0.3m / 1.0m"), None, Some("45cm"), Some("n/a")];
        let (w, t) = extract_pair_or_single(&values, &[&PAIR_M], &[&SINGLE_CM, &SINGLE_M]);
        assert_eq!(w, vec!["0.3", "", "45", ""]);
        assert_eq!(t, vec!["1.0", "", "45", ""]);
        assert_eq!(centimeters_to_mm(&w[2]), Some(450.0));
    }

    #[test]
    fn ratio_conversion() {
        assert_eq!(ratio_to_magnification("1:4", Equivalence::FullFrame), Some(0.25));
        assert_eq!(ratio_to_magnification("1:4", Equivalence::MicroFourThirds), Some(0.5));
        assert_eq!(ratio_to_magnification("1：8", Equivalence::FullFrame), Some(0.12));
        assert_eq!(ratio_to_magnification("1:0", Equivalence::FullFrame), None);
    }

    #[test]
    fn focal_length_equivalence() {
        assert_eq!(equivalent_focal_length("17.5", Equivalence::MicroFourThirds), Some(35));
        assert_eq!(equivalent_focal_length("25", Equivalence::ApsC), Some(37));
    }

    #[test]
    fn weights_and_prices() {
        assert_eq!(grams("約1,020g"), Some(1020.0));
        assert_eq!(grams("285ｇ"), Some(285.0));
        assert_eq!(yen("￥123,000（税別）"), Some(123000));
        assert_eq!(yen("98,000円(税抜)"), Some(98000));
        assert_eq!(yen("オープン価格"), None);
    }

    #[test]
    fn dimension_pair() {
        let re = Regex::new(r"(\d+\.?\d*)\D+(\d+\.?\d*)").unwrap();
        assert_eq!(dimensions("φ63.4×56.5mm", &re), Some((63.4, 56.5)));
    }

    #[test]
    fn decimal_tolerates_separators() {
        assert_eq!(decimal("1,160"), Some(Decimal::from(1160)));
        assert_eq!(decimal("2."), Some(Decimal::TWO));
        assert_eq!(decimal(""), None);
    }
}
