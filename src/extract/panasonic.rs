use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{info, warn};

use super::{mismatch, missing, published_flag, require, MakerOutput, RawFields};
use crate::cache::PageSource;
use crate::dom::Node;
use crate::error::ExtractError;
use crate::lens::{LensRecord, Maker, Mount};
use crate::normalize::{self, Equivalence};
use crate::overrides::MakerOverrides;

const COMPARISON_URL: &str = "https://panasonic.jp/dc/comparison.html";
const BASE_URL: &str = "https://panasonic.jp";

static FOCAL_RANGE_JA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)mm～(\d+)mm").unwrap());
static FOCAL_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)-(\d+)mm").unwrap());
static FOCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)mm").unwrap());
static F_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)-(\d+\.?\d*)").unwrap());
static F_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)").unwrap());
static FOCUS_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m / (\d+\.?\d*)m").unwrap());
static FOCUS_INF_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m～∞.*?(\d+\.?\d*)m～∞").unwrap());
static FOCUS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m").unwrap());
static MAG_EQUIV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"35mm判換算\D*?(\d+\.?\d*)\s*倍").unwrap());
static MAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*倍").unwrap());
static FILTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*mm").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\D+(\d+\.?\d*)").unwrap());

/// Which row labels one comparison table uses.
struct Table {
    marker: &'static str,
    mount: Mount,
    /// Crop factor for values the table quotes in sensor terms.
    equivalence: Equivalence,
    focal: &'static str,
    focus: &'static str,
    filter: &'static str,
}

const TABLES: [Table; 2] = [
    Table {
        marker: "LUMIX G",
        mount: Mount::MicroFourThirds,
        equivalence: Equivalence::MicroFourThirds,
        focal: "35mm判換算焦点距離",
        focus: "最短撮影距離",
        filter: "フィルターサイズ",
    },
    Table {
        marker: "LUMIX S",
        mount: Mount::LeicaL,
        equivalence: Equivalence::FullFrame,
        focal: "焦点距離",
        focus: "撮影距離範囲",
        filter: "フィルター径",
    },
];

pub fn collect(pages: &mut dyn PageSource, overrides: &MakerOverrides) -> Result<MakerOutput> {
    let dom = pages.get_page(COMPARISON_URL, None, false)?;
    let tables = dom.find_all("table")?;
    let mut out = MakerOutput::default();

    for spec in &TABLES {
        let Some(table) = tables.iter().find(|t| t.full_text().contains(spec.marker)) else {
            warn!(marker = spec.marker, "comparison table not found");
            continue;
        };
        let columns = read_columns(table)?;
        info!(marker = spec.marker, lenses = columns.len(), "read comparison table");
        out.records.extend(to_records(&columns, spec, overrides)?);
        out.raw.extend(columns);
    }
    Ok(out)
}

/// One RawFields per lens column. Rows without a header cell are skipped.
fn read_columns(table: &Node<'_>) -> Result<Vec<RawFields>> {
    let names = table.find_all("thead th p")?;
    let links = table.find_all("thead th a")?;
    let mut columns: Vec<RawFields> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let url = links
                .get(i)
                .and_then(|a| a.attr("href"))
                .map(|href| format!("{BASE_URL}{href}"))
                .unwrap_or_default();
            RawFields::new(&name.text(), &url)
        })
        .collect();

    for tr in table.find_all("tbody > tr")? {
        let Some(th) = tr.find("th")? else {
            continue;
        };
        let label = th.text();
        for (column, td) in columns.iter_mut().zip(tr.find_all("td")?) {
            column.insert(&label, &td.text());
        }
    }
    Ok(columns)
}

fn to_records(
    columns: &[RawFields],
    table: &Table,
    overrides: &MakerOverrides,
) -> Result<Vec<LensRecord>, ExtractError> {
    let focal_values: Vec<Option<&str>> = columns.iter().map(|c| c.get(table.focal)).collect();
    let (wide_focal, tele_focal) = normalize::extract_pair_or_single(
        &focal_values,
        &[&FOCAL_RANGE_JA_RE, &FOCAL_RANGE_RE],
        &[&FOCAL_RE],
    );
    let focus_values: Vec<Option<&str>> = columns.iter().map(|c| c.get(table.focus)).collect();
    let (wide_focus, tele_focus) = normalize::extract_pair_or_single(
        &focus_values,
        &[&FOCUS_PAIR_RE, &FOCUS_INF_PAIR_RE],
        &[&FOCUS_RE],
    );

    let mut records = Vec::with_capacity(columns.len());
    for (i, raw) in columns.iter().enumerate() {
        let mut r = LensRecord::new(Maker::Panasonic.label(), raw.name(), table.mount, raw.url());
        r.product_number = require(Maker::Panasonic, raw, &["品番"])?.to_string();

        let focal = (wide_focal[i].as_str(), tele_focal[i].as_str());
        r.wide_focal_length = integer(raw, table.focal, focal.0)?;
        r.telephoto_focal_length = integer(raw, table.focal, focal.1)?;

        let (wf, tf) = normalize::pair_or_single(raw.name(), &[&F_RANGE_RE], &[&F_RE])
            .ok_or_else(|| mismatch(Maker::Panasonic, raw, "f_number", raw.name()))?;
        let name = Some(raw.name());
        r.wide_f_number = number(raw, "f_number", name, &wf, normalize::millimeters)?;
        r.telephoto_f_number = number(raw, "f_number", name, &tf, normalize::millimeters)?;

        let focus = raw.get(table.focus);
        r.wide_min_focus_distance =
            number(raw, table.focus, focus, &wide_focus[i], normalize::meters_to_mm)?;
        r.telephoto_min_focus_distance =
            number(raw, table.focus, focus, &tele_focus[i], normalize::meters_to_mm)?;

        r.max_photographing_magnification = magnification(raw, table.equivalence)?;

        if let Some(filter) = raw.get(table.filter) {
            if let Some(d) = normalize::extract_groups(filter, &FILTER_RE).first() {
                r.filter_diameter = normalize::millimeters(d).unwrap_or(-1.0);
            }
        }

        let (stabilized, stabilized_guess) = flag(raw.get("手ブレ補正"), &["O.I.S.", "Dual I.S."]);
        r.has_image_stabilization = stabilized;
        if stabilized_guess {
            r.note("has_image_stabilization: unrecognized 手ブレ補正 marker read as yes");
        }
        let (drip, drip_guess) = flag(raw.get("防塵・防滴"), &["防塵", "防滴"]);
        r.is_drip_proof = drip;
        if drip_guess {
            r.note("is_drip_proof: unrecognized 防塵・防滴 marker read as yes");
        }

        let size = require(Maker::Panasonic, raw, &["最大径×全長"])?;
        let (d, l) = normalize::dimensions(size, &SIZE_RE)
            .ok_or_else(|| mismatch(Maker::Panasonic, raw, "最大径×全長", size))?;
        r.overall_diameter = d;
        r.overall_length = l;

        let weight = require(Maker::Panasonic, raw, &["質量"])?;
        r.weight = normalize::grams(weight)
            .ok_or_else(|| mismatch(Maker::Panasonic, raw, "質量", weight))?;

        r.price = raw
            .get("メーカー希望小売価格")
            .and_then(normalize::yen)
            .unwrap_or(-1);

        r.is_inner_zoom = super::inner_zoom(&r, overrides);
        records.push(r.validate()?);
    }
    Ok(records)
}

fn integer(raw: &RawFields, field: &str, captured: &str) -> Result<i64, ExtractError> {
    if raw.get(field).is_none() {
        return Err(missing(Maker::Panasonic, raw, field));
    }
    captured
        .parse()
        .map_err(|_| mismatch(Maker::Panasonic, raw, field, raw.get(field).unwrap_or_default()))
}

/// `source` is the text `captured` came from; `None` means the row is absent.
fn number(
    raw: &RawFields,
    field: &str,
    source: Option<&str>,
    captured: &str,
    convert: fn(&str) -> Option<f64>,
) -> Result<f64, ExtractError> {
    convert(captured).ok_or_else(|| match source {
        Some(value) => mismatch(Maker::Panasonic, raw, field, value),
        None => missing(Maker::Panasonic, raw, field),
    })
}

/// The table quotes a 35mm-equivalent figure for G lenses; otherwise the
/// largest quoted magnification is scaled, and a ratio is the last resort.
fn magnification(raw: &RawFields, eq: Equivalence) -> Result<f64, ExtractError> {
    let value = require(Maker::Panasonic, raw, &["最大撮影倍率"])?;
    if let Some(m) = normalize::extract_groups(value, &MAG_EQUIV_RE).first() {
        if let Some(m) = normalize::decimal(m) {
            return Ok(normalize::round2(m));
        }
    }
    let quoted = MAG_RE
        .captures_iter(value)
        .filter_map(|c| normalize::decimal(&c[1]))
        .max();
    if let Some(m) = quoted {
        return Ok(normalize::round2(m * eq.factor()));
    }
    normalize::ratio_to_magnification(value, eq)
        .ok_or_else(|| mismatch(Maker::Panasonic, raw, "最大撮影倍率", value))
}

/// Reads a ○/― column. Returns (value, guessed) where guessed means the
/// marker was not one we recognize and a non-empty cell was taken as yes.
fn flag(value: Option<&str>, yes_words: &[&str]) -> (bool, bool) {
    let Some(value) = value else {
        return (false, false);
    };
    if yes_words.iter().any(|w| value.contains(w)) {
        return (true, false);
    }
    match published_flag(value) {
        Some(b) => (b, false),
        None => (true, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::FixturePages;

    fn run() -> MakerOutput {
        let mut pages =
            FixturePages::default().with(COMPARISON_URL, "panasonic/comparison.html");
        let overrides = crate::overrides::Overrides::builtin().for_maker(Maker::Panasonic);
        let out = collect(&mut pages, &overrides).unwrap();
        assert_eq!(pages.requests, vec![(COMPARISON_URL.to_string(), false)]);
        out
    }

    fn find<'a>(out: &'a MakerOutput, product: &str) -> &'a LensRecord {
        out.records
            .iter()
            .find(|r| r.product_number == product)
            .unwrap_or_else(|| panic!("{product} not extracted"))
    }

    #[test]
    fn reads_both_tables() {
        let out = run();
        assert_eq!(out.records.len(), 4);
        assert_eq!(out.raw.len(), 4);
        let mounts: Vec<Mount> = out.records.iter().map(|r| r.mount).collect();
        assert_eq!(
            mounts,
            vec![Mount::MicroFourThirds, Mount::MicroFourThirds, Mount::MicroFourThirds, Mount::LeicaL]
        );
    }

    #[test]
    fn equivalent_range_zoom() {
        let out = run();
        let r = find(&out, "H-ES12060");
        assert_eq!((r.wide_focal_length, r.telephoto_focal_length), (24, 120));
        assert_eq!((r.wide_f_number, r.telephoto_f_number), (2.8, 4.0));
        assert_eq!((r.wide_min_focus_distance, r.telephoto_min_focus_distance), (200.0, 240.0));
        assert_eq!(r.max_photographing_magnification, 0.6);
        assert_eq!(r.filter_diameter, 62.0);
        assert!(r.is_drip_proof);
        assert!(r.has_image_stabilization);
        assert!(!r.is_inner_zoom);
        assert_eq!((r.overall_diameter, r.overall_length), (68.0, 86.0));
        assert_eq!(r.weight, 320.0);
        assert_eq!(r.price, 125000);
        assert_eq!(r.url, "https://panasonic.jp/dc/products/H-ES12060.html");
    }

    #[test]
    fn tilde_range_is_not_inner_zoom() {
        let out = run();
        let r = find(&out, "H-FSA12035");
        assert_eq!((r.wide_focal_length, r.telephoto_focal_length), (24, 70));
        assert!(!r.is_inner_zoom);
        assert_eq!((r.wide_min_focus_distance, r.telephoto_min_focus_distance), (300.0, 1000.0));
        assert!(!r.is_drip_proof);
        assert_eq!(r.price, -1);
    }

    #[test]
    fn override_and_prime() {
        let out = run();
        let zoom = find(&out, "H-HSA35100");
        assert!(zoom.is_inner_zoom);
        let prime = find(&out, "S-S50");
        assert_eq!((prime.wide_focal_length, prime.telephoto_focal_length), (50, 50));
        assert_eq!(prime.wide_f_number, 1.8);
        assert_eq!(prime.wide_min_focus_distance, 450.0);
        assert_eq!(prime.max_photographing_magnification, 0.15);
        assert_eq!(prime.filter_diameter, 67.0);
        assert!(prime.is_inner_zoom);
        assert_eq!(prime.mount, Mount::LeicaL);
    }

    #[test]
    fn missing_product_number_is_reported() {
        let mut raw = RawFields::new("LUMIX G 25mm / F1.7 ASPH.", "");
        raw.insert("35mm判換算焦点距離", "50mm");
        let err = to_records(&[raw], &TABLES[0], &MakerOverrides::default()).unwrap_err();
        assert!(matches!(err, ExtractError::MissingField { ref field, .. } if field == "品番"));
    }

    fn prime_column(focus: Option<&str>) -> RawFields {
        let mut raw = RawFields::new("LUMIX G 25mm / F1.7 ASPH.", "");
        raw.insert("品番", "H-H025");
        raw.insert("35mm判換算焦点距離", "50mm");
        if let Some(focus) = focus {
            raw.insert("最短撮影距離", focus);
        }
        raw
    }

    #[test]
    fn unreadable_focus_names_the_cell() {
        let err = to_records(&[prime_column(Some("∞"))], &TABLES[0], &MakerOverrides::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::PatternMismatch { ref field, ref value, .. }
                if field == "最短撮影距離" && value == "∞"
        ));
    }

    #[test]
    fn absent_focus_row_is_missing() {
        let err = to_records(&[prime_column(None)], &TABLES[0], &MakerOverrides::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingField { ref field, .. } if field == "最短撮影距離"));
    }
}
