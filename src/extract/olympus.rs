use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use super::{mismatch, require, MakerOutput, RawFields};
use crate::cache::PageSource;
use crate::dom::{Dom, Node};
use crate::error::ExtractError;
use crate::lens::{LensRecord, Maker, Mount};
use crate::normalize::{self, Equivalence};
use crate::overrides::MakerOverrides;

const LISTING_URL: &str = "https://www.olympus-imaging.jp/product/dslr/mlens/index.html";
const PRODUCT_PATH: &str = "/product/dslr/mlens/";
const PRODUCT_BASE: &str = "https://www.olympus-imaging.jp/product/dslr/mlens/";

const SIZE_LABEL: &str = "大きさ 最大径×全長";
const DRIP_LABEL: &str = "防滴処理";

/// Historical spellings of the same rows.
const RELABEL: [(&str, &str); 5] = [
    ("大きさ　最大径×長さ", SIZE_LABEL),
    ("大きさ　最大径 × 全長", SIZE_LABEL),
    ("大きさ　最大径×全長", SIZE_LABEL),
    ("大きさ 最大径 x 全長", SIZE_LABEL),
    ("防滴性能 / 防塵機構", DRIP_LABEL),
];

static FOCAL_RANGE_JA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)mm～(\d+\.?\d*)mm").unwrap());
static FOCAL_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)-(\d+\.?\d*)mm").unwrap());
static FOCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)mm").unwrap());
static F_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)-(\d+\.?\d*)").unwrap());
static F_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)").unwrap());
static FOCUS_WT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m\s*（ワイド）.*?(\d+\.?\d*)m\s*（テレ）").unwrap());
static FOCUS_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m\s*/\s*(\d+\.?\d*)m").unwrap());
static FOCUS_CM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)cm").unwrap());
static FOCUS_M_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m").unwrap());
static MAG_EQUIV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"35mm判換算\D*?(\d+\.?\d*)\s*倍").unwrap());
static MAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*倍").unwrap());
static FILTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*mm").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\D+(\d+\.?\d*)").unwrap());

pub fn collect(pages: &mut dyn PageSource, overrides: &MakerOverrides) -> Result<MakerOutput> {
    let listing = pages.get_page(LISTING_URL, None, false)?;
    let products = list_products(&listing)?;
    info!(products = products.len(), "M.ZUIKO lenses listed");

    let mut out = MakerOutput::default();
    for (name, product_number) in products {
        let spec_url = format!("{PRODUCT_BASE}{product_number}/spec.html");
        let index_url = format!("{PRODUCT_BASE}{product_number}/index.html");
        let mut raw = RawFields::new(&name, &index_url);
        raw.insert("product_number", &product_number);

        let spec = pages.get_page(&spec_url, None, true)?;
        read_spec_table(&spec, &mut raw).with_context(|| format!("spec table of {name}"))?;
        let index = pages.get_page(&index_url, None, true)?;
        read_index_table(&index, &mut raw)?;
        raw.rename_all(&RELABEL);

        out.records.push(to_record(&raw, overrides)?);
        out.raw.push(raw);
    }
    Ok(out)
}

/// (name, product number) for every M.ZUIKO entry.
fn list_products(dom: &Dom) -> Result<Vec<(String, String)>> {
    let mut products = Vec::new();
    for a in dom.find_all("h2.productName > a")? {
        let text = a.full_text();
        let name = text.split('/').next().unwrap_or_default().replace('\n', "");
        let name = name.trim();
        if !name.contains("M.ZUIKO") {
            debug!(name, "skipping non M.ZUIKO entry");
            continue;
        }
        let Some(href) = a.attr("href") else {
            continue;
        };
        let product_number = href.replace(PRODUCT_PATH, "").replace("/index.html", "");
        products.push((name.to_string(), product_number));
    }
    Ok(products)
}

/// Header cells wrap their label in a span, a strong, or nothing.
fn header_label(th: &Node<'_>) -> Result<String> {
    let inner = match th.find("span")? {
        Some(span) => Some(span),
        None => th.find("strong")?,
    };
    Ok(inner.unwrap_or(*th).text())
}

fn read_spec_table(dom: &Dom, raw: &mut RawFields) -> Result<()> {
    let Some(table) = dom.find("table")? else {
        anyhow::bail!("no table");
    };
    for tr in table.find_all("tr")? {
        let (Some(th), Some(td)) = (tr.find("th")?, tr.find("td")?) else {
            continue;
        };
        raw.insert(&header_label(&th)?, &td.text());
    }
    Ok(())
}

/// The top page's table pairs headers and cells positionally; some pages
/// break the row structure around the price.
fn read_index_table(dom: &Dom, raw: &mut RawFields) -> Result<()> {
    let Some(table) = dom.find("table")? else {
        return Ok(());
    };
    for (th, td) in table.find_all("th")?.iter().zip(table.find_all("td")?) {
        raw.insert(&header_label(th)?, &td.text());
    }
    Ok(())
}

fn to_record(raw: &RawFields, overrides: &MakerOverrides) -> Result<LensRecord, ExtractError> {
    let maker = Maker::Olympus;
    let mut r = LensRecord::new(maker.label(), raw.name(), Mount::MicroFourThirds, raw.url());
    r.product_number = raw.get("product_number").unwrap_or_default().to_string();

    let focal = require(maker, raw, &["焦点距離"])?;
    let (w, t) = normalize::pair_or_single(
        focal,
        &[&FOCAL_RANGE_JA_RE, &FOCAL_RANGE_RE],
        &[&FOCAL_RE],
    )
    .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;
    let eq = Equivalence::MicroFourThirds;
    r.wide_focal_length = normalize::equivalent_focal_length(&w, eq)
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;
    r.telephoto_focal_length = normalize::equivalent_focal_length(&t, eq)
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;

    let (wf, tf) = normalize::pair_or_single(raw.name(), &[&F_RANGE_RE], &[&F_RE])
        .ok_or_else(|| mismatch(maker, raw, "f_number", raw.name()))?;
    r.wide_f_number = normalize::millimeters(&wf).unwrap_or_default();
    r.telephoto_f_number = normalize::millimeters(&tf).unwrap_or_default();

    let focus = require(maker, raw, &["最短撮影距離"])?;
    let (wd, td) = min_focus(focus).ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;
    r.wide_min_focus_distance = wd;
    r.telephoto_min_focus_distance = td;

    r.max_photographing_magnification = magnification(raw)?;

    r.filter_diameter = raw
        .get("フィルターサイズ")
        .and_then(|f| normalize::extract_groups(f, &FILTER_RE).into_iter().next())
        .and_then(|d| normalize::millimeters(&d))
        .unwrap_or(-1.0);

    if drip_proof(raw) {
        r.is_drip_proof = true;
        r.note("is_drip_proof: inferred from a 防滴 label");
    }
    if stabilized(raw) {
        r.has_image_stabilization = true;
        r.note("has_image_stabilization: inferred from a 手ぶれ補正 label");
    }

    let size = require(maker, raw, &[SIZE_LABEL])?;
    let (d, l) = normalize::dimensions(size, &SIZE_RE)
        .ok_or_else(|| mismatch(maker, raw, SIZE_LABEL, size))?;
    r.overall_diameter = d;
    r.overall_length = l;

    let weight = require(maker, raw, &["質量"])?;
    r.weight = normalize::grams(weight).ok_or_else(|| mismatch(maker, raw, "質量", weight))?;

    r.price = raw.get("希望小売価格").and_then(normalize::yen).unwrap_or(-1);
    r.is_inner_zoom = super::inner_zoom(&r, overrides);
    r.validate()
}

/// Metres as a (wide, tele) pair first, then a single value in cm or m.
fn min_focus(value: &str) -> Option<(f64, f64)> {
    if let Some((w, t)) = normalize::pair_or_single(value, &[&FOCUS_WT_RE, &FOCUS_PAIR_RE], &[]) {
        return Some((normalize::meters_to_mm(&w)?, normalize::meters_to_mm(&t)?));
    }
    if let Some((w, _)) = normalize::pair_or_single(value, &[], &[&FOCUS_CM_RE]) {
        let mm = normalize::centimeters_to_mm(&w)?;
        return Some((mm, mm));
    }
    let (w, _) = normalize::pair_or_single(value, &[], &[&FOCUS_M_RE])?;
    let mm = normalize::meters_to_mm(&w)?;
    Some((mm, mm))
}

/// The 35mm-equivalent figure when quoted in any magnification row,
/// otherwise the largest actual one doubled.
fn magnification(raw: &RawFields) -> Result<f64, ExtractError> {
    let value = require(Maker::Olympus, raw, &["最大撮影倍率"])?;
    let equivalent_rows = [
        Some(value),
        raw.get("35mm判換算最大撮影倍率"),
        raw.get("最大撮影倍率（35mm判換算）"),
    ];
    if let Some(m) = equivalent_rows
        .iter()
        .flatten()
        .find_map(|v| normalize::extract_groups(v, &MAG_EQUIV_RE).into_iter().next())
        .and_then(|m| normalize::decimal(&m))
    {
        return Ok(normalize::round2(m));
    }
    MAG_RE
        .captures_iter(value)
        .filter_map(|c| normalize::decimal(&c[1]))
        .max()
        .map(|m| normalize::round2(m * Equivalence::MicroFourThirds.factor()))
        .ok_or_else(|| mismatch(Maker::Olympus, raw, "最大撮影倍率", value))
}

fn affirmative(value: &str) -> bool {
    let v = value.trim();
    !(v.is_empty() || v == "-" || v == "－" || v == "―" || v.contains("なし"))
}

fn drip_proof(raw: &RawFields) -> bool {
    raw.iter().any(|(label, value)| label.contains("防滴") && affirmative(value))
}

fn stabilized(raw: &RawFields) -> bool {
    raw.iter().any(|(label, value)| label.contains("手ぶれ補正") && affirmative(value))
}
