use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use super::{apply_swap, mismatch, require, two_column_rows, MakerOutput, RawFields};
use crate::cache::PageSource;
use crate::dom::Dom;
use crate::error::ExtractError;
use crate::lens::{LensRecord, Maker, Mount};
use crate::normalize::{self, Equivalence};
use crate::overrides::MakerOverrides;

const LISTING_URL: &str = "https://www.laowa.jp/cat1/";

const RELABEL: [(&str, &str); 9] = [
    ("フォーマット", "対応フォーマット"),
    ("対応マウント", "マウント"),
    ("寸法（鏡筒直径×長さ）", "サイズ"),
    ("最小フォーカシングディスタンス", "最短撮影距離"),
    ("最短合焦距離", "最短撮影距離"),
    ("最小撮影距離", "最短撮影距離"),
    ("最大倍率比", "最大撮影倍率"),
    ("最大倍率", "最大撮影倍率"),
    ("撮影倍率", "最大撮影倍率"),
];

static FOCAL_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)-(\d+\.?\d*)mm").unwrap());
static FOCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)mm").unwrap());
static F_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)-(\d+\.?\d*)").unwrap());
static F_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)").unwrap());
static FOCUS_MM_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)mm～(\d+\.?\d*)mm").unwrap());
static FOCUS_CM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*cm").unwrap());
static FOCUS_MM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*mm").unwrap());
static FOCUS_M_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*m").unwrap());
static RATIO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*[:：]\s*(\d+\.?\d*)").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").unwrap());
static FILTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*mm").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\D+(\d+\.?\d*)").unwrap());

pub fn collect(pages: &mut dyn PageSource, overrides: &MakerOverrides) -> Result<MakerOutput> {
    let listing = pages.get_page(LISTING_URL, None, false)?;
    let products = list_products(&listing)?;
    info!(products = products.len(), "LAOWA lenses listed");

    let mut out = MakerOutput::default();
    for (name, url) in products {
        let dom = pages.get_page(&url, None, true)?;
        let Some(table) = dom.find("div.productTable")? else {
            debug!(%name, "no spec table");
            continue;
        };
        let mut raw = RawFields::new(&name, &url);
        for (label, value) in two_column_rows(&table.find_all("tr")?)? {
            raw.insert(&label, &value);
        }
        apply_swap(&mut raw, overrides);
        raw.rename_all(&RELABEL);

        let Some(mount) = mount_of(&raw) else {
            debug!(%name, mount = ?raw.get("マウント"), "no supported mount");
            continue;
        };
        out.records.push(to_record(&raw, mount, overrides)?);
        out.raw.push(raw);
    }
    Ok(out)
}

fn list_products(dom: &Dom) -> Result<Vec<(String, String)>> {
    let mut products = Vec::new();
    for item in dom.find_all("div.product3")? {
        let (Some(h3), Some(a)) = (item.find("h3")?, item.find("a")?) else {
            continue;
        };
        let Some(href) = a.attr("href") else {
            continue;
        };
        let name = h3.text().replace('\u{3000}', " ");
        if name.contains("LAOWA") && name.contains("mm") {
            products.push((name, href.to_string()));
        }
    }
    Ok(products)
}

/// One page per optical design; the mount row lists every variant.
fn mount_of(raw: &RawFields) -> Option<Mount> {
    let mounts = raw.get("マウント")?;
    if mounts.contains("マイクロフォーサーズ") {
        Some(Mount::MicroFourThirds)
    } else if mounts.contains("Leica L") {
        Some(Mount::LeicaL)
    } else {
        None
    }
}

fn to_record(raw: &RawFields, mount: Mount, overrides: &MakerOverrides) -> Result<LensRecord, ExtractError> {
    let maker = Maker::Laowa;
    let name = raw.name();
    let mut r = LensRecord::new(maker.label(), name, mount, raw.url());
    let eq = match mount {
        Mount::MicroFourThirds => Equivalence::MicroFourThirds,
        Mount::LeicaL => Equivalence::FullFrame,
    };

    let focal = require(maker, raw, &["焦点距離"])?;
    let (w, t) = normalize::pair_or_single(focal, &[&FOCAL_RANGE_RE], &[&FOCAL_RE])
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;
    let equivalent = |s: &str| normalize::decimal(s).map(|d| normalize::round_int(d * eq.factor()));
    r.wide_focal_length = equivalent(&w).ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;
    r.telephoto_focal_length = equivalent(&t).ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;

    let (wf, tf) = normalize::pair_or_single(name, &[&F_RANGE_RE], &[&F_RE])
        .ok_or_else(|| mismatch(maker, raw, "f_number", name))?;
    r.wide_f_number = normalize::millimeters(&wf).unwrap_or_default();
    r.telephoto_f_number = normalize::millimeters(&tf).unwrap_or_default();

    let focus = require(maker, raw, &["最短撮影距離"])?;
    let (wd, td) = min_focus(focus).ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;
    r.wide_min_focus_distance = wd;
    r.telephoto_min_focus_distance = td;

    let ratio = require(maker, raw, &["最大撮影倍率"])?;
    r.max_photographing_magnification =
        magnification(ratio, eq).ok_or_else(|| mismatch(maker, raw, "最大撮影倍率", ratio))?;

    r.filter_diameter = raw
        .first_of(&["フィルターサイズ", "フィルター径", "フィルタースレッド"])
        .and_then(|f| normalize::extract_groups(f, &FILTER_RE).into_iter().next())
        .and_then(|d| normalize::millimeters(&d))
        .unwrap_or(-1.0);

    r.note("is_drip_proof: not published, assumed false");
    r.note("has_image_stabilization: not published, assumed false");

    if let Some((d, l)) = raw.get("サイズ").and_then(|s| normalize::dimensions(s, &SIZE_RE)) {
        r.overall_diameter = d;
        r.overall_length = l;
    }

    let weight = require(maker, raw, &["質量", "重量"])?;
    r.weight = normalize::grams(weight).ok_or_else(|| mismatch(maker, raw, "質量", weight))?;

    r.is_inner_zoom = super::inner_zoom(&r, overrides);
    r.validate()
}

/// Distances come as a mm range, cm, mm, or m; full-width letters appear in
/// the cm unit.
fn min_focus(value: &str) -> Option<(f64, f64)> {
    let value = value.replace('㎝', "cm").replace("cｍ", "cm").replace("ｃｍ", "cm");
    if let Some((w, t)) = normalize::pair_or_single(&value, &[&FOCUS_MM_PAIR_RE], &[]) {
        return Some((normalize::millimeters(&w)?, normalize::millimeters(&t)?));
    }
    if let Some((w, t)) = normalize::pair_or_single(&value, &[], &[&FOCUS_CM_RE]) {
        return Some((normalize::centimeters_to_mm(&w)?, normalize::centimeters_to_mm(&t)?));
    }
    if let Some((w, t)) = normalize::pair_or_single(&value, &[], &[&FOCUS_MM_RE]) {
        return Some((normalize::millimeters(&w)?, normalize::millimeters(&t)?));
    }
    let (w, t) = normalize::pair_or_single(&value, &[], &[&FOCUS_M_RE])?;
    Some((normalize::meters_to_mm(&w)?, normalize::meters_to_mm(&t)?))
}

/// "1:2" or "2:1" ratios, or a bare multiplier like "0.5x".
fn magnification(value: &str, eq: Equivalence) -> Option<f64> {
    let groups = normalize::extract_groups(value, &RATIO_RE);
    if groups.len() == 2 {
        return normalize::magnification(&groups[0], &groups[1], eq);
    }
    let quoted = normalize::extract_groups(value, &NUMBER_RE).into_iter().next()?;
    normalize::decimal(&quoted).map(|d| normalize::round2(d * eq.factor()))
}
