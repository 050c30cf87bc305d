use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use super::{mismatch, require, MakerOutput, RawFields};
use crate::cache::PageSource;
use crate::dom::Dom;
use crate::error::ExtractError;
use crate::lens::{LensRecord, Maker, Mount};
use crate::normalize::{self, Equivalence};
use crate::overrides::MakerOverrides;

/// Samyang is sold in Japan through Kenko Tokina, whose catalogue lists
/// every mount variant as its own item.
const LISTING_URL: &str = "https://www.kenko-tokina.co.jp/camera-lens/samyang/";
const MOUNT_ATTR: &str = "data-spec3";

const RELABEL: [(&str, &str); 5] = [
    ("大きさ", "最大径×全長"),
    ("大きさ（最大径×全長）", "最大径×全長"),
    ("重さ", "質量"),
    ("最大撮影倍率（倍）", "最大撮影倍率"),
    ("価格", "希望小売価格"),
];

static FOCAL_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*[-～~]\s*(\d+\.?\d*)\s*mm").unwrap());
static FOCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*mm").unwrap());
static APERTURE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[FT](\d+\.?\d*)").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").unwrap());
static FOCUS_CM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*cm").unwrap());
static FOCUS_MM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*mm").unwrap());
static FOCUS_M_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*m").unwrap());
static TIMES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*倍").unwrap());
static FILTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*mm").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\s*(?:mm)?\s*[×xX]\s*(\d+\.?\d*)").unwrap());

pub fn collect(pages: &mut dyn PageSource, overrides: &MakerOverrides) -> Result<MakerOutput> {
    let listing = pages.get_page(LISTING_URL, None, false)?;
    let products = list_products(&listing)?;
    info!(products = products.len(), "SAMYANG Micro Four Thirds lenses listed");

    let mut out = MakerOutput::default();
    for (name, url) in products {
        let dom = pages.get_page(&url, None, true)?;
        let raw = read_tables(&dom, &name, &url)?;
        if !raw.has_specs() {
            debug!(%name, "no spec table");
            continue;
        }
        out.records.push(to_record(&raw, overrides)?);
        out.raw.push(raw);
    }
    Ok(out)
}

fn list_products(dom: &Dom) -> Result<Vec<(String, String)>> {
    let mut products = Vec::new();
    for item in dom.find_all("li.col.list_item")? {
        let Some(a) = item.find("h3 > a")? else {
            continue;
        };
        let Some(href) = a.attr("href") else {
            continue;
        };
        let mounts = item.attr(MOUNT_ATTR).unwrap_or_default();
        if mounts.contains("マイクロフォーサーズ") {
            products.push((a.text(), href.to_string()));
        }
    }
    Ok(products)
}

/// Specs are split over several `th`/`td` tables; later rows win.
fn read_tables(dom: &Dom, name: &str, url: &str) -> Result<RawFields> {
    let mut raw = RawFields::new(name, url);
    for table in dom.find_all("table")? {
        for tr in table.find_all("tr")? {
            let (Some(th), Some(td)) = (tr.find("th")?, tr.find("td")?) else {
                continue;
            };
            let (label, value) = (th.text(), td.text());
            if !label.is_empty() && !value.is_empty() {
                raw.insert(&label, &value);
            }
        }
    }
    raw.rename_all(&RELABEL);
    Ok(raw)
}

fn to_record(raw: &RawFields, overrides: &MakerOverrides) -> Result<LensRecord, ExtractError> {
    let maker = Maker::Samyang;
    let mut r = LensRecord::new(maker.label(), raw.name(), Mount::MicroFourThirds, raw.url());
    let eq = Equivalence::MicroFourThirds;

    let focal = require(maker, raw, &["焦点距離"])?;
    let (w, t) = normalize::pair_or_single(focal, &[&FOCAL_RANGE_RE], &[&FOCAL_RE])
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;
    r.wide_focal_length = normalize::equivalent_focal_length(&w, eq)
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;
    r.telephoto_focal_length = normalize::equivalent_focal_length(&t, eq)
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;

    let f_number = f_number(raw).ok_or_else(|| mismatch(maker, raw, "f_number", raw.name()))?;
    r.wide_f_number = f_number;
    r.telephoto_f_number = f_number;

    let focus = require(maker, raw, &["最短撮影距離"])?;
    let distance = min_focus(focus).ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;
    r.wide_min_focus_distance = distance;
    r.telephoto_min_focus_distance = distance;

    let ratio = require(maker, raw, &["最大撮影倍率"])?;
    r.max_photographing_magnification =
        magnification(ratio, eq).ok_or_else(|| mismatch(maker, raw, "最大撮影倍率", ratio))?;

    // Fisheyes publish "装着不可" here.
    r.filter_diameter = raw
        .get("フィルターサイズ")
        .and_then(|f| normalize::extract_groups(f, &FILTER_RE).into_iter().next())
        .and_then(|d| normalize::millimeters(&d))
        .unwrap_or(-1.0);

    r.note("is_drip_proof: not published, assumed false");
    r.note("has_image_stabilization: manual lens, assumed false");

    let size = require(maker, raw, &["最大径×全長"])?;
    let (d, l) = normalize::dimensions(size, &SIZE_RE)
        .ok_or_else(|| mismatch(maker, raw, "最大径×全長", size))?;
    r.overall_diameter = d;
    r.overall_length = l;

    let weight = require(maker, raw, &["質量"])?;
    r.weight = normalize::grams(weight).ok_or_else(|| mismatch(maker, raw, "質量", weight))?;

    r.price = raw.get("希望小売価格").and_then(normalize::yen).unwrap_or(-1);

    r.is_inner_zoom = super::inner_zoom(&r, overrides);
    r.validate()
}

/// Still lenses carry `F2.0` in the name, cine lenses `T1.5`; otherwise the
/// table's aperture row.
fn f_number(raw: &RawFields) -> Option<f64> {
    let from_name = normalize::extract_groups(raw.name(), &APERTURE_RE).into_iter().next();
    let quoted = from_name.or_else(|| {
        raw.first_of(&["開放F値", "明るさ"])
            .and_then(|v| normalize::extract_groups(v, &NUMBER_RE).into_iter().next())
    })?;
    normalize::millimeters(&quoted)
}

fn min_focus(value: &str) -> Option<f64> {
    if let Some((d, _)) = normalize::pair_or_single(value, &[], &[&FOCUS_CM_RE]) {
        return normalize::centimeters_to_mm(&d);
    }
    if let Some((d, _)) = normalize::pair_or_single(value, &[], &[&FOCUS_MM_RE]) {
        return normalize::millimeters(&d);
    }
    let (d, _) = normalize::pair_or_single(value, &[], &[&FOCUS_M_RE])?;
    normalize::meters_to_mm(&d)
}

/// `1:11.5` ratios or `0.09倍` multipliers, both on the actual sensor.
fn magnification(value: &str, eq: Equivalence) -> Option<f64> {
    if let Some(m) = normalize::ratio_to_magnification(value, eq) {
        return Some(m);
    }
    let times = normalize::extract_groups(value, &TIMES_RE).into_iter().next()?;
    normalize::decimal(&times).map(|d| normalize::round2(d * eq.factor()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::FixturePages;

    const NCS_12: &str = "https://www.kenko-tokina.co.jp/camera-lens/samyang/12mm-f20-ncs-cs-mft.html";
    const FISHEYE_75: &str = "https://www.kenko-tokina.co.jp/camera-lens/samyang/75mm-f35-umc-fisheye-mft.html";

    fn run() -> (MakerOutput, FixturePages) {
        let mut pages = FixturePages::default()
            .with(LISTING_URL, "samyang/listing.html")
            .with(NCS_12, "samyang/12mm-f20-ncs-cs.html")
            .with(FISHEYE_75, "samyang/75mm-f35-fisheye.html");
        let overrides = crate::overrides::Overrides::builtin().for_maker(Maker::Samyang);
        let out = collect(&mut pages, &overrides).unwrap();
        (out, pages)
    }

    #[test]
    fn lists_micro_four_thirds_only() {
        let (out, pages) = run();
        let names: Vec<&str> = out.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["SAMYANG 12mm F2.0 NCS CS マイクロフォーサーズ用", "SAMYANG 7.5mm F3.5 UMC Fish-eye MFT"]
        );
        let cached: Vec<bool> = pages.requests.iter().map(|(_, cached)| *cached).collect();
        assert_eq!(cached, vec![false, true, true]);
    }

    #[test]
    fn merges_every_table() {
        let (out, _) = run();
        let r = &out.records[0];
        assert_eq!(r.maker, "SAMYANG");
        assert_eq!(r.mount, Mount::MicroFourThirds);
        assert_eq!((r.wide_focal_length, r.telephoto_focal_length), (24, 24));
        assert_eq!(r.wide_f_number, 2.0);
        assert_eq!(r.wide_min_focus_distance, 200.0);
        assert_eq!(r.max_photographing_magnification, 0.17);
        assert_eq!(r.filter_diameter, 67.0);
        assert_eq!((r.overall_diameter, r.overall_length), (67.5, 59.0));
        assert_eq!(r.weight, 245.0);
        assert_eq!(r.price, 41800);
        assert!(r.is_inner_zoom);
        assert_eq!(out.raw[0].get("JANコード"), Some("8809298882051"));
    }

    #[test]
    fn fisheye_without_filter_or_price() {
        let (out, _) = run();
        let r = &out.records[1];
        assert_eq!(r.wide_focal_length, 15);
        assert_eq!(r.wide_f_number, 3.5);
        assert_eq!(r.wide_min_focus_distance, 90.0);
        assert_eq!(r.max_photographing_magnification, 0.18);
        assert_eq!(r.filter_diameter, -1.0);
        assert_eq!((r.overall_diameter, r.overall_length), (60.0, 57.5));
        assert_eq!(r.weight, 197.0);
        assert_eq!(r.price, -1);
    }

    #[test]
    fn cine_and_table_apertures() {
        let mut raw = RawFields::new("SAMYANG 35mm T1.5 VDSLR AS UMC II", "");
        assert_eq!(f_number(&raw), Some(1.5));
        raw = RawFields::new("SAMYANG 300mm Reflex", "");
        raw.insert("開放F値", "F6.3");
        assert_eq!(f_number(&raw), Some(6.3));
    }

    #[test]
    fn focus_units() {
        assert_eq!(min_focus("0.28m"), Some(280.0));
        assert_eq!(min_focus("9cm"), Some(90.0));
        assert_eq!(min_focus("280mm"), Some(280.0));
        assert_eq!(min_focus("不明"), None);
    }
}
