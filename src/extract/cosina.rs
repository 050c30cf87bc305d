use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::info;

use super::{mismatch, require, MakerOutput, RawFields};
use crate::cache::PageSource;
use crate::dom::Dom;
use crate::error::ExtractError;
use crate::lens::{LensRecord, Maker, Mount};
use crate::normalize::{self, Equivalence};
use crate::overrides::MakerOverrides;

const LISTING_URL: &str = "http://www.cosina.co.jp/seihin/voigtlander/mft-mount/index.html";
const BASE_URL: &str = "http://www.cosina.co.jp/seihin/voigtlander/mft-mount/";
const ENCODING: &str = "windows-31j";

static FOCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)mm").unwrap());
static F_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)").unwrap());
static FOCUS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)m").unwrap());
static RATIO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"1(?::|：)(\d+\.?\d*)").unwrap());
static FILTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)mm").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"φ(\d+\.?\d*)×(\d+\.?\d*)mm").unwrap());
static WEIGHT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)g").unwrap());
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"￥([\d,]+)").unwrap());

pub fn collect(pages: &mut dyn PageSource, overrides: &MakerOverrides) -> Result<MakerOutput> {
    let listing = pages.get_page(LISTING_URL, Some(ENCODING), false)?;
    let products = list_products(&listing, overrides)?;
    info!(products = products.len(), "Voigtlander lenses listed");

    let mut out = MakerOutput::default();
    for (name, url) in products {
        let dom = pages.get_page(&url, Some(ENCODING), true)?;
        let raw = read_detail(&dom, &name, &url)?;
        out.records.push(to_record(&raw)?);
        out.raw.push(raw);
    }
    Ok(out)
}

/// Listing images carry short labels; each must map to a full product name.
fn list_products(dom: &Dom, overrides: &MakerOverrides) -> Result<Vec<(String, String)>> {
    let mut products = Vec::new();
    for a in dom.find_all("td > a")? {
        let (Some(href), Some(img)) = (a.attr("href"), a.find("img")?) else {
            continue;
        };
        let label = img.attr("alt").unwrap_or_default();
        if !label.contains("mm") || !href.contains("mft") {
            continue;
        }
        let name = overrides.alias(label).ok_or_else(|| ExtractError::UnsupportedProduct {
            maker: Maker::Cosina.label().to_string(),
            label: label.to_string(),
        })?;
        products.push((name.to_string(), format!("{BASE_URL}{href}")));
    }
    Ok(products)
}

/// Spec rows have a shaded label cell; the price sits in a heading.
fn read_detail(dom: &Dom, name: &str, url: &str) -> Result<RawFields> {
    let mut raw = RawFields::new(name, url);
    for tr in dom.find_all("tr")? {
        let tds = tr.find_all("td")?;
        if tds.len() < 2 || !tds[0].has_attr("bgcolor") {
            continue;
        }
        let (label, value) = (tds[0].text(), tds[1].text());
        if label.is_empty() || value.is_empty() {
            continue;
        }
        raw.insert(&label, &value);
    }
    for h2 in dom.find_all("h2")? {
        let text = h2.text();
        if text.contains("希望小売価格") {
            raw.insert("希望小売価格", &text.replace('\n', ""));
        }
    }
    Ok(raw)
}

fn to_record(raw: &RawFields) -> Result<LensRecord, ExtractError> {
    let maker = Maker::Cosina;
    let mut r = LensRecord::new(maker.label(), raw.name(), Mount::MicroFourThirds, raw.url());
    let eq = Equivalence::MicroFourThirds;

    // Voigtlander MFT lenses are all primes, so every value is a single one.
    let focal = require(maker, raw, &["焦点距離"])?;
    let (w, t) = normalize::pair_or_single(focal, &[], &[&FOCAL_RE])
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;
    r.wide_focal_length = normalize::equivalent_focal_length(&w, eq)
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;
    r.telephoto_focal_length = normalize::equivalent_focal_length(&t, eq)
        .ok_or_else(|| mismatch(maker, raw, "焦点距離", focal))?;

    let (wf, tf) = normalize::pair_or_single(raw.name(), &[], &[&F_RE])
        .ok_or_else(|| mismatch(maker, raw, "f_number", raw.name()))?;
    r.wide_f_number =
        normalize::millimeters(&wf).ok_or_else(|| mismatch(maker, raw, "f_number", raw.name()))?;
    r.telephoto_f_number =
        normalize::millimeters(&tf).ok_or_else(|| mismatch(maker, raw, "f_number", raw.name()))?;

    let focus = require(maker, raw, &["最短撮影距離"])?;
    let (wd, td) = normalize::pair_or_single(focus, &[], &[&FOCUS_RE])
        .ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;
    r.wide_min_focus_distance =
        normalize::meters_to_mm(&wd).ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;
    r.telephoto_min_focus_distance =
        normalize::meters_to_mm(&td).ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;

    // Ratios are quoted on the actual sensor; doubled like the focal length.
    let ratio = require(maker, raw, &["最大撮影倍率"])?;
    r.max_photographing_magnification = normalize::extract_groups(ratio, &RATIO_RE)
        .first()
        .and_then(|d| normalize::magnification("1", d, eq))
        .ok_or_else(|| mismatch(maker, raw, "最大撮影倍率", ratio))?;
    r.note("max_photographing_magnification: sensor ratio doubled to 35mm equivalent");

    let filter = require(maker, raw, &["フィルターサイズ"])?;
    r.filter_diameter = normalize::extract_groups(filter, &FILTER_RE)
        .first()
        .and_then(|d| normalize::millimeters(d))
        .ok_or_else(|| mismatch(maker, raw, "フィルターサイズ", filter))?;

    r.note("is_drip_proof: not published, assumed false");
    r.note("has_image_stabilization: manual lens, assumed false");

    let size = require(maker, raw, &["最大径×全長"])?;
    let (d, l) = normalize::dimensions(size, &SIZE_RE)
        .ok_or_else(|| mismatch(maker, raw, "最大径×全長", size))?;
    r.overall_diameter = d;
    r.overall_length = l;

    let weight = require(maker, raw, &["重量"])?;
    r.weight = normalize::extract_groups(weight, &WEIGHT_RE)
        .first()
        .and_then(|w| normalize::millimeters(w))
        .ok_or_else(|| mismatch(maker, raw, "重量", weight))?;

    let price = require(maker, raw, &["希望小売価格"])?;
    r.price = normalize::extract_groups(price, &PRICE_RE)
        .first()
        .and_then(|p| normalize::decimal(p))
        .map(normalize::truncate)
        .ok_or_else(|| mismatch(maker, raw, "希望小売価格", price))?;

    r.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::FixturePages;

    fn pages() -> FixturePages {
        FixturePages::default()
            .with(LISTING_URL, "cosina/index.html")
            .with(&format!("{BASE_URL}mft42.5mm/index.html"), "cosina/mft42.5mm.html")
            .with(&format!("{BASE_URL}mft29mm/index.html"), "cosina/mft29mm.html")
    }

    fn overrides() -> MakerOverrides {
        crate::overrides::Overrides::builtin().for_maker(Maker::Cosina)
    }

    #[test]
    fn aliases_listing_labels() {
        let out = collect(&mut pages(), &overrides()).unwrap();
        let names: Vec<&str> = out.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Voigtlander NOKTON 42.5mm F0.95", "Voigtlander SUPER NOKTON 29mm F0.8 Aspherical"]
        );
    }

    #[test]
    fn only_detail_pages_are_cached() {
        let mut pages = pages();
        collect(&mut pages, &overrides()).unwrap();
        let cached: Vec<bool> = pages.requests.iter().map(|(_, cached)| *cached).collect();
        assert_eq!(cached, vec![false, true, true]);
    }

    #[test]
    fn nokton_values() {
        let out = collect(&mut pages(), &overrides()).unwrap();
        let r = &out.records[0];
        assert_eq!((r.wide_focal_length, r.telephoto_focal_length), (85, 85));
        assert_eq!((r.wide_f_number, r.telephoto_f_number), (0.95, 0.95));
        assert_eq!(r.wide_min_focus_distance, 230.0);
        assert_eq!(r.max_photographing_magnification, 0.5);
        assert_eq!(r.filter_diameter, 58.0);
        assert_eq!((r.overall_diameter, r.overall_length), (64.3, 74.6));
        assert_eq!(r.weight, 571.0);
        assert_eq!(r.price, 115000);
        assert_eq!(r.product_number, "");
        assert!(r.is_inner_zoom);
        assert!(!r.is_drip_proof && !r.has_image_stabilization);
        assert_eq!(r.url, format!("{BASE_URL}mft42.5mm/index.html"));
    }

    #[test]
    fn super_nokton_values() {
        let out = collect(&mut pages(), &overrides()).unwrap();
        let r = &out.records[1];
        assert_eq!(r.wide_focal_length, 58);
        assert_eq!(r.wide_f_number, 0.8);
        assert_eq!(r.wide_min_focus_distance, 370.0);
        assert_eq!(r.max_photographing_magnification, 0.2);
        assert_eq!(r.price, 165000);
    }

    #[test]
    fn single_values_fill_both_ends() {
        let out = collect(&mut pages(), &overrides()).unwrap();
        for r in &out.records {
            assert_eq!(r.wide_focal_length, r.telephoto_focal_length, "{}", r.name);
            assert_eq!(r.wide_f_number, r.telephoto_f_number, "{}", r.name);
            assert_eq!(r.wide_min_focus_distance, r.telephoto_min_focus_distance, "{}", r.name);
        }
        assert_eq!(out.records[1].telephoto_min_focus_distance, 370.0);
    }

    #[test]
    fn doubled_magnification_is_noted() {
        let out = collect(&mut pages(), &overrides()).unwrap();
        for r in &out.records {
            assert!(
                r.heuristics.iter().any(|h| h.starts_with("max_photographing_magnification:")),
                "{}",
                r.name
            );
        }
    }

    #[test]
    fn unknown_label_is_unsupported() {
        let mut overrides = overrides();
        overrides.name_aliases.remove("29mm");
        let err = collect(&mut pages(), &overrides).unwrap_err();
        let err = err.downcast::<ExtractError>().unwrap();
        assert!(matches!(err, ExtractError::UnsupportedProduct { ref label, .. } if label == "29mm"));
    }
}
