use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{mismatch, require, two_column_rows, MakerOutput, RawFields};
use crate::cache::PageSource;
use crate::dom::Dom;
use crate::error::ExtractError;
use crate::lens::{LensRecord, Maker, Mount};
use crate::normalize::{self, Equivalence};
use crate::overrides::MakerOverrides;

const LISTING_URLS: [&str; 2] = [
    "https://us.leica-camera.com/Photography/Leica-SL/SL-Lenses/Prime-Lenses",
    "https://us.leica-camera.com/Photography/Leica-SL/SL-Lenses/Vario-Lenses",
];
const BASE_URL: &str = "https://us.leica-camera.com";

const RELABEL: [(&str, &str); 8] = [
    ("Order Number", "Order number"),
    ("Order-number", "Order number"),
    ("Focus range", "Working range"),
    ("Largest scale", "Largest reproduction ratio"),
    ("Filter thread", "Filter mount"),
    ("Length", "Length to bayonet mount"),
    ("Length to bayonet flange", "Length to bayonet mount"),
    ("Diameter", "Largest diameter"),
];

const OIS_LABEL: &str = "O.I.S. Performance as per CIPA";

static FOCAL_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SL(\d+)-(\d+) f").unwrap());
static FOCAL_RANGE_SPACED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SL (\d+)-(\d+) f").unwrap());
static FOCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"SL(\d+) f").unwrap());
static FOCAL_SPACED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"SL (\d+) f").unwrap());
static FOCAL_RATIO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SL 1:\d+\.?\d*/(\d+)").unwrap());
static F_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"f/(\d+\.?\d*)-(\d+\.?\d*)").unwrap());
static F_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"f/(\d+\.?\d*)").unwrap());
static F_RATIO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SL 1:(\d+\.?\d*)/\d+").unwrap());
static PER_FOCAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ff]ocal length \d+ ?mm: (\d+\.?\d*) ?m to").unwrap());
static FOCUS_MM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*) ?mm to").unwrap());
static FOCUS_M_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*) m to").unwrap());
static FOCUS_TO_M_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"to (\d+\.?\d*) m").unwrap());
static RATIO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"1:(\d+\.?\d*)").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").unwrap());
static DIM_SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)/\d+\.?\d* mm").unwrap());
static DIM_COLON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r": (\d+\.?\d*) mm").unwrap());
static DIM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*) mm").unwrap());
static WEIGHT_SLASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)/[\d.]+ g").unwrap());
static WEIGHT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([\d.]+) g").unwrap());

pub fn collect(pages: &mut dyn PageSource, overrides: &MakerOverrides) -> Result<MakerOutput> {
    let mut listed = Vec::new();
    for url in LISTING_URLS {
        let dom = pages.get_page(url, None, false)?;
        listed.extend(list_products(&dom)?);
    }
    info!(products = listed.len(), "SL lenses listed");

    let mut out = MakerOutput::default();
    for (name, url) in listed {
        let dom = pages.get_page(&url, None, true)?;
        let Some(section) = dom.find("section.tech-specs")? else {
            warn!(%name, "no technical data section");
            continue;
        };
        let mut raw = RawFields::new(&name, &url);
        for (label, value) in two_column_rows(&section.find_all("tr")?)? {
            raw.insert(&label, &value);
        }
        raw.rename_all(&RELABEL);
        out.records.push(to_record(&raw, overrides)?);
        out.raw.push(raw);
    }
    Ok(out)
}

/// Headlines read "<span>New</span> SUMMICRON-SL 50 f/2 ASPH."; the span
/// is a tag line, not part of the name.
fn list_products(dom: &Dom) -> Result<Vec<(String, String)>> {
    let mut products = Vec::new();
    for block in dom.find_all("div.h2-text-image-multi-layout.module.no-border")? {
        let Some(h2) = block.find("h2.headline-40")? else {
            continue;
        };
        let Some(span) = h2.find("span")? else {
            continue;
        };
        let Some(href) = block.find("a.red_cta")?.and_then(|a| a.attr("href")) else {
            continue;
        };
        let name = h2
            .full_text()
            .replace(&span.full_text(), "")
            .replace('\n', " ")
            .replace('–', "-");
        let name = name.trim();
        if !name.contains("f/") && !name.contains("-SL") {
            debug!(name, "skipping non-lens block");
            continue;
        }
        products.push((name.to_string(), format!("{BASE_URL}{href}")));
    }
    Ok(products)
}

fn to_record(raw: &RawFields, overrides: &MakerOverrides) -> Result<LensRecord, ExtractError> {
    let maker = Maker::Leica;
    let name = raw.name();
    let mut r = LensRecord::new(maker.label(), name, Mount::LeicaL, raw.url());
    r.product_number = raw.get("Order number").unwrap_or_default().replace(' ', "");

    let (w, t) = normalize::pair_or_single(
        name,
        &[&FOCAL_RANGE_RE, &FOCAL_RANGE_SPACED_RE],
        &[&FOCAL_RE, &FOCAL_SPACED_RE, &FOCAL_RATIO_RE],
    )
    .ok_or_else(|| mismatch(maker, raw, "focal_length", name))?;
    r.wide_focal_length = normalize::equivalent_focal_length(&w, Equivalence::FullFrame)
        .ok_or_else(|| mismatch(maker, raw, "focal_length", name))?;
    r.telephoto_focal_length = normalize::equivalent_focal_length(&t, Equivalence::FullFrame)
        .ok_or_else(|| mismatch(maker, raw, "focal_length", name))?;

    let (wf, tf) = normalize::pair_or_single(name, &[&F_RANGE_RE], &[&F_RE, &F_RATIO_RE])
        .ok_or_else(|| mismatch(maker, raw, "f_number", name))?;
    r.wide_f_number = normalize::millimeters(&wf).unwrap_or_default();
    r.telephoto_f_number = normalize::millimeters(&tf).unwrap_or_default();

    let range = require(maker, raw, &["Working range"])?;
    let (wd, td) = working_range(range).ok_or_else(|| mismatch(maker, raw, "Working range", range))?;
    r.wide_min_focus_distance = wd;
    r.telephoto_min_focus_distance = td;

    let ratio = require(maker, raw, &["Largest reproduction ratio"])?;
    r.max_photographing_magnification = normalize::extract_groups(ratio, &RATIO_RE)
        .first()
        .and_then(|d| normalize::magnification("1", d, Equivalence::FullFrame))
        .ok_or_else(|| mismatch(maker, raw, "Largest reproduction ratio", ratio))?;

    let filter = require(maker, raw, &["Filter mount"])?;
    r.filter_diameter = normalize::extract_groups(&filter.replace('E', ""), &NUMBER_RE)
        .first()
        .and_then(|d| normalize::millimeters(d))
        .ok_or_else(|| mismatch(maker, raw, "Filter mount", filter))?;

    r.has_image_stabilization = overrides.has_image_stabilization(&[name, r.product_number.as_str()]);
    if !r.has_image_stabilization && raw.get(OIS_LABEL).is_some() {
        r.has_image_stabilization = true;
        r.note(format!("has_image_stabilization: inferred from the {OIS_LABEL} row"));
    }
    r.note("is_drip_proof: not published, assumed false");

    r.overall_diameter = dimension(raw, "Largest diameter")?;
    r.overall_length = dimension(raw, "Length to bayonet mount")?;

    let weight = require(maker, raw, &["Weight"])?;
    r.weight = grams(weight).ok_or_else(|| mismatch(maker, raw, "Weight", weight))?;

    r.is_inner_zoom = super::inner_zoom(&r, overrides);
    r.validate()
}

/// Zooms list one "Focal length N mm: X m to infinity" line per end.
fn working_range(value: &str) -> Option<(f64, f64)> {
    let per_focal: Vec<&str> = PER_FOCAL_RE
        .captures_iter(value)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if per_focal.len() >= 2 {
        let (first, last) = (per_focal[0], per_focal[per_focal.len() - 1]);
        return Some((normalize::meters_to_mm(first)?, normalize::meters_to_mm(last)?));
    }
    let mm = if value.contains("mm to") {
        let (d, _) = normalize::pair_or_single(value, &[], &[&FOCUS_MM_RE])?;
        normalize::millimeters(&d)?
    } else {
        let (d, _) = normalize::pair_or_single(value, &[], &[&FOCUS_M_RE, &FOCUS_TO_M_RE])?;
        normalize::meters_to_mm(&d)?
    };
    Some((mm, mm))
}

/// Thin spaces separate numbers from units on some pages.
fn dimension(raw: &RawFields, label: &str) -> Result<f64, ExtractError> {
    let value = require(Maker::Leica, raw, &[label])?;
    let text = value.replace('\u{2009}', " ");
    let re: &Regex = if text.contains('/') {
        &DIM_SLASH_RE
    } else if text.contains(':') {
        &DIM_COLON_RE
    } else {
        &DIM_RE
    };
    normalize::extract_groups(&text, re)
        .first()
        .and_then(|d| normalize::millimeters(d))
        .ok_or_else(|| mismatch(Maker::Leica, raw, label, value))
}

/// German thousands separators: "1.154 g" is 1154 g.
fn grams(value: &str) -> Option<f64> {
    let text = value.replace('\u{2009}', " ");
    let captured = normalize::extract_groups(&text, &WEIGHT_SLASH_RE)
        .into_iter()
        .chain(normalize::extract_groups(&text, &WEIGHT_RE))
        .next()
        .or_else(|| Some(text.trim().to_string()))?;
    normalize::millimeters(&captured.replace('.', ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::FixturePages;

    const SUMMICRON: &str = "https://us.leica-camera.com/Photography/Leica-SL/SL-Lenses/Prime-Lenses/SUMMICRON-SL-50-f-2-ASPH";
    const VARIO: &str = "https://us.leica-camera.com/Photography/Leica-SL/SL-Lenses/Vario-Lenses/VARIO-ELMARIT-SL-24-90";
    const APO_VARIO: &str = "https://us.leica-camera.com/Photography/Leica-SL/SL-Lenses/Vario-Lenses/APO-VARIO-ELMARIT-SL-90-280";

    fn run() -> MakerOutput {
        let mut pages = FixturePages::default()
            .with(LISTING_URLS[0], "leica/prime.html")
            .with(LISTING_URLS[1], "leica/vario.html")
            .with(SUMMICRON, "leica/summicron_sl_50.html")
            .with(VARIO, "leica/vario_elmarit_sl_24_90.html")
            .with(APO_VARIO, "leica/apo_vario_elmarit_sl_90_280.html");
        let overrides = crate::overrides::Overrides::builtin().for_maker(Maker::Leica);
        collect(&mut pages, &overrides).unwrap()
    }

    #[test]
    fn names_drop_tag_lines() {
        let out = run();
        let names: Vec<&str> = out.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "SUMMICRON-SL 50 f/2 ASPH.",
                "VARIO-ELMARIT-SL24-90 f/2.8-4 ASPH.",
                "APO VARIO-ELMARIT-SL90-280 f/2.8-4",
            ]
        );
    }

    #[test]
    fn prime_with_relabeled_rows() {
        let out = run();
        let r = &out.records[0];
        assert_eq!(r.product_number, "11185");
        assert_eq!((r.wide_focal_length, r.telephoto_focal_length), (50, 50));
        assert_eq!((r.wide_f_number, r.telephoto_f_number), (2.0, 2.0));
        assert_eq!(r.wide_min_focus_distance, 400.0);
        assert_eq!(r.max_photographing_magnification, 0.16);
        assert_eq!(r.filter_diameter, 67.0);
        assert_eq!((r.overall_diameter, r.overall_length), (73.0, 102.0));
        assert_eq!(r.weight, 740.0);
        assert_eq!(r.price, -1);
        assert!(!r.has_image_stabilization);
        assert!(r.is_inner_zoom);
    }

    #[test]
    fn zoom_per_focal_length_lines() {
        let out = run();
        let r = &out.records[1];
        assert_eq!(r.product_number, "11176");
        assert_eq!((r.wide_focal_length, r.telephoto_focal_length), (24, 90));
        assert_eq!((r.wide_f_number, r.telephoto_f_number), (2.8, 4.0));
        assert_eq!((r.wide_min_focus_distance, r.telephoto_min_focus_distance), (300.0, 450.0));
        assert_eq!(r.weight, 1140.0);
        assert!(r.has_image_stabilization);
        assert!(!r.is_inner_zoom);
    }

    #[test]
    fn telephoto_zoom_overrides() {
        let out = run();
        let r = &out.records[2];
        assert!(r.is_inner_zoom);
        assert!(r.has_image_stabilization);
        assert_eq!(r.weight, 1710.0);
        assert_eq!((r.overall_diameter, r.overall_length), (88.0, 238.0));
    }

    #[test]
    fn working_range_forms() {
        assert_eq!(working_range("0.4 m to infinity"), Some((400.0, 400.0)));
        assert_eq!(working_range("450 mm to infinity"), Some((450.0, 450.0)));
        assert_eq!(working_range("infinity to 0.6 m"), Some((600.0, 600.0)));
        assert_eq!(
            working_range("Focal length 24 mm: 0.3 m to infinity, Focal length 90 mm: 0.45 m to infinity"),
            Some((300.0, 450.0))
        );
    }

    #[test]
    fn weights_with_separators() {
        assert_eq!(grams("approx. 1.710/1.940 g (with tripod collar)"), Some(1710.0));
        assert_eq!(grams("740\u{2009}g"), Some(740.0));
    }
}
