use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use super::{mismatch, missing, require, MakerOutput, RawFields};
use crate::cache::PageSource;
use crate::dom::Dom;
use crate::error::ExtractError;
use crate::lens::{LensRecord, Maker, Mount};
use crate::normalize::{self, Equivalence};
use crate::overrides::MakerOverrides;

const LISTING_URL: &str = "https://www.sigma-global.com/jp/lenses/";
const DISCONTINUED_URL: &str = "https://www.sigma-global.com/jp/lenses/discontinued/";

const MFT_LABEL: &str = "マイクロフォーサーズ";
const MFT_ITEM: &str = "マイクロフォーサーズマウント";
const L_ITEM: &str = "L マウント";

static FOCAL_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)-(\d+)mm").unwrap());
static FOCAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)mm").unwrap());
static F_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)-(\d+\.?\d*)").unwrap());
static F_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"F(\d+\.?\d*)").unwrap());
static FOCUS_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)-(\d+\.?\d*)cm").unwrap());
static FOCUS_WT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*) \(W\)-(\d+\.?\d*) \(T\)cm").unwrap());
static FOCUS_WT_SPACED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)\(W\) - (\d+\.?\d*)\(T\)cm").unwrap());
static FOCUS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)cm").unwrap());
static RATIO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"1:(\d+\.?\d*)").unwrap());
static FILTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+\.?\d*)mm").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)mm[^\d]*(\d+\.?\d*)mm").unwrap());

/// A listing entry. `mount` is `None` for discontinued lenses, whose page
/// decides it.
struct Listed {
    name: String,
    url: String,
    mount: Option<Mount>,
}

pub fn collect(pages: &mut dyn PageSource, overrides: &MakerOverrides) -> Result<MakerOutput> {
    let listing = pages.get_page(LISTING_URL, None, false)?;
    let mut listed = list_current(&listing)?;
    let discontinued = pages.get_page(DISCONTINUED_URL, None, false)?;
    listed.extend(list_discontinued(&discontinued)?);
    info!(products = listed.len(), "SIGMA lenses listed");

    let mut out = MakerOutput::default();
    for item in listed {
        let page = pages.get_page(&item.url, None, true)?;
        let mount = match item.mount {
            Some(mount) => mount,
            None if page.full_text().contains(MFT_LABEL) => Mount::MicroFourThirds,
            None => {
                debug!(name = %item.name, "discontinued lens without a Micro Four Thirds version");
                continue;
            }
        };
        let mut raw = RawFields::new(&item.name, &item.url);
        raw.insert("mount", mount.label());
        read_spec_fields(&page, mount, &mut raw)?;
        out.records.push(to_record(&raw, mount, overrides)?);
        out.raw.push(raw);
    }
    Ok(out)
}

/// Current lineup, once per supported mount. Micro Four Thirds entries
/// come first.
fn list_current(dom: &Dom) -> Result<Vec<Listed>> {
    let mut mft = Vec::new();
    let mut l_mount = Vec::new();
    for li in dom.find_all("div.p-lens-search__main li")? {
        let Some(href) = li.find("a")?.and_then(|a| a.attr("href")) else {
            continue;
        };
        if !href.contains("lenses") {
            continue;
        }
        let Some(h4) = li.find("h4")? else {
            continue;
        };
        let name = with_line_suffix(&h4.text(), href);
        let mounts = li.attr("data-lens-mount").unwrap_or_default();
        if mounts.contains("micro-four-thirds") {
            mft.push(Listed { name: name.clone(), url: href.to_string(), mount: Some(Mount::MicroFourThirds) });
        }
        if mounts.contains("l-mount") {
            l_mount.push(Listed { name, url: href.to_string(), mount: Some(Mount::LeicaL) });
        }
    }
    mft.extend(l_mount);
    Ok(mft)
}

/// Discontinued mirrorless lenses; only `DN` names are mirrorless.
fn list_discontinued(dom: &Dom) -> Result<Vec<Listed>> {
    let mut listed = Vec::new();
    for li in dom.find_all("li.p-support-service__item")? {
        let Some(a) = li.find("a")? else {
            continue;
        };
        let (Some(href), Some(span)) = (a.attr("href"), a.find("h4 > span")?) else {
            continue;
        };
        let name = span.text();
        if !name.contains("DN") {
            continue;
        }
        listed.push(Listed { name, url: href.to_string(), mount: None });
    }
    Ok(listed)
}

/// Product lines show in the URL but not always in the listing name.
fn with_line_suffix(name: &str, href: &str) -> String {
    if href.contains("lenses/c") && !name.contains("| Contemporary") {
        format!("{name} | Contemporary")
    } else if href.contains("lenses/a") && !name.contains("| Art") {
        format!("{name} | Art")
    } else {
        name.to_string()
    }
}

fn clean(text: &str) -> String {
    text.trim().replace('\n', " ")
}

/// Spec cells either hold one value or a list with one item per mount.
fn read_spec_fields(dom: &Dom, mount: Mount, raw: &mut RawFields) -> Result<()> {
    let item_label = match mount {
        Mount::MicroFourThirds => MFT_ITEM,
        Mount::LeicaL => L_ITEM,
    };
    let item_marker = match mount {
        Mount::MicroFourThirds => MFT_LABEL,
        Mount::LeicaL => L_ITEM,
    };
    for field in dom.find_all("div.p-spec-table__fields")? {
        let header = match field.find("div.p-spec-table__header > h3")? {
            Some(h3) => Some(h3),
            None => field.find("header.p-spec-table__header > h3")?,
        };
        let (Some(header), Some(cell)) = (header, field.find("div.p-spec-table__td")?) else {
            continue;
        };
        let label = header.text();
        match cell.find("ul")? {
            None => raw.insert(&label, &clean(&cell.full_text())),
            Some(ul) => {
                for li in ul.find_all("li")? {
                    let text = li.full_text();
                    if text.contains(item_marker) {
                        raw.insert(&label, &clean(&text.replace(item_label, "")));
                    }
                }
            }
        }
    }
    Ok(())
}

fn equivalence(name: &str, mount: Mount) -> Equivalence {
    match mount {
        Mount::MicroFourThirds => Equivalence::MicroFourThirds,
        Mount::LeicaL if name.contains("DC") => Equivalence::ApsC,
        Mount::LeicaL => Equivalence::FullFrame,
    }
}

fn to_record(raw: &RawFields, mount: Mount, overrides: &MakerOverrides) -> Result<LensRecord, ExtractError> {
    let maker = Maker::Sigma;
    let name = raw.name();
    let mut r = LensRecord::new(maker.label(), name, mount, raw.url());
    r.product_number = raw.get("エディションナンバー").unwrap_or_default().to_string();
    let eq = equivalence(name, mount);
    let literal = overrides.literal(name).cloned().unwrap_or_default();

    let (w, t) = normalize::pair_or_single(name, &[&FOCAL_RANGE_RE], &[&FOCAL_RE])
        .ok_or_else(|| mismatch(maker, raw, "focal_length", name))?;
    r.wide_focal_length = normalize::equivalent_focal_length(&w, eq)
        .ok_or_else(|| mismatch(maker, raw, "focal_length", name))?;
    r.telephoto_focal_length = normalize::equivalent_focal_length(&t, eq)
        .ok_or_else(|| mismatch(maker, raw, "focal_length", name))?;

    let (wf, tf) = normalize::pair_or_single(name, &[&F_RANGE_RE], &[&F_RE])
        .ok_or_else(|| mismatch(maker, raw, "f_number", name))?;
    r.wide_f_number = normalize::millimeters(&wf).unwrap_or_default();
    r.telephoto_f_number = normalize::millimeters(&tf).unwrap_or_default();

    let focus = require(maker, raw, &["最短撮影距離"])?;
    let (wd, td) = normalize::pair_or_single(
        focus,
        &[&FOCUS_RANGE_RE, &FOCUS_WT_RE, &FOCUS_WT_SPACED_RE],
        &[&FOCUS_RE],
    )
    .ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;
    r.wide_min_focus_distance =
        normalize::centimeters_to_mm(&wd).ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;
    r.telephoto_min_focus_distance =
        normalize::centimeters_to_mm(&td).ok_or_else(|| mismatch(maker, raw, "最短撮影距離", focus))?;

    r.max_photographing_magnification = magnification(raw, eq)?;

    r.filter_diameter = raw
        .get("フィルターサイズ")
        .and_then(|f| normalize::extract_groups(f, &FILTER_RE).into_iter().next())
        .and_then(|d| normalize::millimeters(&d))
        .unwrap_or(-1.0);

    // DC/DG lines are sealed; OS marks Optical Stabilizer.
    r.is_drip_proof = name.contains("DC") || name.contains("DG");
    r.note(format!("is_drip_proof: inferred from the DC/DG line name ({})", r.is_drip_proof));
    r.has_image_stabilization = name.contains("OS");
    if r.has_image_stabilization {
        r.note("has_image_stabilization: inferred from OS in the name");
    }

    let (d, l) = match (literal.overall_diameter, literal.overall_length) {
        (Some(d), Some(l)) => (d, l),
        _ => {
            let size = require(maker, raw, &["最大径 × 長さ"])?;
            normalize::dimensions(size, &SIZE_RE)
                .ok_or_else(|| mismatch(maker, raw, "最大径 × 長さ", size))?
        }
    };
    r.overall_diameter = d;
    r.overall_length = l;

    r.weight = match raw.get("質量") {
        Some(weight) => {
            normalize::grams(weight).ok_or_else(|| mismatch(maker, raw, "質量", weight))?
        }
        None => literal.weight.ok_or_else(|| missing(maker, raw, "質量"))?,
    };

    r.price = raw
        .get("希望小売価格")
        .and_then(normalize::yen)
        .or(literal.price)
        .unwrap_or(-1);

    r.is_inner_zoom = super::inner_zoom(&r, overrides);
    r.validate()
}

/// Zooms list one `1:N` per end; the larger magnification (smaller N) wins.
fn magnification(raw: &RawFields, eq: Equivalence) -> Result<f64, ExtractError> {
    let value = require(Maker::Sigma, raw, &["最大撮影倍率"])?;
    let normalized = value.replace('：', ":");
    let denominator = RATIO_RE
        .captures_iter(&normalized)
        .filter_map(|c| normalize::decimal(&c[1]).map(|d| (d, c[1].to_string())))
        .min_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, s)| s)
        .ok_or_else(|| mismatch(Maker::Sigma, raw, "最大撮影倍率", value))?;
    normalize::magnification("1", &denominator, eq)
        .ok_or_else(|| mismatch(Maker::Sigma, raw, "最大撮影倍率", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::FixturePages;

    const C_1850: &str = "https://www.sigma-global.com/jp/lenses/c021_18_50_28/";
    const C_30: &str = "https://www.sigma-global.com/jp/lenses/c016_30_14/";
    const OLD_30: &str = "https://www.sigma-global.com/jp/support/discontinued/30_28_ex_dn/";
    const OLD_SD: &str = "https://www.sigma-global.com/jp/support/discontinued/50_14_ex_dg/";
    const OLD_E: &str = "https://www.sigma-global.com/jp/support/discontinued/19_28_dn_e/";

    fn run() -> (MakerOutput, FixturePages) {
        let mut pages = FixturePages::default()
            .with(LISTING_URL, "sigma/lenses.html")
            .with(DISCONTINUED_URL, "sigma/discontinued.html")
            .with(C_1850, "sigma/c021_18_50_28.html")
            .with(C_30, "sigma/c016_30_14.html")
            .with(OLD_30, "sigma/30_28_ex_dn.html")
            .with(OLD_E, "sigma/19_28_dn_e.html");
        let overrides = crate::overrides::Overrides::builtin().for_maker(Maker::Sigma);
        let out = collect(&mut pages, &overrides).unwrap();
        (out, pages)
    }

    #[test]
    fn lineup_order_and_names() {
        let (out, pages) = run();
        let got: Vec<(&str, Mount)> =
            out.records.iter().map(|r| (r.name.as_str(), r.mount)).collect();
        assert_eq!(
            got,
            vec![
                ("30mm F1.4 DC DN | Contemporary", Mount::MicroFourThirds),
                ("18-50mm F2.8 DC DN | Contemporary", Mount::LeicaL),
                ("30mm F2.8 EX DN", Mount::MicroFourThirds),
            ]
        );
        assert!(!pages.requests.iter().any(|(u, _)| u == OLD_SD));
    }

    #[test]
    fn micro_four_thirds_doubles() {
        let (out, _) = run();
        let r = &out.records[0];
        assert_eq!(r.product_number, "302");
        assert_eq!((r.wide_focal_length, r.telephoto_focal_length), (60, 60));
        assert_eq!(r.wide_min_focus_distance, 300.0);
        assert_eq!(r.max_photographing_magnification, 0.29);
        assert_eq!(r.filter_diameter, 52.0);
        assert_eq!((r.overall_diameter, r.overall_length), (64.8, 73.3));
        assert_eq!(r.weight, 265.0);
        assert_eq!(r.price, 52000);
        assert!(r.is_drip_proof);
        assert!(r.is_inner_zoom);
    }

    #[test]
    fn dc_on_l_mount_is_aps_c() {
        let (out, _) = run();
        let r = &out.records[1];
        assert_eq!((r.wide_focal_length, r.telephoto_focal_length), (27, 75));
        assert_eq!((r.wide_min_focus_distance, r.telephoto_min_focus_distance), (121.0, 300.0));
        assert_eq!(r.max_photographing_magnification, 0.54);
        assert_eq!(r.weight, 290.0);
        assert!(!r.is_inner_zoom);
    }

    #[test]
    fn discontinued_uses_literal_values() {
        let (out, _) = run();
        let r = &out.records[2];
        assert_eq!((r.overall_diameter, r.overall_length), (60.6, 38.6));
        assert_eq!(r.weight, 130.0);
        assert_eq!(r.price, -1);
        assert!(!r.is_drip_proof);
    }

    #[test]
    fn line_suffix() {
        assert_eq!(with_line_suffix("35mm F1.2 DG DN", "/jp/lenses/a019_35_12/"), "35mm F1.2 DG DN | Art");
        assert_eq!(
            with_line_suffix("56mm F1.4 DC DN | Contemporary", "/jp/lenses/c018_56_14/"),
            "56mm F1.4 DC DN | Contemporary"
        );
        assert_eq!(with_line_suffix("150-600mm", "/jp/lenses/s/"), "150-600mm");
    }
}
