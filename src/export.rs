use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::csv;
use crate::extract::RawFields;
use crate::lens::{LensRecord, Maker};

/// CSV column order; curated import reads the same layout.
pub const COLUMNS: [&str; 22] = [
    "id",
    "maker",
    "name",
    "product_number",
    "wide_focal_length",
    "telephoto_focal_length",
    "wide_f_number",
    "telephoto_f_number",
    "wide_min_focus_distance",
    "telephoto_min_focus_distance",
    "max_photographing_magnification",
    "filter_diameter",
    "is_drip_proof",
    "has_image_stabilization",
    "is_inner_zoom",
    "overall_diameter",
    "overall_length",
    "weight",
    "price",
    "mount",
    "url",
    "heuristics",
];

pub fn to_json(lenses: &[LensRecord]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(lenses).context("Failed to serialize lenses")?;
    json.push('\n');
    Ok(json)
}

pub fn write_json(path: &Path, lenses: &[LensRecord]) -> Result<()> {
    let json = to_json(lenses)?;
    create_parent(path)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), lenses = lenses.len(), "JSON exported");
    Ok(())
}

fn lens_row(l: &LensRecord) -> Vec<String> {
    vec![
        l.id.to_string(),
        l.maker.clone(),
        l.name.clone(),
        l.product_number.clone(),
        l.wide_focal_length.to_string(),
        l.telephoto_focal_length.to_string(),
        l.wide_f_number.to_string(),
        l.telephoto_f_number.to_string(),
        l.wide_min_focus_distance.to_string(),
        l.telephoto_min_focus_distance.to_string(),
        l.max_photographing_magnification.to_string(),
        l.filter_diameter.to_string(),
        l.is_drip_proof.to_string(),
        l.has_image_stabilization.to_string(),
        l.is_inner_zoom.to_string(),
        l.overall_diameter.to_string(),
        l.overall_length.to_string(),
        l.weight.to_string(),
        l.price.to_string(),
        l.mount.label().to_string(),
        l.url.clone(),
        l.heuristics.join("; "),
    ]
}

pub fn write_lens_csv<W: Write>(w: &mut W, lenses: &[LensRecord]) -> Result<()> {
    csv::write_row(w, &COLUMNS)?;
    for lens in lenses {
        csv::write_row(w, &lens_row(lens))?;
    }
    Ok(())
}

pub fn write_csv(path: &Path, lenses: &[LensRecord]) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_lens_csv(&mut w, lenses)?;
    w.flush()?;
    info!(path = %path.display(), lenses = lenses.len(), "CSV exported");
    Ok(())
}

// ── Raw tables ──

/// Header is the union of every product's labels in first-seen order;
/// products without a label get an empty cell.
pub fn write_raw_table<W: Write>(w: &mut W, raws: &[RawFields]) -> Result<()> {
    let mut header: Vec<&str> = Vec::new();
    for raw in raws {
        for label in raw.labels() {
            if !header.contains(&label) {
                header.push(label);
            }
        }
    }
    csv::write_row(w, &header)?;
    for raw in raws {
        let row: Vec<&str> = header.iter().map(|l| raw.get(l).unwrap_or_default()).collect();
        csv::write_row(w, &row)?;
    }
    Ok(())
}

pub fn write_raw(dir: &Path, maker: Maker, raws: &[RawFields]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.csv", maker.label().to_lowercase()));
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_raw_table(&mut w, raws)?;
    w.flush()?;
    Ok(path)
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::Mount;

    fn lens() -> LensRecord {
        let mut r = LensRecord::new("SIGMA", "30mm F1.4 DC DN | Contemporary", Mount::MicroFourThirds, "https://x");
        r.id = 1;
        r.wide_focal_length = 60;
        r.telephoto_focal_length = 60;
        r.wide_f_number = 1.4;
        r.telephoto_f_number = 1.4;
        r.filter_diameter = 52.0;
        r.weight = 265.0;
        r.price = 52000;
        r.is_inner_zoom = true;
        r.note("is_drip_proof: DC in name");
        r
    }

    #[test]
    fn csv_has_header_and_quoted_name() {
        let mut buf = Vec::new();
        write_lens_csv(&mut buf, &[lens()]).unwrap();
        let rows = csv::parse_rows(&String::from_utf8(buf).unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], COLUMNS.to_vec());
        assert_eq!(rows[1][2], "30mm F1.4 DC DN | Contemporary");
        assert_eq!(rows[1][4], "60");
        assert_eq!(rows[1][6], "1.4");
        assert_eq!(rows[1][14], "true");
        assert_eq!(rows[1][19], "マイクロフォーサーズ");
        assert_eq!(rows[1][21], "is_drip_proof: DC in name");
    }

    #[test]
    fn json_uses_snake_case_and_japanese_mount() {
        let json = to_json(&[lens()]).unwrap();
        assert!(json.contains("\"wide_focal_length\": 60"));
        assert!(json.contains("\"mount\": \"マイクロフォーサーズ\""));
        assert!(json.ends_with("]\n"));
        assert_eq!(json, to_json(&[lens()]).unwrap());
    }

    #[test]
    fn raw_table_unions_labels() {
        let mut a = RawFields::new("A", "u1");
        a.insert("焦点距離", "12mm");
        a.insert("質量", "245g");
        let mut b = RawFields::new("B", "u2");
        b.insert("焦点距離", "7.5mm");
        b.insert("開放F値", "F3.5");

        let mut buf = Vec::new();
        write_raw_table(&mut buf, &[a, b]).unwrap();
        let rows = csv::parse_rows(&String::from_utf8(buf).unwrap());
        assert_eq!(rows[0], vec!["name", "url", "焦点距離", "質量", "開放F値"]);
        assert_eq!(rows[1], vec!["A", "u1", "12mm", "245g", ""]);
        assert_eq!(rows[2], vec!["B", "u2", "7.5mm", "", "F3.5"]);
    }
}
