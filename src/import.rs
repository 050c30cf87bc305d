use std::fs;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use crate::csv;
use crate::export::COLUMNS;
use crate::lens::{LensRecord, Mount};
use crate::settings::CuratedSource;

/// Columns up to and including `price` are required; `url` is optional.
const REQUIRED: usize = 19;
const URL_COLUMN: usize = 20;

pub fn load_curated(source: &CuratedSource) -> Result<Vec<LensRecord>> {
    let text = fs::read_to_string(&source.path)
        .with_context(|| format!("Failed to read {}", source.path.display()))?;
    let lenses = parse_curated(&text, source.mount)
        .with_context(|| format!("Bad curated file {}", source.path.display()))?;
    info!(path = %source.path.display(), lenses = lenses.len(), mount = %source.mount, "curated lenses loaded");
    Ok(lenses)
}

/// Header row skipped; the file's own id and mount columns are ignored.
pub fn parse_curated(text: &str, mount: Mount) -> Result<Vec<LensRecord>> {
    csv::parse_rows(text)
        .into_iter()
        .enumerate()
        .skip(1)
        .map(|(i, row)| parse_row(&row, mount).with_context(|| format!("row {}", i + 1)))
        .collect()
}

fn parse_row(row: &[String], mount: Mount) -> Result<LensRecord> {
    if row.len() < REQUIRED {
        bail!("expected at least {REQUIRED} columns, found {}", row.len());
    }
    let url = row.get(URL_COLUMN).map(String::as_str).unwrap_or_default();
    let mut r = LensRecord::new(&row[1], &row[2], mount, url);
    r.product_number = row[3].clone();
    r.wide_focal_length = cell(row, 4)?;
    r.telephoto_focal_length = cell(row, 5)?;
    r.wide_f_number = cell(row, 6)?;
    r.telephoto_f_number = cell(row, 7)?;
    r.wide_min_focus_distance = cell(row, 8)?;
    r.telephoto_min_focus_distance = cell(row, 9)?;
    r.max_photographing_magnification = cell(row, 10)?;
    r.filter_diameter = cell(row, 11)?;
    r.is_drip_proof = flag(row, 12)?;
    r.has_image_stabilization = flag(row, 13)?;
    r.is_inner_zoom = flag(row, 14)?;
    r.overall_diameter = cell(row, 15)?;
    r.overall_length = cell(row, 16)?;
    r.weight = cell(row, 17)?;
    r.price = cell(row, 18)?;
    Ok(r.validate()?)
}

fn cell<T: FromStr>(row: &[String], i: usize) -> Result<T> {
    let value = row[i].trim();
    value
        .parse()
        .map_err(|_| anyhow!("{}: not a number: {value:?}", COLUMNS[i]))
}

fn flag(row: &[String], i: usize) -> Result<bool> {
    match row[i].trim() {
        "true" | "True" | "TRUE" | "1" => Ok(true),
        "false" | "False" | "FALSE" | "0" => Ok(false),
        other => bail!("{}: not a boolean: {other:?}", COLUMNS[i]),
    }
}
