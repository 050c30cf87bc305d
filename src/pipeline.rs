use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::info;

use crate::cache::{PageCache, PageSource};
use crate::db;
use crate::export;
use crate::extract;
use crate::import;
use crate::lens::{LensRecord, Maker};
use crate::overrides::Overrides;
use crate::settings::Settings;

/// Counts reported after a run.
pub struct RunSummary {
    pub per_maker: Vec<(Maker, usize)>,
    pub curated: usize,
    pub stored: usize,
    pub fetched: usize,
    pub cache_hits: usize,
}

/// Extract `makers` in order, then add curated lenses, replace the store and
/// export from it.
pub fn run(
    conn: &Connection,
    settings: &Settings,
    makers: &[Maker],
    refresh: bool,
    raw_dir: Option<&Path>,
) -> Result<RunSummary> {
    let overrides = Overrides::load(settings.overrides_path.as_deref())?;
    let mut cache = PageCache::new(conn, settings, refresh)?;
    let (mut lenses, per_maker) = extract_all(&mut cache, makers, &overrides, raw_dir)?;

    let mut curated = 0;
    for source in &settings.curated {
        let loaded = import::load_curated(source)?;
        curated += loaded.len();
        lenses.extend(loaded);
    }

    let stored = db::replace_lenses(conn, &lenses)?;
    info!(stored, curated, "lens table replaced");
    export_store(conn, &settings.json_path, &settings.csv_path)?;

    Ok(RunSummary {
        per_maker,
        curated,
        stored,
        fetched: cache.fetched(),
        cache_hits: cache.hits(),
    })
}

/// Run each maker's extractor; any failure aborts with the maker named.
pub fn extract_all(
    pages: &mut dyn PageSource,
    makers: &[Maker],
    overrides: &Overrides,
    raw_dir: Option<&Path>,
) -> Result<(Vec<LensRecord>, Vec<(Maker, usize)>)> {
    let pb = ProgressBar::new(makers.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut lenses = Vec::new();
    let mut per_maker = Vec::new();
    for &maker in makers {
        pb.set_message(maker.label());
        let out = extract::collect(maker, pages, &overrides.for_maker(maker))
            .with_context(|| format!("{maker} extraction failed"))?;
        info!(%maker, lenses = out.records.len(), "extracted");

        if let Some(dir) = raw_dir {
            let path = export::write_raw(dir, maker, &out.raw)?;
            info!(%maker, path = %path.display(), "raw table written");
        }
        per_maker.push((maker, out.records.len()));
        lenses.extend(out.records);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok((lenses, per_maker))
}

/// Write JSON and CSV from the store in id order.
pub fn export_store(conn: &Connection, json_path: &Path, csv_path: &Path) -> Result<usize> {
    let lenses = db::fetch_lenses(conn)?;
    export::write_json(json_path, &lenses)?;
    export::write_csv(csv_path, &lenses)?;
    Ok(lenses.len())
}
