use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::lens::{LensRecord, Mount};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS page_cache (
            url        TEXT PRIMARY KEY,
            body       TEXT NOT NULL,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS lens (
            id                              INTEGER PRIMARY KEY,
            maker                           TEXT NOT NULL,
            name                            TEXT NOT NULL,
            product_number                  TEXT NOT NULL,
            wide_focal_length               INTEGER NOT NULL,
            telephoto_focal_length          INTEGER NOT NULL,
            wide_f_number                   REAL NOT NULL,
            telephoto_f_number              REAL NOT NULL,
            wide_min_focus_distance         REAL NOT NULL,
            telephoto_min_focus_distance    REAL NOT NULL,
            max_photographing_magnification REAL NOT NULL,
            filter_diameter                 REAL NOT NULL,
            is_drip_proof                   BOOLEAN NOT NULL,
            has_image_stabilization         BOOLEAN NOT NULL,
            is_inner_zoom                   BOOLEAN NOT NULL,
            overall_diameter                REAL NOT NULL,
            overall_length                  REAL NOT NULL,
            weight                          REAL NOT NULL,
            price                           INTEGER NOT NULL,
            mount                           TEXT NOT NULL,
            url                             TEXT NOT NULL,
            heuristics                      TEXT NOT NULL DEFAULT '[]'
        );
        CREATE INDEX IF NOT EXISTS idx_lens_maker ON lens(maker);
        ",
    )?;
    Ok(())
}

// ── Page cache ──

pub fn cached_page(conn: &Connection, url: &str) -> Result<Option<String>> {
    let body = conn
        .query_row("SELECT body FROM page_cache WHERE url = ?1", params![url], |r| r.get(0))
        .optional()?;
    Ok(body)
}

pub fn store_page(conn: &Connection, url: &str, body: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO page_cache (url, body) VALUES (?1, ?2)
         ON CONFLICT(url) DO UPDATE SET body = excluded.body, fetched_at = datetime('now')",
        params![url, body],
    )?;
    Ok(())
}

pub fn clear_cache(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM page_cache", [])?)
}

// ── Lenses ──

pub fn delete_all_lenses(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM lens", [])?)
}

/// Insert with ids continuing from the current maximum, in slice order.
pub fn insert_lenses(conn: &Connection, lenses: &[LensRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let count = insert_in(&tx, lenses)?;
    tx.commit()?;
    Ok(count)
}

/// Delete-all then insert-all in one transaction, so a failed insert keeps
/// the previous run's rows.
pub fn replace_lenses(conn: &Connection, lenses: &[LensRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    delete_all_lenses(&tx)?;
    let count = insert_in(&tx, lenses)?;
    tx.commit()?;
    Ok(count)
}

fn insert_in(conn: &Connection, lenses: &[LensRecord]) -> Result<usize> {
    let start: i64 = conn.query_row("SELECT COALESCE(MAX(id), 0) FROM lens", [], |r| r.get(0))?;
    let mut stmt = conn.prepare(
        "INSERT INTO lens
         (id, maker, name, product_number, wide_focal_length, telephoto_focal_length,
          wide_f_number, telephoto_f_number, wide_min_focus_distance,
          telephoto_min_focus_distance, max_photographing_magnification, filter_diameter,
          is_drip_proof, has_image_stabilization, is_inner_zoom, overall_diameter,
          overall_length, weight, price, mount, url, heuristics)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22)",
    )?;
    for (i, l) in lenses.iter().enumerate() {
        let heuristics = serde_json::to_string(&l.heuristics)?;
        stmt.execute(params![
            start + i as i64 + 1,
            l.maker, l.name, l.product_number, l.wide_focal_length, l.telephoto_focal_length,
            l.wide_f_number, l.telephoto_f_number, l.wide_min_focus_distance,
            l.telephoto_min_focus_distance, l.max_photographing_magnification, l.filter_diameter,
            l.is_drip_proof, l.has_image_stabilization, l.is_inner_zoom, l.overall_diameter,
            l.overall_length, l.weight, l.price, l.mount.label(), l.url, heuristics,
        ])?;
    }
    Ok(lenses.len())
}

pub fn fetch_lenses(conn: &Connection) -> Result<Vec<LensRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, maker, name, product_number, wide_focal_length, telephoto_focal_length,
                wide_f_number, telephoto_f_number, wide_min_focus_distance,
                telephoto_min_focus_distance, max_photographing_magnification, filter_diameter,
                is_drip_proof, has_image_stabilization, is_inner_zoom, overall_diameter,
                overall_length, weight, price, mount, url, heuristics
         FROM lens ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let mount: String = row.get(19)?;
            let heuristics: String = row.get(21)?;
            Ok((
                LensRecord {
                    id: row.get(0)?,
                    maker: row.get(1)?,
                    name: row.get(2)?,
                    product_number: row.get(3)?,
                    wide_focal_length: row.get(4)?,
                    telephoto_focal_length: row.get(5)?,
                    wide_f_number: row.get(6)?,
                    telephoto_f_number: row.get(7)?,
                    wide_min_focus_distance: row.get(8)?,
                    telephoto_min_focus_distance: row.get(9)?,
                    max_photographing_magnification: row.get(10)?,
                    filter_diameter: row.get(11)?,
                    is_drip_proof: row.get(12)?,
                    has_image_stabilization: row.get(13)?,
                    is_inner_zoom: row.get(14)?,
                    overall_diameter: row.get(15)?,
                    overall_length: row.get(16)?,
                    weight: row.get(17)?,
                    price: row.get(18)?,
                    mount: Mount::MicroFourThirds,
                    url: row.get(20)?,
                    heuristics: Vec::new(),
                },
                mount,
                heuristics,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(mut lens, mount, heuristics)| {
            lens.mount = mount
                .parse()
                .map_err(|e: String| anyhow::anyhow!("lens {}: {}", lens.id, e))?;
            lens.heuristics = serde_json::from_str(&heuristics)
                .with_context(|| format!("lens {}: bad heuristics column", lens.id))?;
            Ok(lens)
        })
        .collect()
}

// ── Stats ──

pub struct Stats {
    pub lenses: usize,
    pub cached_pages: usize,
    pub per_maker: Vec<(String, String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let lenses: usize = conn.query_row("SELECT COUNT(*) FROM lens", [], |r| r.get(0))?;
    let cached_pages: usize =
        conn.query_row("SELECT COUNT(*) FROM page_cache", [], |r| r.get(0))?;
    let mut stmt = conn.prepare(
        "SELECT maker, mount, COUNT(*) FROM lens GROUP BY maker, mount ORDER BY maker, mount",
    )?;
    let per_maker = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stats {
        lenses,
        cached_pages,
        per_maker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn lens(name: &str) -> LensRecord {
        let mut l = LensRecord::new("COSINA", name, Mount::MicroFourThirds, "http://example/");
        l.wide_focal_length = 50;
        l.telephoto_focal_length = 50;
        l.wide_f_number = 0.95;
        l.telephoto_f_number = 0.95;
        l.note("is_drip_proof: assumed false");
        l
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let conn = memory();
        insert_lenses(&conn, &[lens("a"), lens("b")]).unwrap();
        insert_lenses(&conn, &[lens("c")]).unwrap();
        let all = fetch_lenses(&conn).unwrap();
        let ids: Vec<i64> = all.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(all[2].name, "c");
        assert_eq!(all[0].heuristics, vec!["is_drip_proof: assumed false"]);
        assert_eq!(all[0].mount, Mount::MicroFourThirds);
    }

    #[test]
    fn replace_restarts_ids() {
        let conn = memory();
        insert_lenses(&conn, &[lens("a"), lens("b")]).unwrap();
        replace_lenses(&conn, &[lens("x")]).unwrap();
        let all = fetch_lenses(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!((all[0].id, all[0].name.as_str()), (1, "x"));
    }

    #[test]
    fn delete_all_empties_table() {
        let conn = memory();
        insert_lenses(&conn, &[lens("a")]).unwrap();
        assert_eq!(delete_all_lenses(&conn).unwrap(), 1);
        assert!(fetch_lenses(&conn).unwrap().is_empty());
    }

    #[test]
    fn page_cache_upserts() {
        let conn = memory();
        assert_eq!(cached_page(&conn, "http://a").unwrap(), None);
        store_page(&conn, "http://a", "<p>1</p>").unwrap();
        store_page(&conn, "http://a", "<p>2</p>").unwrap();
        assert_eq!(cached_page(&conn, "http://a").unwrap().as_deref(), Some("<p>2</p>"));
        assert_eq!(clear_cache(&conn).unwrap(), 1);
    }

    #[test]
    fn stats_group_by_maker_and_mount() {
        let conn = memory();
        let mut l = lens("sl");
        l.maker = "LEICA".into();
        l.mount = Mount::LeicaL;
        insert_lenses(&conn, &[lens("a"), lens("b"), l]).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.lenses, 3);
        assert_eq!(s.per_maker[0], ("COSINA".to_string(), "マイクロフォーサーズ".to_string(), 2));
        assert_eq!(s.per_maker[1].2, 1);
    }
}
