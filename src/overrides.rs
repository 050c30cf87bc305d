//! Per-maker exception tables.
//!
//! Keys are product keys: either the product number or the product name,
//! whichever the maker's pages make stable. Built-in tables can be extended
//! with a JSON file of the same shape keyed by maker label.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::lens::Maker;

/// Swap two raw fields before extraction. With `when_contains`, only when
/// the first field's value contains that text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSwap {
    pub first: String,
    pub second: String,
    #[serde(default)]
    pub when_contains: Option<String>,
}

/// Values to use when a product's page does not publish them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LiteralValues {
    pub overall_diameter: Option<f64>,
    pub overall_length: Option<f64>,
    pub weight: Option<f64>,
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MakerOverrides {
    /// Zooms that keep their length while zooming.
    pub inner_zoom: BTreeSet<String>,
    /// Lenses with stabilization the maker's table does not mention.
    pub image_stabilization: BTreeSet<String>,
    pub field_swaps: BTreeMap<String, FieldSwap>,
    pub literal_values: BTreeMap<String, LiteralValues>,
    /// Listing label to canonical product name.
    pub name_aliases: BTreeMap<String, String>,
}

impl MakerOverrides {
    pub fn is_inner_zoom(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.inner_zoom.contains(*k))
    }

    pub fn has_image_stabilization(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.image_stabilization.contains(*k))
    }

    pub fn literal(&self, key: &str) -> Option<&LiteralValues> {
        self.literal_values.get(key)
    }

    pub fn swap(&self, key: &str) -> Option<&FieldSwap> {
        self.field_swaps.get(key)
    }

    pub fn alias(&self, label: &str) -> Option<&str> {
        self.name_aliases.get(label).map(String::as_str)
    }

    fn merge(&mut self, other: MakerOverrides) {
        self.inner_zoom.extend(other.inner_zoom);
        self.image_stabilization.extend(other.image_stabilization);
        self.field_swaps.extend(other.field_swaps);
        self.literal_values.extend(other.literal_values);
        self.name_aliases.extend(other.name_aliases);
    }
}

/// Override tables for every maker.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    by_maker: HashMap<Maker, MakerOverrides>,
}

impl Overrides {
    pub fn builtin() -> Self {
        let by_maker = Maker::ALL.iter().map(|&m| (m, builtin_for(m))).collect();
        Self { by_maker }
    }

    /// Built-in tables extended by `path` (`{"LEICA": {"inner_zoom": [...]}}`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut overrides = Self::builtin();
        let Some(path) = path else {
            return Ok(overrides);
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read overrides {:?}", path))?;
        let extra: BTreeMap<String, MakerOverrides> = serde_json::from_str(&text)
            .with_context(|| format!("Invalid overrides file {:?}", path))?;
        for (label, table) in extra {
            let maker = Maker::ALL
                .into_iter()
                .find(|m| m.label().eq_ignore_ascii_case(&label))
                .with_context(|| format!("Unknown maker {label:?} in {:?}", path))?;
            overrides.by_maker.entry(maker).or_default().merge(table);
        }
        Ok(overrides)
    }

    pub fn for_maker(&self, maker: Maker) -> MakerOverrides {
        self.by_maker.get(&maker).cloned().unwrap_or_default()
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn map(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn literals(items: &[(&str, f64, f64, f64)]) -> BTreeMap<String, LiteralValues> {
    items
        .iter()
        .map(|&(name, diameter, length, weight)| {
            let values = LiteralValues {
                overall_diameter: Some(diameter),
                overall_length: Some(length),
                weight: Some(weight),
                price: None,
            };
            (name.to_string(), values)
        })
        .collect()
}

fn builtin_for(maker: Maker) -> MakerOverrides {
    match maker {
        Maker::Panasonic => MakerOverrides {
            inner_zoom: set(&["H-HSA35100", "H-ES50200", "S-R70200"]),
            ..Default::default()
        },
        Maker::Olympus => MakerOverrides {
            inner_zoom: set(&["ez-m40150f28pro", "ez-m150400pro"]),
            ..Default::default()
        },
        Maker::Sigma => MakerOverrides {
            literal_values: literals(&[
                ("19mm F2.8 EX DN", 60.6, 45.7, 140.0),
                ("30mm F2.8 EX DN", 60.6, 38.6, 130.0),
                ("19mm F2.8 DN | Art", 60.8, 45.7, 160.0),
                ("30mm F2.8 DN | Art", 60.8, 40.5, 140.0),
                ("60mm F2.8 DN | Art", 60.8, 55.5, 190.0),
            ]),
            ..Default::default()
        },
        Maker::Leica => MakerOverrides {
            inner_zoom: set(&["APO VARIO-ELMARIT-SL90-280 f/2.8-4"]),
            image_stabilization: set(&[
                "VARIO-ELMARIT-SL24-90 f/2.8-4 ASPH.",
                "APO VARIO-ELMARIT-SL90-280 f/2.8-4",
            ]),
            ..Default::default()
        },
        Maker::Cosina => MakerOverrides {
            name_aliases: map(&[
                ("10.5mm F0.95", "Voigtlander NOKTON 10.5mm F0.95 Aspherical"),
                ("17.5mm F0.95", "Voigtlander NOKTON 17.5mm F0.95 Aspherical"),
                ("25mm Type2", "Voigtlander NOKTON 25mm F0.95 TypeII"),
                ("29mm", "Voigtlander SUPER NOKTON 29mm F0.8 Aspherical"),
                ("42.5mm F0.95", "Voigtlander NOKTON 42.5mm F0.95"),
                ("mft60mm", "Voigtlander NOKTON 60mm F0.95"),
            ]),
            ..Default::default()
        },
        Maker::Laowa => {
            let swap = FieldSwap {
                first: "質量".into(),
                second: "マウント".into(),
                when_contains: Some("Nikon".into()),
            };
            MakerOverrides {
                field_swaps: [("LAOWA 15mm F4 WIDE ANGLE MACRO".to_string(), swap)].into(),
                ..Default::default()
            }
        }
        Maker::Samyang => MakerOverrides::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_are_per_maker() {
        let o = Overrides::builtin();
        assert!(o.for_maker(Maker::Leica).is_inner_zoom(&["", "APO VARIO-ELMARIT-SL90-280 f/2.8-4"]));
        assert!(!o.for_maker(Maker::Sigma).is_inner_zoom(&["APO VARIO-ELMARIT-SL90-280 f/2.8-4"]));
        assert_eq!(
            o.for_maker(Maker::Sigma).literal("30mm F2.8 EX DN").and_then(|l| l.weight),
            Some(130.0)
        );
        assert_eq!(o.for_maker(Maker::Cosina).alias("29mm"), Some("Voigtlander SUPER NOKTON 29mm F0.8 Aspherical"));
    }

    #[test]
    fn file_extends_builtin() {
        let dir = std::env::temp_dir().join(format!("lensdb-overrides-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("overrides.json");
        std::fs::write(
            &path,
            r#"{"laowa": {"inner_zoom": ["LAOWA 7.5mm F2"]}, "LEICA": {"literal_values": {"SL50": {"price": 500000}}}}"#,
        )
        .unwrap();
        let o = Overrides::load(Some(&path)).unwrap();
        let laowa = o.for_maker(Maker::Laowa);
        assert!(laowa.is_inner_zoom(&["LAOWA 7.5mm F2"]));
        assert!(laowa.swap("LAOWA 15mm F4 WIDE ANGLE MACRO").is_some());
        assert_eq!(o.for_maker(Maker::Leica).literal("SL50").and_then(|l| l.price), Some(500000));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unknown_maker_in_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("lensdb-overrides-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("overrides.json");
        std::fs::write(&path, r#"{"CANON": {}}"#).unwrap();
        assert!(Overrides::load(Some(&path)).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
