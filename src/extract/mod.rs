pub mod cosina;
pub mod laowa;
pub mod leica;
pub mod olympus;
pub mod panasonic;
pub mod samyang;
pub mod sigma;

use anyhow::Result;

use crate::cache::PageSource;
use crate::dom::Node;
use crate::error::ExtractError;
use crate::lens::{LensRecord, Maker};
use crate::overrides::MakerOverrides;

/// Everything one maker's extractor produced in a run.
#[derive(Debug, Default)]
pub struct MakerOutput {
    pub records: Vec<LensRecord>,
    pub raw: Vec<RawFields>,
}

pub fn collect(
    maker: Maker,
    pages: &mut dyn PageSource,
    overrides: &MakerOverrides,
) -> Result<MakerOutput> {
    match maker {
        Maker::Panasonic => panasonic::collect(pages, overrides),
        Maker::Olympus => olympus::collect(pages, overrides),
        Maker::Sigma => sigma::collect(pages, overrides),
        Maker::Leica => leica::collect(pages, overrides),
        Maker::Cosina => cosina::collect(pages, overrides),
        Maker::Laowa => laowa::collect(pages, overrides),
        Maker::Samyang => samyang::collect(pages, overrides),
    }
}

// ── Raw field map ──

/// Label → raw text for one product, in first-seen order. The product name
/// and URL ride along under their own keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    entries: Vec<(String, String)>,
}

pub const NAME: &str = "name";
pub const URL: &str = "url";

impl RawFields {
    pub fn new(name: &str, url: &str) -> Self {
        let mut raw = Self::default();
        raw.insert(NAME, name);
        raw.insert(URL, url);
        raw
    }

    pub fn name(&self) -> &str {
        self.get(NAME).unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        self.get(URL).unwrap_or_default()
    }

    /// Later values for the same label replace earlier ones.
    pub fn insert(&mut self, label: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == label) {
            Some((_, v)) => *v = value.to_string(),
            None => self.entries.push((label.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == label)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first label present.
    pub fn first_of(&self, labels: &[&str]) -> Option<&str> {
        labels.iter().find_map(|l| self.get(l))
    }

    pub fn remove(&mut self, label: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == label)?;
        Some(self.entries.remove(pos).1)
    }

    /// Move `from`'s value under `to`, replacing whatever `to` held.
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(value) = self.remove(from) {
            self.insert(to, &value);
        }
    }

    pub fn rename_all(&mut self, pairs: &[(&str, &str)]) {
        for (from, to) in pairs {
            self.rename(from, to);
        }
    }

    pub fn swap(&mut self, a: &str, b: &str) {
        let va = self.get(a).map(str::to_string);
        let vb = self.get(b).map(str::to_string);
        if let (Some(va), Some(vb)) = (va, vb) {
            self.insert(a, &vb);
            self.insert(b, &va);
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// False when only the name and URL are present.
    pub fn has_specs(&self) -> bool {
        self.entries.len() > 2
    }
}

// ── Shared extractor helpers ──

pub(crate) fn missing(maker: Maker, raw: &RawFields, field: &str) -> ExtractError {
    ExtractError::MissingField {
        maker: maker.label().to_string(),
        product: raw.name().to_string(),
        field: field.to_string(),
    }
}

pub(crate) fn mismatch(maker: Maker, raw: &RawFields, field: &str, value: &str) -> ExtractError {
    ExtractError::PatternMismatch {
        maker: maker.label().to_string(),
        product: raw.name().to_string(),
        field: field.to_string(),
        value: value.to_string(),
    }
}

pub(crate) fn require<'r>(maker: Maker, raw: &'r RawFields, labels: &[&str]) -> Result<&'r str, ExtractError> {
    raw.first_of(labels)
        .ok_or_else(|| missing(maker, raw, labels.first().copied().unwrap_or_default()))
}

/// Apply the maker's known field swap for this product, if any.
pub(crate) fn apply_swap(raw: &mut RawFields, overrides: &MakerOverrides) {
    let Some(swap) = overrides.swap(raw.name()).cloned() else {
        return;
    };
    let applies = match &swap.when_contains {
        Some(needle) => raw.get(&swap.first).is_some_and(|v| v.contains(needle.as_str())),
        None => true,
    };
    if applies {
        tracing::debug!(product = raw.name(), first = %swap.first, second = %swap.second, "swapping fields");
        raw.swap(&swap.first, &swap.second);
    }
}

/// Reads a table cell marker: ○ / あり style is yes, ― / なし style is no.
pub(crate) fn published_flag(value: &str) -> Option<bool> {
    let v = value.trim();
    const YES: &[&str] = &["○", "◯", "●", "あり", "有", "対応", "Yes", "yes"];
    const NO: &[&str] = &["―", "－", "-", "—", "×", "なし", "無", "非対応", "No", "no"];
    if v.is_empty() || NO.iter().any(|n| v == *n || v.starts_with(n)) {
        Some(false)
    } else if YES.iter().any(|y| v.starts_with(y)) {
        Some(true)
    } else {
        None
    }
}

/// `<tr><td>label</td><td>value</td></tr>` rows; rows with fewer than two
/// cells or an empty side are skipped.
pub(crate) fn two_column_rows(rows: &[Node<'_>]) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for tr in rows {
        let tds = tr.find_all("td")?;
        if tds.len() < 2 {
            continue;
        }
        let (label, value) = (tds[0].text(), tds[1].text());
        if label.is_empty() || value.is_empty() {
            continue;
        }
        out.push((label, value));
    }
    Ok(out)
}

/// Inner zoom by focal length, widened by the override table.
pub(crate) fn inner_zoom(record: &LensRecord, overrides: &MakerOverrides) -> bool {
    record.is_prime()
        || overrides.is_inner_zoom(&[record.product_number.as_str(), record.name.as_str()])
}
