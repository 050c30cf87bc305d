use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Manufacturers with a dedicated extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Maker {
    Panasonic,
    Olympus,
    Sigma,
    Leica,
    Cosina,
    Laowa,
    Samyang,
}

impl Maker {
    pub const ALL: [Maker; 7] = [
        Maker::Panasonic,
        Maker::Olympus,
        Maker::Sigma,
        Maker::Leica,
        Maker::Cosina,
        Maker::Laowa,
        Maker::Samyang,
    ];

    /// Name stored in the `maker` column.
    pub fn label(self) -> &'static str {
        match self {
            Maker::Panasonic => "Panasonic",
            Maker::Olympus => "OLYMPUS",
            Maker::Sigma => "SIGMA",
            Maker::Leica => "LEICA",
            Maker::Cosina => "COSINA",
            Maker::Laowa => "LAOWA",
            Maker::Samyang => "SAMYANG",
        }
    }
}

impl fmt::Display for Maker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mount {
    #[serde(rename = "マイクロフォーサーズ")]
    MicroFourThirds,
    #[serde(rename = "ライカL")]
    LeicaL,
}

impl Mount {
    pub fn label(self) -> &'static str {
        match self {
            Mount::MicroFourThirds => "マイクロフォーサーズ",
            Mount::LeicaL => "ライカL",
        }
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "マイクロフォーサーズ" | "mft" | "m43" | "micro-four-thirds" => Ok(Mount::MicroFourThirds),
            "ライカL" | "ライカLマウント" | "l" | "l-mount" | "leica-l" => Ok(Mount::LeicaL),
            other => Err(format!("unknown mount: {other}")),
        }
    }
}

/// One normalized lens. Absent values use sentinels rather than nulls:
/// `filter_diameter` and `price` are -1, `overall_*` are 0, and
/// `product_number` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensRecord {
    pub id: i64,
    pub maker: String,
    pub name: String,
    pub product_number: String,
    pub wide_focal_length: i64,
    pub telephoto_focal_length: i64,
    pub wide_f_number: f64,
    pub telephoto_f_number: f64,
    pub wide_min_focus_distance: f64,
    pub telephoto_min_focus_distance: f64,
    pub max_photographing_magnification: f64,
    pub filter_diameter: f64,
    pub is_drip_proof: bool,
    pub has_image_stabilization: bool,
    pub is_inner_zoom: bool,
    pub overall_diameter: f64,
    pub overall_length: f64,
    pub weight: f64,
    pub price: i64,
    pub mount: Mount,
    pub url: String,
    #[serde(default)]
    pub heuristics: Vec<String>,
}

impl LensRecord {
    /// A blank record for `maker`, every numeric field at its sentinel.
    pub fn new(maker: &str, name: &str, mount: Mount, url: &str) -> Self {
        Self {
            id: 0,
            maker: maker.to_string(),
            name: name.to_string(),
            product_number: String::new(),
            wide_focal_length: 0,
            telephoto_focal_length: 0,
            wide_f_number: 0.0,
            telephoto_f_number: 0.0,
            wide_min_focus_distance: 0.0,
            telephoto_min_focus_distance: 0.0,
            max_photographing_magnification: 0.0,
            filter_diameter: -1.0,
            is_drip_proof: false,
            has_image_stabilization: false,
            is_inner_zoom: false,
            overall_diameter: 0.0,
            overall_length: 0.0,
            weight: 0.0,
            price: -1,
            mount,
            url: url.to_string(),
            heuristics: Vec::new(),
        }
    }

    pub fn is_prime(&self) -> bool {
        self.wide_focal_length == self.telephoto_focal_length
    }

    pub fn note(&mut self, heuristic: impl Into<String>) {
        self.heuristics.push(heuristic.into());
    }

    /// Reject records whose endpoints are out of order. Primes are forced
    /// to inner zoom here so no extractor can forget it.
    pub fn validate(mut self) -> Result<Self, ExtractError> {
        if self.wide_focal_length > self.telephoto_focal_length {
            return Err(self.violation(format!(
                "wide focal length {} > telephoto {}",
                self.wide_focal_length, self.telephoto_focal_length
            )));
        }
        if self.wide_f_number > self.telephoto_f_number {
            return Err(self.violation(format!(
                "wide f-number {} > telephoto {}",
                self.wide_f_number, self.telephoto_f_number
            )));
        }
        if self.is_prime() {
            self.is_inner_zoom = true;
        }
        Ok(self)
    }

    fn violation(&self, detail: String) -> ExtractError {
        ExtractError::InvariantViolation {
            maker: self.maker.clone(),
            product: self.name.clone(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zoom() -> LensRecord {
        let mut r = LensRecord::new("Panasonic", "LUMIX G VARIO 12-35mm", Mount::MicroFourThirds, "");
        r.wide_focal_length = 24;
        r.telephoto_focal_length = 70;
        r.wide_f_number = 2.8;
        r.telephoto_f_number = 2.8;
        r
    }

    #[test]
    fn validate_accepts_ordered_zoom() {
        let r = zoom().validate().unwrap();
        assert!(!r.is_inner_zoom);
    }

    #[test]
    fn validate_rejects_inverted_focal_lengths() {
        let mut r = zoom();
        r.wide_focal_length = 100;
        let err = r.validate().unwrap_err();
        assert!(matches!(err, ExtractError::InvariantViolation { .. }));
    }

    #[test]
    fn validate_rejects_inverted_f_numbers() {
        let mut r = zoom();
        r.wide_f_number = 5.6;
        assert!(r.validate().is_err());
    }

    #[test]
    fn prime_is_inner_zoom() {
        let mut r = zoom();
        r.telephoto_focal_length = 24;
        assert!(r.validate().unwrap().is_inner_zoom);
    }

    #[test]
    fn mount_serializes_as_japanese_label() {
        let json = serde_json::to_string(&Mount::LeicaL).unwrap();
        assert_eq!(json, "\"ライカL\"");
        assert_eq!("ライカLマウント".parse::<Mount>(), Ok(Mount::LeicaL));
    }
}
