//! Lens filters as `Name` or `Name=N`, e.g. `IsPrime` or `MaxWeight=300`.
//! Several filters combine with AND.

use std::str::FromStr;

use thiserror::Error;

use crate::lens::{LensRecord, Mount};

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("unknown query: {0}")]
    Unknown(String),
    #[error("{0} needs a value, e.g. {0}=300")]
    MissingValue(String),
    #[error("{0} takes no value")]
    UnexpectedValue(String),
    #[error("{name}: not a number: {value:?}")]
    BadValue { name: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LensQuery {
    IsMicroFourThirds,
    IsLeicaL,
    IsPrime,
    IsZoom,
    IsInnerZoom,
    IsDripProof,
    HasImageStabilization,
    /// Takes a screw-in filter.
    IsLensFilter,
    FilterDiameter(f64),
    MaxWeight(f64),
    /// Lenses without a published price never match.
    MaxPrice(f64),
    MaxWideFNumber(f64),
    MaxTelephotoFNumber(f64),
    MaxWideFocalLength(f64),
    MinTelephotoFocalLength(f64),
    /// In millimeters, like the stored value.
    MaxWideMinFocusDistance(f64),
    MaxTelephotoMinFocusDistance(f64),
    MinMaxPhotographingMagnification(f64),
    MaxOverallDiameter(f64),
    MaxOverallLength(f64),
    /// Telephoto end is at least N times the wide end.
    FocalLengthRange(f64),
}

impl LensQuery {
    pub fn matches(&self, l: &LensRecord) -> bool {
        use LensQuery::*;
        match *self {
            IsMicroFourThirds => l.mount == Mount::MicroFourThirds,
            IsLeicaL => l.mount == Mount::LeicaL,
            IsPrime => l.is_prime(),
            IsZoom => !l.is_prime(),
            IsInnerZoom => l.is_inner_zoom,
            IsDripProof => l.is_drip_proof,
            HasImageStabilization => l.has_image_stabilization,
            IsLensFilter => l.filter_diameter >= 1.0,
            FilterDiameter(v) => l.filter_diameter == v,
            MaxWeight(v) => l.weight <= v,
            MaxPrice(v) => l.price >= 0 && l.price as f64 <= v,
            MaxWideFNumber(v) => l.wide_f_number <= v,
            MaxTelephotoFNumber(v) => l.telephoto_f_number <= v,
            MaxWideFocalLength(v) => l.wide_focal_length as f64 <= v,
            MinTelephotoFocalLength(v) => l.telephoto_focal_length as f64 >= v,
            MaxWideMinFocusDistance(v) => l.wide_min_focus_distance <= v,
            MaxTelephotoMinFocusDistance(v) => l.telephoto_min_focus_distance <= v,
            MinMaxPhotographingMagnification(v) => l.max_photographing_magnification >= v,
            MaxOverallDiameter(v) => l.overall_diameter <= v,
            MaxOverallLength(v) => l.overall_length <= v,
            FocalLengthRange(v) => l.telephoto_focal_length as f64 >= l.wide_focal_length as f64 * v,
        }
    }
}

/// Lenses passing every query, in their original order.
pub fn apply<'a>(lenses: &'a [LensRecord], queries: &[LensQuery]) -> Vec<&'a LensRecord> {
    lenses
        .iter()
        .filter(|l| queries.iter().all(|q| q.matches(l)))
        .collect()
}

impl FromStr for LensQuery {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use LensQuery::*;
        let (name, value) = match s.split_once('=') {
            Some((n, v)) => (n.trim(), Some(v.trim())),
            None => (s.trim(), None),
        };

        let flag = match name {
            "IsMicroFourThirds" => Some(IsMicroFourThirds),
            "IsLeicaL" => Some(IsLeicaL),
            "IsPrime" => Some(IsPrime),
            "IsZoom" => Some(IsZoom),
            "IsInnerZoom" => Some(IsInnerZoom),
            "IsDripProof" => Some(IsDripProof),
            "HasImageStabilization" => Some(HasImageStabilization),
            "IsLensFilter" => Some(IsLensFilter),
            _ => None,
        };
        if let Some(q) = flag {
            return match value {
                None => Ok(q),
                Some(_) => Err(QueryError::UnexpectedValue(name.to_string())),
            };
        }

        let with_value: fn(f64) -> LensQuery = match name {
            "FilterDiameter" => FilterDiameter,
            "MaxWeight" => MaxWeight,
            "MaxPrice" => MaxPrice,
            "MaxWideFNumber" => MaxWideFNumber,
            "MaxTelephotoFNumber" => MaxTelephotoFNumber,
            "MaxWideFocalLength" => MaxWideFocalLength,
            "MinTelephotoFocalLength" => MinTelephotoFocalLength,
            "MaxWideMinFocusDistance" => MaxWideMinFocusDistance,
            "MaxTelephotoMinFocusDistance" => MaxTelephotoMinFocusDistance,
            "MinMaxPhotographingMagnification" => MinMaxPhotographingMagnification,
            "MaxOverallDiameter" => MaxOverallDiameter,
            "MaxOverallLength" => MaxOverallLength,
            "FocalLengthRange" => FocalLengthRange,
            _ => return Err(QueryError::Unknown(name.to_string())),
        };
        let value = value.ok_or_else(|| QueryError::MissingValue(name.to_string()))?;
        let n = value.parse::<f64>().map_err(|_| QueryError::BadValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        Ok(with_value(n))
    }
}
