use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

use crate::utils::numeric::parse_leading_float;

/// Orange variable type of a column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VariableKind {
    Continuous,
    Discrete,
}

impl VariableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKind::Continuous => "continuous",
            VariableKind::Discrete => "discrete",
        }
    }
}

/// Values the input widgets offer for a field. Never enforced by the record.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum AdvisoryRange {
    Between { min: f64, max: f64 },
    OneOf(&'static [f64]),
    Unbounded,
}

impl AdvisoryRange {
    pub fn admits(&self, value: f64) -> bool {
        match self {
            AdvisoryRange::Between { min, max } => value >= *min && value <= *max,
            AdvisoryRange::OneOf(codes) => codes.contains(&value),
            AdvisoryRange::Unbounded => !value.is_nan(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FeatureName {
    Age,
    Sex,
    Cp,
    Bp,
    Chol,
    Maxhr,
    Exang,
    Oldpeak,
    Ca,
    Thal,
}

impl FeatureName {
    /// Canonical column order for import, export and the analysis payload.
    pub const ALL: [FeatureName; 10] = [
        FeatureName::Age,
        FeatureName::Sex,
        FeatureName::Cp,
        FeatureName::Bp,
        FeatureName::Chol,
        FeatureName::Maxhr,
        FeatureName::Exang,
        FeatureName::Oldpeak,
        FeatureName::Ca,
        FeatureName::Thal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::Age => "age",
            FeatureName::Sex => "sex",
            FeatureName::Cp => "cp",
            FeatureName::Bp => "bp",
            FeatureName::Chol => "chol",
            FeatureName::Maxhr => "maxhr",
            FeatureName::Exang => "exang",
            FeatureName::Oldpeak => "oldpeak",
            FeatureName::Ca => "ca",
            FeatureName::Thal => "thal",
        }
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            FeatureName::Age
            | FeatureName::Bp
            | FeatureName::Chol
            | FeatureName::Maxhr
            | FeatureName::Oldpeak => VariableKind::Continuous,
            FeatureName::Sex
            | FeatureName::Cp
            | FeatureName::Exang
            | FeatureName::Ca
            | FeatureName::Thal => VariableKind::Discrete,
        }
    }

    pub fn advisory_range(&self) -> AdvisoryRange {
        match self {
            FeatureName::Age => AdvisoryRange::Between { min: 1.0, max: 120.0 },
            FeatureName::Sex => AdvisoryRange::OneOf(&[0.0, 1.0]),
            FeatureName::Cp => AdvisoryRange::OneOf(&[1.0, 2.0, 3.0, 4.0]),
            FeatureName::Bp => AdvisoryRange::Between { min: 80.0, max: 220.0 },
            FeatureName::Chol => AdvisoryRange::Between { min: 100.0, max: 600.0 },
            FeatureName::Maxhr => AdvisoryRange::Between { min: 60.0, max: 220.0 },
            FeatureName::Exang => AdvisoryRange::OneOf(&[0.0, 1.0]),
            FeatureName::Oldpeak => AdvisoryRange::Unbounded,
            FeatureName::Ca => AdvisoryRange::Between { min: 0.0, max: 3.0 },
            FeatureName::Thal => AdvisoryRange::OneOf(&[3.0, 6.0, 7.0]),
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureName {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FeatureName::ALL
            .into_iter()
            .find(|name| name.as_str() == value)
            .ok_or_else(|| anyhow!("unknown feature '{value}'"))
    }
}

/// The ten clinical measurements for one patient.
///
/// Always whole: every edit replaces exactly one field and the record stays
/// exportable. Values are not range-checked; see [`FeatureRecord::advisories`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureRecord {
    pub age: f64,
    pub sex: f64,
    pub cp: f64,
    pub bp: f64,
    pub chol: f64,
    pub maxhr: f64,
    pub exang: f64,
    pub oldpeak: f64,
    pub ca: f64,
    pub thal: f64,
}

impl Default for FeatureRecord {
    fn default() -> Self {
        Self {
            age: 54.0,
            sex: 1.0,
            cp: 2.0,
            bp: 130.0,
            chol: 240.0,
            maxhr: 155.0,
            exang: 0.0,
            oldpeak: 1.2,
            ca: 0.0,
            thal: 3.0,
        }
    }
}

/// A field whose value sits outside the range the input widgets offer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Advisory {
    pub field: FeatureName,
    pub value: f64,
    pub expected: AdvisoryRange,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from values in canonical order.
    pub fn from_values(values: [f64; 10]) -> Self {
        let [age, sex, cp, bp, chol, maxhr, exang, oldpeak, ca, thal] = values;
        Self {
            age,
            sex,
            cp,
            bp,
            chol,
            maxhr,
            exang,
            oldpeak,
            ca,
            thal,
        }
    }

    pub fn values(&self) -> [f64; 10] {
        FeatureName::ALL.map(|name| self.get(name))
    }

    pub fn get(&self, name: FeatureName) -> f64 {
        match name {
            FeatureName::Age => self.age,
            FeatureName::Sex => self.sex,
            FeatureName::Cp => self.cp,
            FeatureName::Bp => self.bp,
            FeatureName::Chol => self.chol,
            FeatureName::Maxhr => self.maxhr,
            FeatureName::Exang => self.exang,
            FeatureName::Oldpeak => self.oldpeak,
            FeatureName::Ca => self.ca,
            FeatureName::Thal => self.thal,
        }
    }

    /// Copy of `self` with one field replaced.
    pub fn with(&self, name: FeatureName, value: f64) -> Self {
        let mut next = *self;
        let slot = match name {
            FeatureName::Age => &mut next.age,
            FeatureName::Sex => &mut next.sex,
            FeatureName::Cp => &mut next.cp,
            FeatureName::Bp => &mut next.bp,
            FeatureName::Chol => &mut next.chol,
            FeatureName::Maxhr => &mut next.maxhr,
            FeatureName::Exang => &mut next.exang,
            FeatureName::Oldpeak => &mut next.oldpeak,
            FeatureName::Ca => &mut next.ca,
            FeatureName::Thal => &mut next.thal,
        };
        *slot = value;
        next
    }

    /// Apply a live edit. Unparseable input is stored as `NaN`, not rejected.
    pub fn set_field(&self, name: FeatureName, raw: &str) -> Self {
        self.with(name, parse_leading_float(raw))
    }

    /// Fields outside their advisory range, in canonical order.
    pub fn advisories(&self) -> Vec<Advisory> {
        FeatureName::ALL
            .into_iter()
            .filter_map(|field| {
                let value = self.get(field);
                let expected = field.advisory_range();
                (!expected.admits(value)).then_some(Advisory {
                    field,
                    value,
                    expected,
                })
            })
            .collect()
    }
}
