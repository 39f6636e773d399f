//! Kinematic bundles: `<prefix>_pt`, `_eta`, `_phi`, `_energy`, `_mass` columns as one object.

use std::ops::Deref;

use crate::error::{IterError, IterResult};
use crate::types::{Column, ColumnBatch};

use super::Bunch;

const POSTFIXES: [(&str, &str); 5] = [
    ("pt", "_pt"),
    ("eta", "_eta"),
    ("phi", "_phi"),
    ("energy", "_energy"),
    ("mass", "_mass"),
];

/// A [`Bunch`] of the kinematic columns sharing one prefix (`jet_pt`, `jet_eta`, ...), exposed
/// under the short names `pt`, `eta`, `phi`, `energy` and `mass`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vectors {
    prefix: String,
    bunch: Bunch,
}

impl Vectors {
    /// Bind the five kinematic columns for `prefix`, plus `extra` columns.
    ///
    /// Each extra name is looked up as given and then as `<prefix>_<name>`; it is exposed
    /// under the name as given. Names already bound are skipped.
    pub fn from_prefix<S: AsRef<str>>(
        prefix: &str,
        batch: &ColumnBatch,
        extra: &[S],
    ) -> IterResult<Self> {
        let mut aliases: Vec<(String, String)> = POSTFIXES
            .iter()
            .map(|(short, postfix)| (short.to_string(), format!("{prefix}{postfix}")))
            .collect();

        for name in extra {
            let name = name.as_ref();
            let prefixed = format!("{prefix}_{name}");
            if aliases.iter().any(|(a, _)| a == name || *a == prefixed) {
                continue;
            }
            let source = if has_column(batch, name) {
                name.to_string()
            } else if has_column(batch, &prefixed) {
                prefixed
            } else {
                return Err(IterError::ColumnNotFound {
                    column: name.to_string(),
                });
            };
            aliases.push((name.to_string(), source));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            bunch: Bunch::from_aliases(batch, &aliases)?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn into_bunch(self) -> Bunch {
        self.bunch
    }

    /// One four-vector per object, across all records (jagged columns are flattened).
    pub fn four_vectors(&self) -> IterResult<Vec<FourVector>> {
        let flat = self.bunch.flatten();
        let pt = numbers(&flat, "pt")?;
        let eta = numbers(&flat, "eta")?;
        let phi = numbers(&flat, "phi")?;
        let energy = numbers(&flat, "energy")?;
        for (name, len) in [("eta", eta.len()), ("phi", phi.len()), ("energy", energy.len())] {
            if len != pt.len() {
                return Err(IterError::ColumnLength {
                    column: name.to_string(),
                    expected: pt.len(),
                    actual: len,
                });
            }
        }
        Ok((0..pt.len())
            .map(|i| FourVector::from_pt_eta_phi_e(pt[i], eta[i], phi[i], energy[i]))
            .collect())
    }
}

impl Deref for Vectors {
    type Target = Bunch;

    fn deref(&self) -> &Bunch {
        &self.bunch
    }
}

fn has_column(batch: &ColumnBatch, name: &str) -> bool {
    batch.keys().any(|k| k.decoded() == name)
}

fn numbers(bunch: &Bunch, name: &str) -> IterResult<Vec<f64>> {
    let column = bunch.column(name)?;
    let Column::Flat(values) = column else {
        return Err(IterError::ColumnKind {
            column: name.to_string(),
        });
    };
    values
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| IterError::ColumnKind {
                column: name.to_string(),
            })
        })
        .collect()
}

/// A Lorentz vector in collider coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourVector {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub energy: f64,
}

impl FourVector {
    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, energy: f64) -> Self {
        Self {
            pt,
            eta,
            phi,
            energy,
        }
    }

    pub fn px(&self) -> f64 {
        self.pt * self.phi.cos()
    }

    pub fn py(&self) -> f64 {
        self.pt * self.phi.sin()
    }

    pub fn pz(&self) -> f64 {
        self.pt * self.eta.sinh()
    }

    /// `0.5 * ln((E + pz) / (E - pz))`
    pub fn rapidity(&self) -> f64 {
        let pz = self.pz();
        0.5 * ((self.energy + pz) / (self.energy - pz)).ln()
    }

    /// `E² - |p|²`; may be slightly negative from rounding.
    pub fn mass2(&self) -> f64 {
        let (px, py, pz) = (self.px(), self.py(), self.pz());
        self.energy * self.energy - (px * px + py * py + pz * pz)
    }

    /// Square root of [`FourVector::mass2`] (NaN when that is negative).
    pub fn mass(&self) -> f64 {
        self.mass2().sqrt()
    }
}
