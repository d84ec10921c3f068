//! Initial-condition collaborators.
//!
//! A [`FieldProfile`] is a scalar- or vector-valued function of physical
//! position. A [`FieldInitializer`] turns profiles into [`PatchData`] for a
//! freshly created patch. The hierarchy only calls the initializer; the
//! physics that consumes the data lives elsewhere.

use crate::data::{Centering, PatchData};
use crate::geometry::{Domain, IndexBox};
use std::collections::BTreeMap;
use std::fmt;

/// Field function of position.
pub trait FieldProfile: Send + Sync {
    /// Number of values produced per point.
    fn components(&self) -> usize {
        1
    }

    /// Evaluate at `x`; `out.len() == self.components()`.
    fn eval(&self, x: &[f64], out: &mut [f64]);
}

impl<F> FieldProfile for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn eval(&self, x: &[f64], out: &mut [f64]) {
        out[0] = self(x);
    }
}

/// Vector profile assembled from one profile per component group.
pub struct VectorProfile {
    parts: Vec<Box<dyn FieldProfile>>,
}

impl VectorProfile {
    pub fn new(parts: Vec<Box<dyn FieldProfile>>) -> Self {
        Self { parts }
    }
}

impl FieldProfile for VectorProfile {
    fn components(&self) -> usize {
        self.parts.iter().map(|p| p.components()).sum()
    }

    fn eval(&self, x: &[f64], out: &mut [f64]) {
        let mut at = 0;
        for p in &self.parts {
            let n = p.components();
            p.eval(x, &mut out[at..at + n]);
            at += n;
        }
    }
}

/// Fills the data of a new patch.
pub trait FieldInitializer: Send + Sync {
    fn initialize(&self, domain: &Domain, level: usize, cells: &IndexBox) -> Vec<PatchData>;
}

struct Entry {
    centering: Centering,
    profile: Box<dyn FieldProfile>,
}

/// Samples named profiles at cell centers (cell-centered quantities) or
/// cell corners (node-centered quantities).
#[derive(Default)]
pub struct ProfileInitializer {
    entries: BTreeMap<String, Entry>,
}

impl fmt::Debug for ProfileInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileInitializer")
            .field("quantities", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProfileInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(
        mut self,
        name: impl Into<String>,
        centering: Centering,
        profile: impl FieldProfile + 'static,
    ) -> Self {
        self.entries.insert(
            name.into(),
            Entry {
                centering,
                profile: Box::new(profile),
            },
        );
        self
    }

    pub fn quantities(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl FieldInitializer for ProfileInitializer {
    fn initialize(&self, domain: &Domain, level: usize, cells: &IndexBox) -> Vec<PatchData> {
        let dim = domain.dim();
        self.entries
            .iter()
            .map(|(name, entry)| {
                let mut data =
                    PatchData::real(name.as_str(), entry.centering, cells, entry.profile.components());
                let points: Vec<_> = data.data_box().cells().collect();
                for p in points {
                    let p = &p[..dim];
                    let x = match entry.centering {
                        Centering::Cell => domain.cell_center(level, p),
                        Centering::Node => domain.cell_lower_corner(level, p),
                    };
                    if let Some(out) = data.point_mut(p) {
                        entry.profile.eval(&x, out);
                    }
                }
                data
            })
            .collect()
    }
}
