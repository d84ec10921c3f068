//! Refinement criteria.
//!
//! A [`TaggingEngine`] looks at one patch and its level metadata and returns
//! a [`TagField`] over the patch's cells. It must not look at anything else:
//! patches are tagged independently, in parallel with the
//! `parallel-tagging` feature, and the result must not depend on which
//! worker owns which patch.

use crate::data::TagField;
use crate::geometry::{Domain, IndexBox};
use crate::hierarchy::Patch;
use crate::hierarchy_error::TagFieldError;
#[cfg(feature = "parallel-tagging")]
use rayon::prelude::*;

pub const DEFAULT_GRADIENT_THRESHOLD: f64 = 0.1;

/// Level metadata handed to a tagger alongside the patch.
#[derive(Clone, Debug, PartialEq)]
pub struct TagContext {
    pub level: usize,
    /// Ratio to the next coarser level (1 on level 0).
    pub ratio: i64,
    pub cell_width: Vec<f64>,
    pub origin: Vec<f64>,
    pub patch_box: IndexBox,
}

impl TagContext {
    pub fn new(domain: &Domain, level: usize, patch_box: IndexBox) -> Self {
        Self {
            level,
            ratio: if level == 0 { 1 } else { crate::geometry::REFINEMENT_RATIO },
            cell_width: domain.cell_width(level),
            origin: domain.origin().to_vec(),
            patch_box,
        }
    }

    /// Physical center of `cell`.
    pub fn cell_center(&self, cell: &[i64]) -> Vec<f64> {
        self.cell_width
            .iter()
            .zip(&self.origin)
            .zip(cell)
            .map(|((dx, x0), &i)| x0 + (i as f64 + 0.5) * dx)
            .collect()
    }
}

pub trait TaggingEngine: Send + Sync {
    fn tag(&self, patch: &Patch, ctx: &TagContext) -> TagField;
}

/// Tags a cell when the relative jump of a field across it exceeds a
/// threshold along any axis:
///
/// `|f(i+1) - f(i-1)| / (|f(i+1)| + |f(i-1)| + eps) > threshold`
///
/// Neighbours outside the patch are replaced by the cell itself (one-sided
/// difference). Every component of the field is checked.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientTagger {
    pub field: String,
    pub threshold: f64,
}

impl GradientTagger {
    const EPS: f64 = 1e-12;

    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            threshold: DEFAULT_GRADIENT_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl TaggingEngine for GradientTagger {
    fn tag(&self, patch: &Patch, ctx: &TagContext) -> TagField {
        let cells = ctx.patch_box;
        let Some(data) = patch.data(&self.field) else {
            log::debug!("patch {} has no `{}`; nothing tagged", patch.id(), self.field);
            return TagField::zeros(&cells);
        };
        let dim = cells.dim();
        TagField::from_fn(&cells, |cell| {
            let Some(here) = data.point(cell) else {
                return false;
            };
            (0..dim).any(|axis| {
                let mut left = cell.to_vec();
                let mut right = cell.to_vec();
                left[axis] -= 1;
                right[axis] += 1;
                let fl = if cells.contains_cell(&left) { data.point(&left) } else { None };
                let fr = if cells.contains_cell(&right) { data.point(&right) } else { None };
                let (fl, fr) = (fl.unwrap_or(here), fr.unwrap_or(here));
                fl.iter().zip(fr).any(|(&l, &r)| {
                    (r - l).abs() / (r.abs() + l.abs() + Self::EPS) > self.threshold
                })
            })
        })
    }
}

/// Closure-backed engine.
pub struct FnTagger<F>(pub F);

impl<F> TaggingEngine for FnTagger<F>
where
    F: Fn(&Patch, &TagContext) -> TagField + Send + Sync,
{
    fn tag(&self, patch: &Patch, ctx: &TagContext) -> TagField {
        (self.0)(patch, ctx)
    }
}

/// Tags every cell whose physical center satisfies a predicate.
pub struct RegionTagger<F>(pub F);

impl<F> TaggingEngine for RegionTagger<F>
where
    F: Fn(&[f64]) -> bool + Send + Sync,
{
    fn tag(&self, _patch: &Patch, ctx: &TagContext) -> TagField {
        TagField::from_fn(&ctx.patch_box, |cell| (self.0)(&ctx.cell_center(cell)))
    }
}

/// Tag every patch independently, validate each field and store it on its
/// patch under [`crate::data::TAG_QUANTITY`].
///
/// On invalid tags the first offending patch (in patch order) is reported
/// and nothing is stored.
pub fn tag_patches<T>(
    engine: &T,
    domain: &Domain,
    level: usize,
    patches: &mut [Patch],
) -> Result<usize, TagFieldError>
where
    T: TaggingEngine + ?Sized,
{
    let eval = |patch: &Patch| -> Result<TagField, TagFieldError> {
        let ctx = TagContext::new(domain, level, *patch.cells());
        let tags = engine.tag(patch, &ctx);
        let label = patch.id().to_string();
        if tags.cells() != patch.cells() {
            return Err(TagFieldError::BoxMismatch {
                patch: label,
                expected: *patch.cells(),
                found: *tags.cells(),
            });
        }
        tags.validate(&label)?;
        Ok(tags)
    };

    #[cfg(feature = "parallel-tagging")]
    let results: Vec<Result<TagField, TagFieldError>> = patches.par_iter().map(eval).collect();
    #[cfg(not(feature = "parallel-tagging"))]
    let results: Vec<Result<TagField, TagFieldError>> = patches.iter().map(eval).collect();

    let fields = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    let mut tagged = 0;
    for (patch, tags) in patches.iter_mut().zip(fields) {
        tagged += tags.count();
        patch.insert(tags.to_patch_data());
    }
    Ok(tagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Centering, PatchData, TAG_QUANTITY};
    use crate::hierarchy::{PatchDescriptor, PatchId};

    fn patch_with(values: &[f64]) -> Patch {
        let cells = IndexBox::new(&[0], &[values.len() as i64 - 1]);
        let mut p = Patch::new(PatchDescriptor {
            id: PatchId::new(0, 0),
            cells,
            owner: 0,
        });
        let mut d = PatchData::real("rho", Centering::Cell, &cells, 1);
        d.as_f64_mut().unwrap().copy_from_slice(values);
        p.insert(d);
        p
    }

    #[test]
    fn gradient_flags_the_jump() {
        let domain = Domain::new(&[6], &[1.0]).unwrap();
        let p = patch_with(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        let ctx = TagContext::new(&domain, 0, *p.cells());
        let tags = GradientTagger::new("rho").tag(&p, &ctx);
        assert_eq!(tags.values(), &[0, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn missing_field_tags_nothing() {
        let domain = Domain::new(&[6], &[1.0]).unwrap();
        let p = patch_with(&[1.0; 6]);
        let ctx = TagContext::new(&domain, 0, *p.cells());
        assert_eq!(GradientTagger::new("Bx").tag(&p, &ctx).count(), 0);
    }

    #[test]
    fn invalid_tags_are_rejected_before_storage() {
        let domain = Domain::new(&[4], &[1.0]).unwrap();
        let mut patches = vec![patch_with(&[0.0; 4])];
        let bad = FnTagger(|p: &Patch, _: &TagContext| {
            TagField::from_values(p.cells(), vec![0, 3, 0, 0], "x").unwrap()
        });
        let err = tag_patches(&bad, &domain, 0, &mut patches).unwrap_err();
        assert!(matches!(err, TagFieldError::InvalidValue { value: 3, .. }));
        assert!(patches[0].data(TAG_QUANTITY).is_none());
    }

    #[test]
    fn tags_over_the_wrong_box_are_rejected() {
        let domain = Domain::new(&[8], &[1.0]).unwrap();
        let mut patches = vec![patch_with(&[0.0; 4])];
        // same cell count, shifted by one cell
        let shifted = FnTagger(|_: &Patch, _: &TagContext| {
            TagField::zeros(&IndexBox::new(&[1], &[4]))
        });
        let err = tag_patches(&shifted, &domain, 0, &mut patches).unwrap_err();
        assert_eq!(
            err,
            TagFieldError::BoxMismatch {
                patch: "0_0".into(),
                expected: IndexBox::new(&[0], &[3]),
                found: IndexBox::new(&[1], &[4]),
            }
        );
        assert!(err.to_string().contains("[[1]..=[4]]"));
        assert!(patches[0].data(TAG_QUANTITY).is_none());
    }

    #[test]
    fn stored_tags_are_named_tags() {
        let domain = Domain::new(&[4], &[0.5]).unwrap();
        let mut patches = vec![patch_with(&[0.0; 4])];
        let n = tag_patches(&RegionTagger(|x: &[f64]| x[0] > 1.0), &domain, 0, &mut patches).unwrap();
        assert_eq!(n, 2);
        assert_eq!(patches[0].tags().unwrap().values(), &[0, 0, 1, 1]);
    }
}
