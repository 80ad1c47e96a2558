//! Interaction matrix fill.
//!
//! The matrix is assembled in horizontal blocks of `block_rows` observation
//! rows. Each block owns its own [`FieldEvaluator`], so blocks share nothing
//! but the read-only structure and ground data and can be filled in any
//! order.

use std::ops::Range;
use std::time::{Duration, Instant};

use nalgebra::DMatrix;

use crate::basis::BasisTerm;
use crate::constants::{DEFAULT_RKH, PI};
use crate::errors::{Diagnostic, Result};
use crate::fields::{FieldEvaluator, PatchJunctionField, SourceSegment};
use crate::geometry::{Connection, Patch, SegmentEnd};
use crate::ground::{GroundParameters, GroundTable};
use crate::math::{cdot, CScalar, Scalar, C_ZERO, R3};

use super::ScaledStructure;

/// Kernel and blocking options of a fill.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FillOptions {
    /// Separation in wavelengths beyond which the lumped kernel is used.
    pub rkh: Scalar,
    /// Use the extended thin-wire kernel for nearby parallel segments.
    pub extended_kernel: bool,
    /// Observation rows per block; 0 fills the matrix in a single block.
    pub block_rows: usize,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            rkh: DEFAULT_RKH,
            extended_kernel: false,
            block_rows: 0,
        }
    }
}

/// A filled interaction matrix with fill statistics.
#[derive(Debug, Clone)]
pub struct FilledMatrix {
    /// `matrix[(observation, basis)]`.
    pub matrix: DMatrix<CScalar>,
    /// Wall time of the fill.
    pub elapsed: Duration,
    /// Number of row blocks filled.
    pub blocks: usize,
    /// Recoverable conditions met while filling.
    pub diagnostics: Vec<Diagnostic>,
}

/// Fills the interaction matrix of one frequency step.
#[derive(Debug, Clone, Copy)]
pub struct MatrixFill<'a> {
    structure: &'a ScaledStructure,
    ground: &'a GroundParameters,
    table: Option<&'a GroundTable>,
    loads: Option<&'a [CScalar]>,
    options: FillOptions,
}

impl<'a> MatrixFill<'a> {
    /// Prepares a fill. `loads` holds the per-segment load impedance in
    /// wavelength-normalised units, as produced by the load solver.
    #[must_use]
    pub const fn new(
        structure: &'a ScaledStructure,
        ground: &'a GroundParameters,
        table: Option<&'a GroundTable>,
        loads: Option<&'a [CScalar]>,
        options: FillOptions,
    ) -> Self {
        Self {
            structure,
            ground,
            table,
            loads,
            options,
        }
    }

    /// Fills the whole matrix block by block.
    pub fn fill(&self) -> Result<FilledMatrix> {
        let start = Instant::now();
        let neq = self.structure.unknowns();
        let height = match self.options.block_rows {
            0 => neq.max(1),
            h => h,
        };
        let mut matrix = DMatrix::from_element(neq, neq, C_ZERO);
        let mut limited = 0;
        let mut blocks = 0;
        let mut r0 = 0;
        while r0 < neq {
            let rows = r0..(r0 + height).min(neq);
            let (block, steps) = self.fill_rows(rows.clone())?;
            matrix.rows_mut(rows.start, rows.len()).copy_from(&block);
            limited += steps;
            blocks += 1;
            r0 = rows.end;
        }

        let elapsed = start.elapsed();
        tracing::debug!(order = neq, blocks, ?elapsed, "matrix filled");
        let mut diagnostics = Vec::new();
        if limited > 0 {
            diagnostics.push(Diagnostic::warning(format!(
                "step size limited in {limited} kernel integrations during matrix fill"
            )));
        }
        Ok(FilledMatrix {
            matrix,
            elapsed,
            blocks,
            diagnostics,
        })
    }

    /// Fills observation rows `rows` against every basis column. Returns the
    /// block and the number of integrations that hit their step limit.
    pub fn fill_rows(&self, rows: Range<usize>) -> Result<(DMatrix<CScalar>, usize)> {
        let geom = &self.structure.geometry;
        let neq = geom.unknowns();
        let n = geom.segment_count();
        let rows = rows.start.min(neq)..rows.end.min(neq);
        let mut block = DMatrix::from_element(rows.len(), neq, C_ZERO);
        let mut eval = FieldEvaluator::new(self.ground, self.table, self.options.rkh, self.options.extended_kernel)?;

        let wire_rows = rows.start.min(n)..rows.end.min(n);
        let patch_rows = rows.start.max(n)..rows.end.max(n);

        for j in 0..n {
            let src = SourceSegment::new(geom, j);
            let trio = &self.structure.basis.trio[j];
            for i in wire_rows.clone() {
                let obs = &geom.segments[i];
                let field = eval.wire_e(&src, &obs.center, obs.radius, i == j);
                add_terms(&mut block, i - rows.start, trio, field.along(&obs.direction));
            }
            self.wire_on_patches(&mut eval, &mut block, &rows, &patch_rows, &src, trio);

            if let Some(z) = self.loads {
                if wire_rows.contains(&j) {
                    for t in trio {
                        block[(j - rows.start, t.segment)] -= z[j] * (t.a + t.c);
                    }
                }
            }
        }

        for i in wire_rows {
            self.patches_on_wire(&eval, &mut block, i, i - rows.start);
        }
        self.patches_on_patches(&eval, &mut block, &rows, &patch_rows);

        Ok((block, eval.limited_steps()))
    }

    /// H field of a wire source tested on the patch rows in `patch_rows`.
    fn wire_on_patches(
        &self,
        eval: &mut FieldEvaluator<'_>,
        block: &mut DMatrix<CScalar>,
        rows: &Range<usize>,
        patch_rows: &Range<usize>,
        src: &SourceSegment,
        trio: &[BasisTerm],
    ) {
        if patch_rows.is_empty() {
            return;
        }
        let geom = &self.structure.geometry;
        let n = geom.segment_count();
        let first = (patch_rows.start - n) / 2;
        let last = (patch_rows.end - n + 1) / 2;
        for (p, patch) in geom.patches.iter().enumerate().take(last).skip(first) {
            let h = eval.wire_h(src, &patch.center, 0.0);
            for (row, t) in [(n + 2 * p, &patch.t2), (n + 2 * p + 1, &patch.t1)] {
                if !patch_rows.contains(&row) {
                    continue;
                }
                let (k, s, c) = h.along(t);
                let hand = -patch.handedness;
                add_terms(block, row - rows.start, trio, (k * hand, s * hand, c * hand));
            }
        }
    }

    /// E field of every patch current along wire segment `i`.
    fn patches_on_wire(&self, eval: &FieldEvaluator<'_>, block: &mut DMatrix<CScalar>, i: usize, r: usize) {
        let geom = &self.structure.geometry;
        if geom.patches.is_empty() {
            return;
        }
        let n = geom.segment_count();
        let seg = &geom.segments[i];

        let mut attached = None;
        for end in SegmentEnd::BOTH {
            if let Connection::Patch(p) = seg.connection(end) {
                attached = Some((p, end.sign()));
            }
        }

        let mut child = 0;
        let mut split = PatchJunctionField::default();
        for (j, patch) in geom.patches.iter().enumerate() {
            let (c1, c2) = (n + 2 * j, n + 2 * j + 1);
            let on_junction = matches!(attached, Some((p, _)) if p == j) || child != 0;
            if let (true, Some((_, fsign))) = (on_junction, attached) {
                if child == 0 {
                    split = eval.patch_junction_e(patch, &seg.center, &seg.direction);
                    if let Some(own) = self.structure.basis.trio[i].last() {
                        let arg = PI * seg.length * fsign;
                        let (s, c) = arg.sin_cos();
                        block[(r, i)] += split.junction * fsign * (own.a + own.b * s + own.c * c);
                    }
                }
                block[(r, c1)] += split.t1[child];
                block[(r, c2)] += split.t2[child];
                child = (child + 1) % 4;
            } else {
                let direct = eval.patch_e(patch, &seg.center, false);
                block[(r, c1)] += cdot(&direct.t1, &seg.direction);
                block[(r, c2)] += cdot(&direct.t2, &seg.direction);
            }
            if eval.ground().has_image() {
                let image = eval.patch_e(patch, &seg.center, true);
                block[(r, c1)] += cdot(&image.t1, &seg.direction);
                block[(r, c2)] += cdot(&image.t2, &seg.direction);
            }
        }
    }

    /// Magnetic field integral equation rows of patch observers.
    fn patches_on_patches(
        &self,
        eval: &FieldEvaluator<'_>,
        block: &mut DMatrix<CScalar>,
        rows: &Range<usize>,
        patch_rows: &Range<usize>,
    ) {
        if patch_rows.is_empty() {
            return;
        }
        let geom = &self.structure.geometry;
        let n = geom.segment_count();
        for (i, obs) in geom.patches.iter().enumerate() {
            let (r1, r2) = (n + 2 * i, n + 2 * i + 1);
            if !patch_rows.contains(&r1) && !patch_rows.contains(&r2) {
                continue;
            }
            let t1i = obs.t1 * obs.handedness;
            let t2i = obs.t2 * obs.handedness;
            for (j, src) in geom.patches.iter().enumerate() {
                let [g11, g12, g21, g22] = surface_coupling(eval, obs, &t1i, &t2i, src, i == j);
                let (c1, c2) = (n + 2 * j, n + 2 * j + 1);
                if patch_rows.contains(&r1) {
                    block[(r1 - rows.start, c1)] = g11;
                    block[(r1 - rows.start, c2)] = g12;
                }
                if patch_rows.contains(&r2) {
                    block[(r2 - rows.start, c1)] = g21;
                    block[(r2 - rows.start, c2)] = g22;
                }
            }
        }
    }
}

fn surface_coupling(
    eval: &FieldEvaluator<'_>,
    obs: &Patch,
    t1i: &R3,
    t2i: &R3,
    src: &Patch,
    same: bool,
) -> [CScalar; 4] {
    let h = eval.patch_h(src, &obs.center);
    let mut g11 = -cdot(&h.t1, t2i);
    let g12 = -cdot(&h.t2, t2i);
    let g21 = -cdot(&h.t1, t1i);
    let mut g22 = -cdot(&h.t2, t1i);
    if same {
        g11 -= 0.5;
        g22 += 0.5;
    }
    [g11, g12, g21, g22]
}

fn add_terms(block: &mut DMatrix<CScalar>, r: usize, trio: &[BasisTerm], (k, s, c): (CScalar, CScalar, CScalar)) {
    for t in trio {
        block[(r, t.segment)] += k * t.a + s * t.b + c * t.c;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geometry::GeometryBuilder;
    use crate::ground::GroundSpec;

    fn dipole(ns: usize) -> ScaledStructure {
        let mut b = GeometryBuilder::new();
        b.wire(1, ns, R3::new(0.0, 0.0, -0.25), R3::new(0.0, 0.0, 0.25), 0.001, 1.0, 1.0)
            .unwrap();
        let g = b.finish(false).unwrap();
        ScaledStructure::new(&g, 299.8).unwrap()
    }

    fn free() -> GroundParameters {
        GroundParameters::new(&GroundSpec::FreeSpace, 1.0).unwrap()
    }

    #[test]
    fn block_fill_matches_single_block() {
        let s = dipole(7);
        let ground = free();
        let whole = MatrixFill::new(&s, &ground, None, None, FillOptions::default())
            .fill()
            .unwrap();
        let opts = FillOptions {
            block_rows: 3,
            ..FillOptions::default()
        };
        let blocked = MatrixFill::new(&s, &ground, None, None, opts).fill().unwrap();
        assert_eq!(whole.blocks, 1);
        assert_eq!(blocked.blocks, 3);
        assert_eq!(whole.matrix, blocked.matrix);
    }

    #[test]
    fn uniform_wire_interior_is_translation_invariant() {
        let s = dipole(9);
        let ground = free();
        let m = MatrixFill::new(&s, &ground, None, None, FillOptions::default())
            .fill()
            .unwrap()
            .matrix;
        // Interior basis functions share one shape, so coupling depends on
        // the offset between observer and basis centre only.
        for (a, b) in [((3, 4), (4, 5)), ((2, 4), (3, 5)), ((4, 4), (5, 5))] {
            let (x, y) = (m[a], m[b]);
            assert_relative_eq!((x - y).norm() / x.norm(), 0.0, epsilon = 1.0e-6);
        }
        assert!(m[(4, 4)].norm() > m[(4, 0)].norm());
    }

    #[test]
    fn loads_only_touch_their_own_row() {
        let s = dipole(5);
        let ground = free();
        let mut z = vec![C_ZERO; 5];
        z[2] = CScalar::new(100.0, 0.0);
        let bare = MatrixFill::new(&s, &ground, None, None, FillOptions::default())
            .fill()
            .unwrap()
            .matrix;
        let loaded = MatrixFill::new(&s, &ground, None, Some(&z), FillOptions::default())
            .fill()
            .unwrap()
            .matrix;
        let diff = &loaded - &bare;
        for i in [0, 1, 3, 4] {
            assert!(diff.row(i).iter().all(|v| *v == C_ZERO));
        }
        let trio = &s.basis.trio[2];
        for t in trio {
            assert_relative_eq!(diff[(2, t.segment)].re, -100.0 * (t.a + t.c), max_relative = 1.0e-9);
        }
    }
}
