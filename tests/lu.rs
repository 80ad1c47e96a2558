use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use nec_engine::math::CScalar;
use nec_engine::moment::Factored;
use nec_engine::errors::NecError;

fn test_matrix(n: usize) -> DMatrix<CScalar> {
    DMatrix::from_fn(n, n, |i, j| {
        let d = if i == j { 20.0 + i as f64 } else { 0.0 };
        CScalar::new(d + ((i * 7 + j * 3) % 5) as f64 * 0.3, (i as f64 - j as f64) * 0.2)
    })
}

#[test]
fn factor_then_solve_recovers_the_right_hand_side() {
    let a = test_matrix(12);
    let x: DVector<CScalar> = DVector::from_fn(12, |i, _| CScalar::new(i as f64, 1.0 - i as f64 * 0.5));
    let b = &a * &x;

    let (lu, diagnostics) = Factored::factor(a.clone(), 1.0e-10).unwrap();
    assert!(diagnostics.is_empty());
    let solved = lu.solve(&b).unwrap();
    for (s, e) in solved.iter().zip(x.iter()) {
        assert_relative_eq!((s - e).norm(), 0.0, epsilon = 1.0e-9);
    }

    // Unit solves are the columns of the inverse.
    let col = lu.solve_unit(3).unwrap();
    let unit = &a * col;
    for (i, v) in unit.iter().enumerate() {
        let expected = if i == 3 { 1.0 } else { 0.0 };
        assert_relative_eq!(v.re, expected, epsilon = 1.0e-9);
        assert_relative_eq!(v.im, 0.0, epsilon = 1.0e-9);
    }
}

#[test]
fn singular_matrix_reports_its_pivot() {
    let mut a = test_matrix(4);
    a.column_mut(2).fill(CScalar::new(0.0, 0.0));
    let err = Factored::factor(a, 1.0e-10).unwrap_err();
    assert!(matches!(err, NecError::SingularMatrix { .. }), "{err}");
}
