use approx::assert_relative_eq;
use nec_engine::ground::{GroundInterpolator, GroundTable, GRIDS};
use nec_engine::math::CScalar;

#[test]
fn interpolation_reproduces_table_nodes() {
    let table = GroundTable::build(CScalar::new(13.0, -1.8));
    let mut interp = GroundInterpolator::new(&table);
    for &(grid, ix, iy) in &[(0, 4, 4), (0, 7, 2), (1, 5, 2), (2, 3, 4)] {
        let spec = GRIDS[grid];
        let node = table.node(grid, ix, iy);
        let value = interp.interpolate(spec.x(ix), spec.y(iy));
        for (v, n) in value.iter().zip(node) {
            assert_relative_eq!((v - n).norm(), 0.0, epsilon = 1.0e-6 * (1.0 + n.norm()));
        }
    }
}

#[test]
fn window_is_reused_between_nearby_points() {
    let table = GroundTable::build(CScalar::new(4.0, -0.5));
    let mut interp = GroundInterpolator::new(&table);
    let spec = GRIDS[0];
    let (x, y) = (spec.x(4), spec.y(4));
    interp.interpolate(x, y);
    interp.interpolate(x + 0.1 * spec.dx, y + 0.1 * spec.dy);
    assert_eq!(interp.refits(), 1);
}

#[test]
fn table_reuse_is_keyed_by_permittivity() {
    let epsc = CScalar::new(10.0, -3.0);
    let table = GroundTable::build(epsc);
    assert!(table.matches(epsc));
    assert!(table.check(epsc * 1.5).is_err());
}

fn close(a: [CScalar; 4], b: [CScalar; 4], rel: f64) {
    for (u, v) in a.iter().zip(b) {
        assert_relative_eq!((u - v).norm(), 0.0, epsilon = rel * (1.0 + v.norm()));
    }
}

#[test]
fn interpolation_is_continuous_across_window_edges() {
    let table = GroundTable::build(CScalar::new(13.0, -1.8));
    let spec = GRIDS[0];
    let eps = 1.0e-9;

    // Node 6 closes the window starting at 3 and opens the one starting at 6.
    let y = spec.y(4) + 0.3 * spec.dy;
    let mut interp = GroundInterpolator::new(&table);
    let below = interp.interpolate(spec.x(6) - eps, y);
    let above = interp.interpolate(spec.x(6) + eps, y);
    assert_eq!(interp.refits(), 2);
    close(below, above, 1.0e-5);

    let x = spec.x(4) + 0.3 * spec.dx;
    let mut interp = GroundInterpolator::new(&table);
    let below = interp.interpolate(x, spec.y(6) - eps);
    let above = interp.interpolate(x, spec.y(6) + eps);
    assert_eq!(interp.refits(), 2);
    close(below, above, 1.0e-5);

    // Both windows reproduce the node they share.
    let node = table.node(0, 6, 6);
    let mut interp = GroundInterpolator::new(&table);
    close(interp.interpolate(spec.x(6) - eps, spec.y(6) - eps), node, 1.0e-5);
    close(interp.interpolate(spec.x(6) + eps, spec.y(6) + eps), node, 1.0e-5);
    assert_eq!(interp.refits(), 2);
}
