use nec_engine::prelude::*;

fn main() -> Result<()> {
    nec_engine::init_logging();

    // Half-wave dipole for 300 MHz, 0.5 m above average ground.
    let dipole = GeometryCommand::Wire {
        tag: 1,
        segments: 21,
        start: R3::new(0.0, -0.24, 0.5),
        end: R3::new(0.0, 0.24, 0.5),
        radius: 1.0e-3,
        rdel: 1.0,
        rrad: 1.0,
    };
    let ground = GroundSpec::Finite(FiniteGround {
        epsr: 13.0,
        sig: 0.005,
        method: GroundMethod::ReflectionCoefficient,
        screen: None,
        second_medium: None,
    });
    let deck = ControlDeck::new(FrequencyBlock::LinearRange {
        min: 270.0,
        max: 330.0,
        count: 12,
    })
    .with_ground(ground)
    .with_excitation(Excitation::Voltage {
        segment: SegmentRef::new(1, 11),
        voltage: CScalar::new(1.0, 0.0),
    })
    .with_far_field(FarFieldRequest::grid((0.0, 5.0, 19), (0.0, 90.0, 2)));
    let model = NecModel::new(vec![dipole], deck);

    let config = SolverConfig::default().with_workers(4);
    let steps = run_sweep(model, &config, |_, _, _| ())?;

    println!("f(MHz), R(ohm), X(ohm), max gain(dBi), efficiency(%)");
    for s in &steps {
        let z = s.impedance.unwrap_or_default();
        let gain = s.pattern.as_ref().map_or(DB_FLOOR, |p| p.extremes[0][0]);
        println!(
            "{:.3}, {:.3}, {:.3}, {:.2}, {:.1}",
            s.freq_mhz, z.re, z.im, gain, s.budget.efficiency
        );
    }
    Ok(())
}
