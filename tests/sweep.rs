use approx::assert_relative_eq;
use nec_engine::prelude::*;

fn dipole(frequency: FrequencyBlock) -> NecModel {
    let wire = GeometryCommand::Wire {
        tag: 1,
        segments: 9,
        start: R3::new(0.0, 0.0, -0.24),
        end: R3::new(0.0, 0.0, 0.24),
        radius: 1.0e-3,
        rdel: 1.0,
        rrad: 1.0,
    };
    let deck = ControlDeck::new(frequency).with_excitation(Excitation::Voltage {
        segment: SegmentRef::new(1, 5),
        voltage: CScalar::new(1.0, 0.0),
    });
    NecModel::new(vec![wire], deck)
}

#[test]
fn threaded_sweep_matches_sequential_sweep() {
    let model = dipole(FrequencyBlock::LinearRange {
        min: 250.0,
        max: 350.0,
        count: 5,
    });
    let local = run_sweep_local(&model, &SolverConfig::default(), |_, _| ()).unwrap();

    let mut pointers = Vec::new();
    let pooled = run_sweep(model, &SolverConfig::default().with_workers(3), |sched, _, _| {
        pointers.push(sched.last_complete());
    })
    .unwrap();

    assert_eq!(pooled.len(), 6);
    assert_eq!(local.len(), 6);
    for (p, l) in pooled.iter().zip(&local) {
        assert_relative_eq!(p.freq_mhz, l.freq_mhz);
        let (zp, zl) = (p.impedance.unwrap(), l.impedance.unwrap());
        assert_relative_eq!(zp.re, zl.re, max_relative = 1.0e-12);
        assert_relative_eq!(zp.im, zl.im, max_relative = 1.0e-12);
    }
    // The completion pointer never moves backwards, whatever order the
    // workers finish in.
    assert!(pointers.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(pointers.last(), Some(&Some(5)));
}

#[test]
fn scheduler_tracks_out_of_order_completion() {
    let mut s = SweepScheduler::new(vec![10.0, 20.0, 30.0, 40.0], 2);
    let a = s.dispatch().unwrap();
    let b = s.dispatch().unwrap();
    assert!(s.dispatch().is_none());
    assert_eq!((a.step, b.step), (0, 1));

    assert_eq!(s.complete(&b).unwrap(), None);
    assert_eq!(s.last_complete(), None);
    let c = s.dispatch().unwrap();
    assert_eq!(c.step, 2);
    assert_eq!(s.complete(&a).unwrap(), Some(1));
    assert_eq!(s.complete(&c).unwrap(), Some(2));
    let d = s.dispatch().unwrap();
    assert_eq!(s.complete(&d).unwrap(), Some(3));
    assert!(s.is_finished());
}

#[test]
fn reset_discards_steps_in_flight() {
    let mut s = SweepScheduler::new(vec![1.0, 2.0], 1);
    let stale = s.dispatch().unwrap();
    s.reset();
    assert_eq!(s.complete(&stale).unwrap(), None);
    assert_eq!(s.last_complete(), None);
    let fresh = s.dispatch().unwrap();
    assert_eq!(fresh.step, 0);
    assert_ne!(fresh.generation, stale.generation);
}

#[test]
fn multiplicative_range_is_geometric() {
    let f = FrequencySpec::from(FrequencyBlock::MultiplicativeRange {
        min: 1.0,
        max: 16.0,
        count: 4,
    })
    .frequencies()
    .unwrap();
    let expected = [1.0, 2.0, 4.0, 8.0, 16.0];
    assert_eq!(f.len(), expected.len());
    for (a, b) in f.iter().zip(expected) {
        assert_relative_eq!(*a, b, max_relative = 1.0e-12);
    }
}

#[test]
fn step_record_frame_survives_decoding() {
    let model = dipole(FrequencyBlock::Linear {
        start: 299.8,
        step: 0.0,
        count: 1,
    });
    let result = run_frequency(&model, &SolverConfig::default(), 299.8).unwrap();
    let record = StepRecord::from(&result);
    let decoded = StepRecord::decode(&record.encode().unwrap()).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(decoded.segment_currents.len(), 9);
}
