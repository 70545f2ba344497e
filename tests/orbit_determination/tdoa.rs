use super::{tdoa_stations, tdoa_truth_states};
use od::od::msr::{MeasurementNoise, TrackingArc};
use od::od::tdoa::{resolved_track, Multilateration, Multilaterator, TdoaError};
use od::od::TrackingSimulator;

#[test]
fn noiseless_arc_is_recovered() {
    crate::init_logger();
    let truth = tdoa_truth_states();
    let noise = MeasurementNoise {
        timing_s: 0.0,
        ..Default::default()
    };
    let arc = TrackingSimulator::new(noise, 0)
        .tdoa_arc(tdoa_stations(), &truth)
        .unwrap();

    let results = Multilaterator::default().multilaterate_arc(&arc).unwrap();
    assert_eq!(results.len(), truth.len());
    for (result, state) in results.iter().zip(truth.iter()) {
        let fix = result.fix().unwrap();
        assert_eq!(fix.epoch, state.epoch);
        let err = (fix.position_km - state.radius()).norm();
        assert!(err < 1e-3, "{err} km at {}", fix.epoch);
    }

    let track = resolved_track(&results).unwrap();
    assert_eq!(track.len(), truth.len());
}

#[test]
fn four_stations_suffice_three_do_not() {
    let truth = tdoa_truth_states();
    let noise = MeasurementNoise {
        timing_s: 0.0,
        ..Default::default()
    };
    let mut stations = tdoa_stations();
    stations.truncate(4);
    let arc = TrackingSimulator::new(noise, 0)
        .tdoa_arc(stations.clone(), &truth[..5])
        .unwrap();
    let results = Multilaterator::default().multilaterate_arc(&arc).unwrap();
    assert!(results.iter().all(|r| r.fix().is_some()));

    stations.truncate(3);
    let arc = TrackingSimulator::new(noise, 0)
        .tdoa_arc(stations, &truth[..5])
        .unwrap();
    assert_eq!(
        Multilaterator::default().multilaterate_arc(&arc),
        Err(TdoaError::UnderdeterminedGeometry { min: 4, got: 3 })
    );
}

#[test]
fn timing_noise_maps_to_position_noise() {
    let truth = tdoa_truth_states();
    let noise = MeasurementNoise {
        timing_s: 1e-9,
        ..Default::default()
    };
    let arc: TrackingArc = TrackingSimulator::new(noise, 5)
        .tdoa_arc(tdoa_stations(), &truth)
        .unwrap();
    let results = Multilaterator::default().multilaterate_arc(&arc).unwrap();
    for (result, state) in results.iter().zip(truth.iter()) {
        match result {
            Multilateration::Resolved(fix) => {
                // Nanosecond timing over a few hundred kilometers of baseline
                assert!((fix.position_km - state.radius()).norm() < 1.0);
            }
            Multilateration::Unresolved { epoch, error } => {
                panic!("unresolved at {epoch}: {error}")
            }
        }
    }
}
