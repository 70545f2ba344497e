use od::dynamics::OrbitalDynamics;
use od::io::{
    BatchConfig, ConfigError, ConfigRepr, Configurable, IntegratorKind, PipelineConfig,
    PropagatorConfig, TdoaConfig,
};
use od::od::blse::{BatchLeastSquares, BatchSolver};
use od::od::tdoa::Multilaterator;
use od::propagators::{Propagator, RSSCartesianStep};
use od::time::Unit;
use std::io::Write;

const PIPELINE: &str = r#"
smoother:
  window: 15
  degree: 2
iod:
  method: HerrickGibbs
  herrick_gibbs_window: 4
filter:
  position_sigma_km: 0.02
propagator:
  integrator: RKF45
  max_step_s: 600.0
  j2: true
tdoa:
  residual_tolerance_km: 0.5
batch:
  solver: LevenbergMarquardt
  candidates: 16
  acceptance_threshold_km: 50.0
sample_step_s: 60.0
"#;

#[test]
fn pipeline_from_yaml() {
    let cfg = PipelineConfig::loads(PIPELINE).unwrap();
    assert_eq!(cfg.smoother.window, 15);
    assert_eq!(cfg.smoother.degree, 2);
    assert_eq!(cfg.iod.herrick_gibbs_window, 4);
    assert_eq!(cfg.filter.position_sigma_km, 0.02);
    assert_eq!(cfg.filter.sma_sigma_km, 10.0);
    assert_eq!(cfg.propagator.integrator, IntegratorKind::RKF45);
    assert_eq!(cfg.batch.candidates, 16);
    assert_eq!(cfg.sample_step_s, 60.0);
    assert_eq!(cfg.sample_count, 20);

    let prop: Propagator<OrbitalDynamics, RSSCartesianStep> =
        Propagator::from_config(&cfg.propagator).unwrap();
    assert_eq!(prop.opts.max_step, 600.0 * Unit::Second);
    assert_eq!(prop.dynamics.accel_models.len(), 1);

    let mlat = Multilaterator::from_config(&cfg.tdoa).unwrap();
    assert_eq!(mlat.residual_tolerance_km, 0.5);
    assert_eq!(mlat.max_iterations, 50);

    let bls = BatchLeastSquares::from_config(&cfg.batch).unwrap();
    assert_eq!(bls.solver, BatchSolver::LevenbergMarquardt);
    assert_eq!(bls.max_iterations, 10);
}

#[test]
fn configurable_from_files() {
    let path = std::env::temp_dir().join("orbit_determinator_propagator.yaml");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"integrator: RK4\nfixed_step_s: 5.0\n")
        .unwrap();
    let prop: Propagator<OrbitalDynamics, RSSCartesianStep> =
        Propagator::from_yaml(&path).unwrap();
    assert!(prop.opts.fixed_step);
    let state = prop
        .with(crate::leo())
        .for_duration(1.0 * Unit::Minute)
        .unwrap();
    assert_eq!(state.epoch, crate::leo().epoch + 1.0 * Unit::Minute);

    let many = std::env::temp_dir().join("orbit_determinator_batches.yaml");
    std::fs::File::create(&many)
        .unwrap()
        .write_all(b"- tolerance: 0.01\n- solver: LevenbergMarquardt\n")
        .unwrap();
    let batches = BatchConfig::load_many(&many).unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].tolerance, 0.01);
    assert_eq!(batches[1].solver, BatchSolver::LevenbergMarquardt);
}

#[test]
fn invalid_configurations() {
    let bad_tdoa = TdoaConfig {
        signal_speed_km_s: 0.0,
        ..Default::default()
    };
    assert!(matches!(
        Multilaterator::from_config(&bad_tdoa),
        Err(ConfigError::InvalidConfig { .. })
    ));

    let bad_batch = BatchConfig {
        divergence_factor: 0.5,
        ..Default::default()
    };
    assert!(matches!(
        BatchLeastSquares::from_config(&bad_batch),
        Err(ConfigError::InvalidConfig { .. })
    ));

    let bad_prop = PropagatorConfig {
        init_step_s: 10_000.0,
        ..Default::default()
    };
    assert!(Propagator::<OrbitalDynamics, RSSCartesianStep>::from_config(&bad_prop).is_err());

    assert!(matches!(
        PipelineConfig::loads("smoother: [1, 2]"),
        Err(ConfigError::ParseError { .. })
    ));
}
