use std::cell::RefCell;
use std::rc::Rc;

use altifit_advect::{LagrangianConfig, LagrangianError, ReferenceSurface};
use altifit_core::{ObservationSet, SchemaError, SensorDictionary, SensorId};
use altifit_fusion::{
    ConfigError, EngineError, FirnMode, FitConfig, FitEngine, FitOutput, FitPipeline, FitProduct,
    FitRequest, FusionError, GridBiasParams, PipelineError, ResultLayout, SensorReader, SlopeBias,
};
use altifit_grid::{Extent, Grid, SolvedGrid};
use altifit_test_utils::{ConstantVelocity, FailingVelocity, ObservationGenerator, SensorTrack};
use altifit_velocity::{VelocityError, VelocityIngest};

// ── Mocks ──────────────────────────────────────────────────────────

struct Generated {
    name: &'static str,
    set: Option<ObservationSet>,
    dem: Option<&'static str>,
    seen: Rc<RefCell<Option<Extent>>>,
}

impl Generated {
    fn new(name: &'static str, set: ObservationSet) -> Self {
        Self {
            name,
            set: Some(set),
            dem: None,
            seen: Rc::default(),
        }
    }
}

impl SensorReader for Generated {
    fn name(&self) -> &str {
        self.name
    }

    fn read(
        &self,
        domain: &Extent,
        sensors: &mut SensorDictionary,
    ) -> Result<Option<ObservationSet>, FusionError> {
        *self.seen.borrow_mut() = Some(*domain);
        let Some(mut set) = self.set.clone() else {
            return Ok(None);
        };
        if let Some(strip) = self.dem {
            let id = sensors.register(strip).as_f64();
            if let Some(col) = set.field_mut("sensor") {
                col.fill(id);
            }
        }
        Ok(Some(set))
    }
}

#[derive(Default)]
struct EchoEngine {
    fail: bool,
    skip_dz: bool,
    seen: RefCell<Option<FitRequest>>,
}

fn axis(name: &str, bounds: (f64, f64), spacing: f64) -> Vec<f64> {
    Grid::new(name, bounds, spacing).unwrap().ctrs().to_vec()
}

impl FitEngine for EchoEngine {
    fn fit(&self, request: FitRequest) -> Result<FitOutput, EngineError> {
        if self.fail {
            return Err(EngineError {
                reason: "matrix is singular".to_string(),
            });
        }
        let half = request.width / 2.0;
        let (cx, cy) = request.center;
        let x = axis("x", (cx - half, cx + half), request.spacing.dz);
        let y = axis("y", (cy - half, cy + half), request.spacing.dz);
        let t = axis("t", request.t_span, request.spacing.dt);
        let mut out = FitOutput {
            data: request.data.clone(),
            e_rms: request.e_rms.clone(),
            ..Default::default()
        };
        let x0 = axis("x", (cx - half, cx + half), request.spacing.z0);
        let y0 = axis("y", (cy - half, cy + half), request.spacing.z0);
        out.grids
            .insert("z0".into(), SolvedGrid::filled(x0, y0, None, 1000.0));
        if !self.skip_dz {
            out.grids
                .insert("dz".into(), SolvedGrid::filled(x, y, Some(t), -0.5));
        }
        for &sensor in &request.data_slope_sensors {
            out.slope_bias.insert(sensor, SlopeBias { x: 1e-5, y: -1e-5 });
        }
        for bias in &request.sensor_grid_bias {
            let xb = axis("x", (cx - half, cx + half), bias.params.spacing);
            let yb = axis("y", (cy - half, cy + half), bias.params.spacing);
            out.grid_bias
                .insert(bias.name(), SolvedGrid::filled(xb, yb, None, bias.expected_value));
        }
        out.rms.insert("data".into(), 0.1);
        out.timing.insert("solve".into(), 0.25);
        *self.seen.borrow_mut() = Some(request);
        Ok(out)
    }
}

struct Flat(f64);

impl ReferenceSurface for Flat {
    fn name(&self) -> &str {
        "flat"
    }

    fn elevation(&self, _x: f64, _y: f64) -> f64 {
        self.0
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn config() -> FitConfig {
    let mut c = FitConfig::new((0.0, 0.0));
    c.width = 10_000.0;
    c.t_span = (2008.0, 2012.0);
    c.spacing.z0 = 500.0;
    c.spacing.dz = 1000.0;
    c.spacing.dt = 1.0;
    c
}

fn lagrangian_config() -> FitConfig {
    let mut c = config();
    c.lagrangian = Some(LagrangianConfig {
        epoch: 2010.0,
        ..Default::default()
    });
    c
}

fn orbital(seed: u64, count: usize) -> ObservationSet {
    ObservationGenerator::new(seed, Extent::centered((0.0, 0.0), 8000.0))
        .generate(&SensorTrack::new(2, count, (2008.0, 2012.0)))
}

fn eastward(speed: f64) -> VelocityIngest {
    ConstantVelocity::new(speed, 0.0, Extent::centered((0.0, 0.0), 100_000.0), 1000.0).ingest()
}

// ── Eulerian runs ──────────────────────────────────────────────────

#[test]
fn eulerian_run_hands_assembled_data_to_engine() {
    let strip = Generated {
        dem: Some("WV01_20100101"),
        ..Generated::new("dem", orbital(2, 10))
    };
    let readers: Vec<Box<dyn SensorReader>> =
        vec![Box::new(Generated::new("atl06", orbital(1, 40))), Box::new(strip)];
    let engine = EchoEngine::default();
    let pipeline = FitPipeline::new(config()).unwrap();
    let product = pipeline.run(&readers, &engine, None).unwrap();

    let request = engine.seen.borrow_mut().take().unwrap();
    assert_eq!(request.data.len(), 50);
    assert_eq!(request.reference_epoch, 4);
    assert_eq!(request.data_slope_sensors, vec![SensorId(6)]);
    assert_eq!(request.sigma_extra_masks["laser"].iter().filter(|&&l| l).count(), 40);
    assert_eq!(request.sigma_extra_masks["DEM"].iter().filter(|&&d| d).count(), 10);
    assert_eq!(request.e_rms.len(), 4);
    assert!(request.data.contains_field("time_corr"));
    assert!(!request.data.contains_field("x_original"));

    assert!(product.lagrangian.is_none());
    assert_eq!(product.fusion.read(), 50);
    assert_eq!(product.sensors.get(SensorId(6)), Some("WV01_20100101"));
    assert!(!product.output.grids["dz"].has_displacement());
}

#[test]
fn eulerian_readers_cover_the_domain() {
    let reader = Generated::new("atl06", orbital(3, 5));
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(reader)];
    let pipeline = FitPipeline::new(config()).unwrap();
    let product = pipeline.run(&readers, &EchoEngine::default(), None).unwrap();
    assert_eq!(product.output.data.len(), 5);
}

#[test]
fn configured_reference_epoch_is_passed_through() {
    let mut c = config();
    c.reference_epoch = Some(1);
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", orbital(4, 5)))];
    let engine = EchoEngine::default();
    let product = FitPipeline::new(c).unwrap().run(&readers, &engine, None).unwrap();
    assert_eq!(product.reference_epoch, 1);
    assert_eq!(engine.seen.borrow().as_ref().unwrap().reference_epoch, 1);
}

#[test]
fn empty_assembly_is_no_data() {
    let reader = Generated {
        set: None,
        ..Generated::new("atl06", ObservationSet::new())
    };
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(reader)];
    let pipeline = FitPipeline::new(config()).unwrap();
    assert_eq!(
        pipeline.run(&readers, &EchoEngine::default(), None).unwrap_err(),
        PipelineError::NoData
    );
}

#[test]
fn engine_failure_aborts() {
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", orbital(5, 5)))];
    let engine = EchoEngine {
        fail: true,
        ..Default::default()
    };
    let err = FitPipeline::new(config()).unwrap().run(&readers, &engine, None).unwrap_err();
    assert!(matches!(err, PipelineError::Engine(_)));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut c = config();
    c.spacing.dz = 0.0;
    assert!(matches!(
        FitPipeline::new(c),
        Err(ConfigError::InvalidSpacing { name: "dz", .. })
    ));
}

#[test]
fn dem_grid_biases_are_requested_per_dem_sensor() {
    let dem = |name, strip, seed| Generated {
        dem: Some(strip),
        ..Generated::new(name, orbital(seed, 5))
    };
    let readers: Vec<Box<dyn SensorReader>> = vec![
        Box::new(Generated::new("atl06", orbital(6, 20))),
        Box::new(dem("wv1", "WV01_20100101", 7)),
        Box::new(dem("wv2", "WV02_20110101", 8)),
    ];
    let mut c = config();
    c.solver.dem_grid_bias = Some(GridBiasParams {
        spacing: 5000.0,
        ..Default::default()
    });
    let engine = EchoEngine::default();
    let product = FitPipeline::new(c).unwrap().run(&readers, &engine, None).unwrap();

    let request = engine.seen.borrow_mut().take().unwrap();
    let sensors: Vec<SensorId> = request.sensor_grid_bias.iter().map(|b| b.sensor).collect();
    assert_eq!(sensors, vec![SensorId(6), SensorId(7)]);
    assert!(request.sensor_grid_bias.iter().all(|b| b.expected_value == 0.0));
    assert_eq!(request.solver.bias_nsigma_edit, Some(6.0));

    let layout = ResultLayout::from_product(&product);
    assert_eq!(layout.dataset("/slope_bias/sensors").unwrap().values, vec![6.0, 7.0]);
    assert_eq!(layout.dataset("/slope_bias/x_slope").unwrap().values, vec![1e-5, 1e-5]);
    let grid = layout.group("/grid_bias/sensor_7_bias").unwrap();
    assert_eq!(grid.datasets["x"].values, vec![-5000.0, 0.0, 5000.0]);

    // Without grid-bias settings only the slope biases are solved.
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(dem("wv1", "WV01_20100101", 9))];
    let engine = EchoEngine::default();
    FitPipeline::new(config()).unwrap().run(&readers, &engine, None).unwrap();
    let request = engine.seen.borrow_mut().take().unwrap();
    assert!(request.sensor_grid_bias.is_empty());
    assert_eq!(request.data_slope_sensors, vec![SensorId(6)]);
}

// ── Resumed runs ───────────────────────────────────────────────────

fn assert_close(a: &[f64], b: &[f64]) {
    assert_eq!(a.len(), b.len());
    for (a, b) in a.iter().zip(b) {
        assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0), "{a} != {b}");
    }
}

fn saved_layout(product: &FitProduct) -> ResultLayout {
    let json = ResultLayout::from_product(product).to_json().unwrap();
    ResultLayout::from_json(&json).unwrap()
}

#[test]
fn resume_refits_saved_observations_without_readers_or_firn() {
    let strip = Generated {
        dem: Some("WV01_20100101"),
        ..Generated::new("dem", orbital(21, 8))
    };
    let readers: Vec<Box<dyn SensorReader>> =
        vec![Box::new(Generated::new("atl06", orbital(20, 30))), Box::new(strip)];
    let first = FitPipeline::new(config())
        .unwrap()
        .run(&readers, &EchoEngine::default(), None)
        .unwrap();
    let prior = saved_layout(&first);

    // A fixed-firn run would need a firn model to assemble from readers.
    let mut c = config();
    c.fusion.firn_mode = FirnMode::Fixed;
    let engine = EchoEngine::default();
    let product = FitPipeline::new(c).unwrap().resume(&prior, &engine, None).unwrap();

    let request = engine.seen.borrow_mut().take().unwrap();
    assert_eq!(request.data.len(), 38);
    assert_close(request.data.z(), first.output.data.z());
    assert_close(request.data.sigma_corr(), first.output.data.sigma_corr());
    assert_eq!(request.data_slope_sensors, vec![SensorId(6)]);
    assert_eq!(product.sensors, first.sensors);
    assert_eq!(product.fusion.read(), 38);
    assert!(product.fusion.stage_count("firn").is_none());
    assert_eq!(product.fusion.inflation.buckets, 0);
}

#[test]
fn resume_adds_back_the_reference_surface_before_advecting() {
    let original = orbital(22, 10);
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", original.clone()))];
    let pipeline = FitPipeline::new(lagrangian_config())
        .unwrap()
        .with_reference_surface(Box::new(Flat(900.0)));
    let first = pipeline
        .run(&readers, &EchoEngine::default(), Some(eastward(10.0)))
        .unwrap();
    let prior = saved_layout(&first);

    let engine = EchoEngine::default();
    let product = pipeline.resume(&prior, &engine, Some(eastward(10.0))).unwrap();
    let request = engine.seen.borrow_mut().take().unwrap();
    assert_close(request.data.field("z0").unwrap(), original.z());
    assert_eq!(request.data.len(), original.len());
    for (z, z0) in request.data.z().iter().zip(original.z()) {
        assert!((z - (z0 - 900.0)).abs() < 1e-9);
    }
    assert_close(product.output.data.x(), original.x());
    assert!(product.output.grids["dz"].has_displacement());
}

#[test]
fn resume_without_saved_data_fails() {
    let err = FitPipeline::new(config())
        .unwrap()
        .resume(&ResultLayout::default(), &EchoEngine::default(), None)
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::Fusion(FusionError::Schema(SchemaError::MissingField {
            name: "x".to_string()
        }))
    );
}

// ── Lagrangian runs ────────────────────────────────────────────────

#[test]
fn lagrangian_run_advects_and_restores() {
    let original = orbital(11, 60);
    let reader = Generated::new("atl06", original.clone());
    let seen = Rc::clone(&reader.seen);
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(reader)];
    let engine = EchoEngine::default();
    let pipeline = FitPipeline::new(lagrangian_config()).unwrap();
    let product = pipeline.run(&readers, &engine, Some(eastward(100.0))).unwrap();

    // Readers see the box swept by the grid: 200 m either side in x.
    let read = seen.borrow().unwrap();
    assert!((read.x.0 + 5200.0).abs() < 1e-6);
    assert!((read.x.1 - 5200.0).abs() < 1e-6);
    assert_eq!(read.y, (-5000.0, 5000.0));

    let summary = product.lagrangian.as_ref().unwrap();
    assert_eq!(summary.grid_bounds, read);
    assert_eq!(summary.unresolved_nodes, 0);
    assert_eq!(summary.data.retained, 60);
    assert_eq!(summary.data.domain_exits, 0);

    let request = engine.seen.borrow_mut().take().unwrap();
    let x0 = request.data.field("x_original").unwrap();
    for ((x, x0), t) in request.data.x().iter().zip(x0).zip(request.data.time()) {
        let expected = x0 - 100.0 * (t - 2010.0);
        assert!((x - expected).abs() < 1e-6, "x {x} expected {expected}");
    }

    assert_eq!(product.output.data.x(), original.x());
    assert_eq!(product.output.data.y(), original.y());
    assert!(!product.output.data.contains_field("x_original"));

    let dz = &product.output.grids["dz"];
    let (ny, nx, nt) = dz.shape();
    assert_eq!((ny, nx, nt), (11, 11, 5));
    let dx = dz.dx.as_ref().unwrap();
    for k in 0..nt {
        let expected = 100.0 * (2008.0 + k as f64 - 2010.0);
        assert!((dx[(5 * nx + 5) * nt + k] - expected).abs() < 1e-6);
    }
    assert!(dz.dy.as_ref().unwrap().iter().all(|d| d.abs() < 1e-9));
}

#[test]
fn lagrangian_layout_carries_displacement() {
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", orbital(12, 20)))];
    let pipeline = FitPipeline::new(lagrangian_config()).unwrap();
    let product = pipeline
        .run(&readers, &EchoEngine::default(), Some(eastward(50.0)))
        .unwrap();
    let layout = ResultLayout::from_product(&product);
    assert_eq!(layout.dataset("/dz/dx").unwrap().shape, vec![11, 11, 5]);
    assert!(layout.dataset("/z0/dx").is_none());
    assert!(layout.dataset("/data/x_original").is_none());
    assert_eq!(layout.sensors(), product.sensors);
    assert_eq!(layout.dataset("/RMS/data").unwrap().values, vec![0.1]);
}

#[test]
fn reference_surface_is_subtracted_before_fitting() {
    let original = orbital(13, 10);
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", original.clone()))];
    let engine = EchoEngine::default();
    let pipeline = FitPipeline::new(lagrangian_config())
        .unwrap()
        .with_reference_surface(Box::new(Flat(900.0)));
    pipeline.run(&readers, &engine, Some(eastward(10.0))).unwrap();
    let request = engine.seen.borrow_mut().take().unwrap();
    assert_eq!(request.data.field("z0").unwrap(), original.z());
    for (z, z0) in request.data.z().iter().zip(original.z()) {
        assert!((z - (z0 - 900.0)).abs() < 1e-9);
    }
}

#[test]
fn points_carried_out_of_the_domain_are_dropped() {
    // 1 km/yr moves points up to 2 km, so some leave the 10 km domain.
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", orbital(14, 400)))];
    let pipeline = FitPipeline::new(lagrangian_config()).unwrap();
    let product = pipeline
        .run(&readers, &EchoEngine::default(), Some(eastward(1000.0)))
        .unwrap();
    let report = &product.lagrangian.unwrap().data;
    assert!(report.domain_exits > 0);
    assert_eq!(report.retained + report.domain_exits, 400);
    assert_eq!(product.output.data.len(), report.retained);
    assert!(product.output.data.x().iter().all(|x| x.abs() <= 4000.0));
}

#[test]
fn missing_dz_grid_is_reported() {
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", orbital(15, 5)))];
    let engine = EchoEngine {
        skip_dz: true,
        ..Default::default()
    };
    let err = FitPipeline::new(lagrangian_config())
        .unwrap()
        .run(&readers, &engine, Some(eastward(10.0)))
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::MissingGrid {
            name: "dz".to_string()
        }
    );
}

#[test]
fn velocity_failure_aborts_the_run() {
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", orbital(16, 5)))];
    let engine = EchoEngine::default();
    let err = FitPipeline::new(lagrangian_config())
        .unwrap()
        .run(
            &readers,
            &engine,
            Some(VelocityIngest::SingleGrid(Box::new(FailingVelocity))),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Lagrangian(LagrangianError::Velocity(VelocityError::Source { .. }))
    ));
    assert!(engine.seen.borrow().is_none());
}

#[test]
fn velocity_without_settings_uses_defaults() {
    // Default reference epoch is 2000, ten years before the data.
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Generated::new("atl06", orbital(17, 5)))];
    let engine = EchoEngine::default();
    let product = FitPipeline::new(config())
        .unwrap()
        .run(&readers, &engine, Some(eastward(0.0)))
        .unwrap();
    assert!(product.lagrangian.is_some());
    assert!(product.output.grids["dz"].has_displacement());
}
