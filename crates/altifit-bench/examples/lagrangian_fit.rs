//! End-to-end Lagrangian fit of one tile with a toy fit engine.
//!
//! Demonstrates: config → pipeline → readers + velocity → fit → layout.
//! Set `RUST_LOG=debug` to see gap filling and per-epoch advection.

use altifit_advect::LagrangianConfig;
use altifit_bench::{reference_observations, reference_velocity, REFERENCE_CENTER, REFERENCE_WIDTH};
use altifit_core::{ObservationSet, SensorDictionary};
use altifit_fusion::{
    EngineError, FitConfig, FitEngine, FitOutput, FitPipeline, FitRequest, FusionError,
    ResultLayout, SensorReader,
};
use altifit_grid::{Extent, Grid, SolvedGrid};
use tracing_subscriber::EnvFilter;

struct Preloaded(ObservationSet);

impl SensorReader for Preloaded {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn read(
        &self,
        domain: &Extent,
        _sensors: &mut SensorDictionary,
    ) -> Result<Option<ObservationSet>, FusionError> {
        let mut set = self.0.clone();
        let keep: Vec<bool> = set
            .x()
            .iter()
            .zip(set.y())
            .map(|(&x, &y)| domain.contains(x, y))
            .collect();
        set.retain(&keep)?;
        Ok(Some(set))
    }
}

/// Fits a constant reference surface and no elevation change.
struct MeanEngine;

impl FitEngine for MeanEngine {
    fn fit(&self, request: FitRequest) -> Result<FitOutput, EngineError> {
        let axis = |name: &str, lo: f64, hi: f64, step: f64| {
            Grid::new(name, (lo, hi), step)
                .map(|g| g.ctrs().to_vec())
                .map_err(|e| EngineError {
                    reason: e.to_string(),
                })
        };
        let half = request.width / 2.0;
        let (cx, cy) = request.center;
        let z = request.data.z();
        let mean = z.iter().sum::<f64>() / z.len() as f64;
        let rms = (z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / z.len() as f64).sqrt();

        let mut out = FitOutput {
            data: request.data.clone(),
            e_rms: request.e_rms.clone(),
            ..Default::default()
        };
        let x0 = axis("x", cx - half, cx + half, request.spacing.z0)?;
        let y0 = axis("y", cy - half, cy + half, request.spacing.z0)?;
        out.grids.insert("z0".into(), SolvedGrid::filled(x0, y0, None, mean));
        let x = axis("x", cx - half, cx + half, request.spacing.dz)?;
        let y = axis("y", cy - half, cy + half, request.spacing.dz)?;
        let t = axis("t", request.t_span.0, request.t_span.1, request.spacing.dt)?;
        out.grids.insert("dz".into(), SolvedGrid::filled(x, y, Some(t), 0.0));
        out.rms.insert("data".into(), rms);
        Ok(out)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== altifit Lagrangian fit example ===\n");

    let mut config = FitConfig::new(REFERENCE_CENTER);
    config.width = REFERENCE_WIDTH;
    config.lagrangian = Some(LagrangianConfig {
        epoch: 2015.0,
        ..Default::default()
    });

    // Two seeded batches over the tile.
    let wide = ObservationSet::concat([
        reference_observations(1, 20_000),
        reference_observations(2, 20_000),
    ]);
    let readers: Vec<Box<dyn SensorReader>> = vec![Box::new(Preloaded(wide))];

    let pipeline = FitPipeline::new(config).unwrap();
    let product = pipeline
        .run(&readers, &MeanEngine, Some(reference_velocity()))
        .unwrap();

    if let Some(summary) = &product.lagrangian {
        println!("scheme:            {}", summary.scheme);
        println!("unresolved nodes:  {}", summary.unresolved_nodes);
        println!(
            "grid bounds:       x {:.0}..{:.0}, y {:.0}..{:.0}",
            summary.grid_bounds.x.0, summary.grid_bounds.x.1, summary.grid_bounds.y.0, summary.grid_bounds.y.1
        );
        println!(
            "data pass:         {} in, {} retained, {} left the domain",
            summary.data.input, summary.data.retained, summary.data.domain_exits
        );
    }
    for stage in &product.fusion.stages {
        println!("stage {:<14} {:>7} -> {:>7}", stage.stage, stage.before, stage.after);
    }

    let layout = ResultLayout::from_product(&product);
    let dz = layout.group("/dz").unwrap();
    println!("\n/dz datasets: {:?}", dz.datasets.keys().collect::<Vec<_>>());
    println!("/meta/sensors: {:?}", layout.sensors().iter().collect::<Vec<_>>());
}
