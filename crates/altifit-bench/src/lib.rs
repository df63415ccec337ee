//! Benchmark profiles for the altifit workspace.
//!
//! Provides pre-built frames and data sets shared by the benches and the
//! example:
//!
//! - [`reference_geometry`]: 40 km tile, 500 m / half-year output grid
//! - [`shear_flow`]: a smooth, time-varying synthetic velocity field
//! - [`reference_frame`]: the geometry loaded with the shear flow
//! - [`reference_observations`]: seeded laser and DEM-like observations

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use altifit_advect::{FrameGeometry, FrameGrids, LagrangianConfig, LagrangianError, LagrangianFrame};
use altifit_core::ObservationSet;
use altifit_grid::Extent;
use altifit_test_utils::{ObservationGenerator, SensorTrack, SyntheticVelocity};
use altifit_velocity::VelocityIngest;

/// Tile centre of the reference profile (Antarctic polar stereographic).
pub const REFERENCE_CENTER: (f64, f64) = (-1_550_000.0, -450_000.0);

/// Tile width of the reference profile.
pub const REFERENCE_WIDTH: f64 = 40_000.0;

/// 40 km tile, 500 m nodes, half-year epochs 2003 to 2020: 81 x 81 x 35.
pub fn reference_geometry() -> FrameGeometry {
    FrameGeometry {
        center: REFERENCE_CENTER,
        width: REFERENCE_WIDTH,
        t_span: (2003.0, 2020.0),
        dz: 500.0,
        dt: 0.5,
    }
}

/// Flow along x speeding up with y and accelerating over time.
///
/// Speeds stay below 500 m/yr so parcels remain inside a one-width buffer
/// over the full time span.
pub fn shear_flow(extent: Extent, spacing: f64) -> SyntheticVelocity {
    let y_mid = 0.5 * (extent.y.0 + extent.y.1);
    let half = 0.5 * extent.height();
    let epochs: Vec<f64> = (0..=6).map(|i| 1995.0 + 5.0 * f64::from(i)).collect();
    SyntheticVelocity::new(extent, spacing, epochs, move |_x, y, t| {
        let shear = (y - y_mid) / half;
        let u = 200.0 + 150.0 * shear + 2.0 * (t - 2000.0);
        let v = -30.0 * shear;
        (u, v)
    })
    .with_name("shear")
}

/// Velocity ingest covering the reference tile plus its buffer.
pub fn reference_velocity() -> VelocityIngest {
    let extent = Extent::centered(REFERENCE_CENTER, 4.0 * REFERENCE_WIDTH);
    VelocityIngest::SingleGrid(Box::new(shear_flow(extent, 1000.0)))
}

/// The reference geometry with the shear flow loaded.
pub fn reference_frame(config: &LagrangianConfig) -> Result<LagrangianFrame, LagrangianError> {
    let grids = FrameGrids::from_config(&reference_geometry())?;
    LagrangianFrame::load(grids, reference_velocity(), config)
}

/// Seeded ICESat-2-like and airborne observations over the reference tile.
pub fn reference_observations(seed: u64, count: usize) -> ObservationSet {
    let extent = Extent::centered(REFERENCE_CENTER, REFERENCE_WIDTH);
    let mut generator = ObservationGenerator::new(seed, extent).with_surface(1500.0, -0.8, 2010.0);
    let orbital = generator.generate(&SensorTrack::new(2, count * 3 / 4, (2018.5, 2020.0)).with_slope(0.02));
    let airborne = generator.generate(&SensorTrack::new(3, count - count * 3 / 4, (2009.0, 2018.0)));
    ObservationSet::concat([orbital, airborne])
}
