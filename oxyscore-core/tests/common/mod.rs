//! Synthetic model output and observations shared by the integration tests.
//!
//! Every synthetic model uses a 3 x 3 grid around the Labrador Sea site, five
//! depth levels (three above 2200 m) and monthly `noleap` time steps between
//! 1990 and 2009. Within a year the concentration is constant, so annual means
//! reproduce it exactly.
#![allow(dead_code)]

use chrono::NaiveDate;
use ndarray::{Array1, Array3, Array4};
use oxyscore_core::calendar::Calendar;
use oxyscore_core::config::MOL_M3_TO_UMOL_KG;
use oxyscore_core::grid::{ConcentrationField, DepthAxis, FluxField, HorizontalGrid, TimeAxis};
use oxyscore_core::profile::DepthProfile;
use oxyscore_core::reference::{GasExchangeObservations, ReferenceDataset};
use oxyscore_core::timeseries::Timeseries;

pub const FIRST_YEAR: i32 = 1990;
pub const LAST_YEAR: i32 = 2009;
pub const DEPTH_EDGES: [f64; 6] = [0.0, 500.0, 1000.0, 2000.0, 3000.0, 4000.0];
pub const LITERATURE_FLUX: f64 = 20.0;
pub const FILL_VALUE: f64 = -999.0;

const NOLEAP_MONTH_START: [f64; 12] = [
    0.0, 31.0, 59.0, 90.0, 120.0, 151.0, 181.0, 212.0, 243.0, 273.0, 304.0, 334.0,
];

pub fn years() -> std::ops::RangeInclusive<i32> {
    FIRST_YEAR..=LAST_YEAR
}

/// Mid-month day offsets of a `noleap` calendar counted from 1 January `origin_year`
pub fn monthly_days(origin_year: i32) -> Array1<f64> {
    years()
        .flat_map(|year| {
            NOLEAP_MONTH_START
                .iter()
                .map(move |start| (year - origin_year) as f64 * 365.0 + start + 14.5)
        })
        .collect()
}

pub fn depth_axis() -> DepthAxis {
    DepthAxis::from_edges("m", &DEPTH_EDGES).unwrap()
}

/// Grid whose middle cell contains the default site
pub fn positive_grid() -> HorizontalGrid {
    HorizontalGrid::new(
        Array1::from(vec![55.5, 56.5, 57.5]),
        Array1::from(vec![306.5, 307.5, 308.5]),
    )
}

pub fn signed_grid() -> HorizontalGrid {
    HorizontalGrid::new(
        Array1::from(vec![55.5, 56.5, 57.5]),
        Array1::from(vec![-53.5, -52.5, -51.5]),
    )
}

/// Grid far away from the site
pub fn tropical_grid() -> HorizontalGrid {
    HorizontalGrid::new(
        Array1::from(vec![-1.0, 0.0, 1.0]),
        Array1::from(vec![-1.0, 0.0, 1.0]),
    )
}

/// Time-mean concentration of a level (mol m-3)
pub fn base_concentration(depth: f64) -> f64 {
    0.31 - depth * 1.0e-5
}

fn raw_upper_signal(year: i32) -> f64 {
    let i = (year - FIRST_YEAR) as f64;
    0.01 * (i * 0.8).sin() - 0.0004 * i
}

fn raw_lower_signal(year: i32) -> f64 {
    let i = (year - FIRST_YEAR) as f64;
    0.003 * (i * 1.1).cos()
}

fn remove_mean(signal: fn(i32) -> f64, year: i32) -> f64 {
    let mean = years().map(signal).sum::<f64>() / years().count() as f64;
    signal(year) - mean
}

/// Zero-mean interannual upper-layer signal (mol m-3)
pub fn upper_signal(year: i32) -> f64 {
    remove_mean(raw_upper_signal, year)
}

/// Zero-mean interannual lower-layer signal (mol m-3)
pub fn lower_signal(year: i32) -> f64 {
    remove_mean(raw_lower_signal, year)
}

/// How a synthetic model departs from the observations
#[derive(Debug, Clone, Copy)]
pub struct Distortion {
    pub upper_scale: f64,
    pub lower_scale: f64,
    /// Added to every level (mol m-3)
    pub profile_offset: f64,
    pub annual_flux: f64,
}

impl Distortion {
    pub const EXACT: Distortion = Distortion {
        upper_scale: 1.0,
        lower_scale: 1.0,
        profile_offset: 0.0,
        annual_flux: LITERATURE_FLUX,
    };

    pub const BIASED: Distortion = Distortion {
        upper_scale: 0.5,
        lower_scale: 2.0,
        profile_offset: 0.008,
        annual_flux: 30.0,
    };

    pub fn concentration(&self, depth: f64, year: i32) -> f64 {
        let signal = if depth < 2200.0 {
            self.upper_scale * upper_signal(year)
        } else {
            self.lower_scale * lower_signal(year)
        };
        base_concentration(depth) + self.profile_offset + signal
    }
}

pub struct FieldBuilder {
    pub distortion: Distortion,
    pub grid: HorizontalGrid,
    /// Origin year the time values are counted from
    pub origin_year: i32,
    /// Units written into the field metadata
    pub time_units: String,
    /// Years whose upper levels are written as fill values at the site
    pub missing_upper_years: Vec<i32>,
}

impl FieldBuilder {
    pub fn new(distortion: Distortion) -> Self {
        Self {
            distortion,
            grid: positive_grid(),
            origin_year: 1850,
            time_units: "days since 1850-01-01".to_string(),
            missing_upper_years: vec![],
        }
    }

    pub fn on_grid(mut self, grid: HorizontalGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_time_origin(mut self, origin_year: i32, units: &str) -> Self {
        self.origin_year = origin_year;
        self.time_units = units.to_string();
        self
    }

    pub fn missing_upper_year(mut self, year: i32) -> Self {
        self.missing_upper_years.push(year);
        self
    }

    fn time_axis(&self) -> TimeAxis {
        TimeAxis::new(monthly_days(self.origin_year), &self.time_units, Calendar::NoLeap)
    }

    pub fn concentration(&self) -> ConcentrationField {
        let depth = depth_axis();
        let month_years: Vec<i32> = years().flat_map(|y| std::iter::repeat(y).take(12)).collect();
        let (ny, nx) = (self.grid.lat.len(), self.grid.lon.len());

        let data = Array4::from_shape_fn((month_years.len(), depth.len(), ny, nx), |(t, z, j, i)| {
            let year = month_years[t];
            let centre = depth.centres[z];
            if (j, i) != (1, 1) {
                // Neighbouring cells hold a very different ocean
                return 0.05;
            }
            if centre < 2200.0 && self.missing_upper_years.contains(&year) {
                return FILL_VALUE;
            }
            self.distortion.concentration(centre, year)
        });

        ConcentrationField::new(
            "mol m-3",
            self.time_axis(),
            depth,
            self.grid.clone(),
            data,
            Some(FILL_VALUE),
        )
        .unwrap()
    }

    pub fn flux(&self) -> FluxField {
        let nt = monthly_days(self.origin_year).len();
        let (ny, nx) = (self.grid.lat.len(), self.grid.lon.len());
        let rate = self.distortion.annual_flux / (365.0 * 86_400.0);
        let data = Array3::from_shape_fn((nt, ny, nx), |(_, j, i)| {
            if (j, i) == (1, 1) {
                rate
            } else {
                0.0
            }
        });
        FluxField::new("mol m-2 s-1", self.time_axis(), self.grid.clone(), data, None).unwrap()
    }
}

fn observation_time(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 7, 1).unwrap()
}

/// Inventory of a layer of an undistorted column (mol m-2)
pub fn observed_inventory(year: i32, upper: bool) -> f64 {
    let depth = depth_axis();
    depth
        .centres
        .iter()
        .zip(depth.thicknesses().iter())
        .filter(|(centre, _)| (**centre < 2200.0) == upper)
        .map(|(centre, dz)| Distortion::EXACT.concentration(*centre, year) * dz)
        .sum()
}

/// Observations an undistorted model reproduces
pub fn reference() -> ReferenceDataset {
    let series = |upper: bool| {
        Timeseries::from_pairs(years().map(|y| (observation_time(y), observed_inventory(y, upper))))
            .unwrap()
    };

    let depth = depth_axis();
    let count = years().count() as f64;
    let profile = DepthProfile::from_pairs(depth.centres.iter().map(|centre| {
        let mean = years()
            .map(|y| Distortion::EXACT.concentration(*centre, y))
            .sum::<f64>()
            / count;
        (*centre, mean * MOL_M3_TO_UMOL_KG)
    }))
    .unwrap();

    ReferenceDataset::new(
        series(true),
        series(false),
        profile,
        GasExchangeObservations {
            observed_mean: Some(18.5),
            literature_mean: LITERATURE_FLUX,
            literature_std: 5.2,
        },
    )
    .unwrap()
}

/// The reference in its TOML form
pub fn reference_toml() -> String {
    let reference = reference();
    let mut text = String::new();
    for (table, series) in [
        ("upper_layer", reference.upper_layer()),
        ("lower_layer", reference.lower_layer()),
    ] {
        for (time, value) in series.iter() {
            text.push_str(&format!("[[{table}]]\ntime = \"{time}\"\nvalue = {value:e}\n"));
        }
    }
    for (depth, value) in reference
        .profile()
        .depths()
        .iter()
        .zip(reference.profile().values().iter())
    {
        text.push_str(&format!("[[profile]]\ndepth = {depth:e}\nvalue = {value:e}\n"));
    }
    text.push_str(&format!(
        "[gas_exchange]\nobserved_mean = 18.5\nliterature_mean = {LITERATURE_FLUX:e}\nliterature_std = 5.2\n"
    ));
    text
}
