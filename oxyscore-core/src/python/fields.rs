use crate::calendar::Calendar;
use crate::grid::{ConcentrationField, DepthAxis, FluxField, HorizontalGrid, TimeAxis};
use crate::provider::InMemoryProvider;
use crate::timeseries::FloatValue;
use numpy::{PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArray3, PyReadonlyArray4};
use pyo3::prelude::*;
use std::str::FromStr;

/// In-memory model output, keyed by model id.
///
/// Arrays are copied on insertion.
#[pyclass]
#[pyo3(name = "FieldStore")]
#[derive(Debug, Clone, Default)]
pub struct PyFieldStore(pub InMemoryProvider);

#[pymethods]
impl PyFieldStore {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Add dissolved oxygen on ``(time, depth, lat, lon)``.
    ///
    /// ``depth_bounds`` has shape ``(levels, 2)``.
    #[pyo3(signature = (
        model, data, time, time_units, depth, depth_bounds, lat, lon,
        calendar="standard", units="mol m-3", fill_value=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn add_concentration(
        &mut self,
        model: &str,
        data: PyReadonlyArray4<'_, FloatValue>,
        time: PyReadonlyArray1<'_, FloatValue>,
        time_units: &str,
        depth: PyReadonlyArray1<'_, FloatValue>,
        depth_bounds: PyReadonlyArray2<'_, FloatValue>,
        lat: PyReadonlyArray1<'_, FloatValue>,
        lon: PyReadonlyArray1<'_, FloatValue>,
        calendar: &str,
        units: &str,
        fill_value: Option<FloatValue>,
    ) -> PyResult<()> {
        let field = ConcentrationField::new(
            units,
            TimeAxis::new(time.as_array().to_owned(), time_units, Calendar::from_str(calendar)?),
            DepthAxis::new("m", depth.as_array().to_owned(), depth_bounds.as_array().to_owned())?,
            HorizontalGrid::new(lat.as_array().to_owned(), lon.as_array().to_owned()),
            data.as_array().to_owned(),
            fill_value,
        )?;
        self.0.insert_concentration(model, field);
        Ok(())
    }

    /// Add air-sea flux on ``(time, lat, lon)``
    #[pyo3(signature = (
        model, data, time, time_units, lat, lon,
        calendar="standard", units="mol m-2 s-1", fill_value=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn add_flux(
        &mut self,
        model: &str,
        data: PyReadonlyArray3<'_, FloatValue>,
        time: PyReadonlyArray1<'_, FloatValue>,
        time_units: &str,
        lat: PyReadonlyArray1<'_, FloatValue>,
        lon: PyReadonlyArray1<'_, FloatValue>,
        calendar: &str,
        units: &str,
        fill_value: Option<FloatValue>,
    ) -> PyResult<()> {
        let field = FluxField::new(
            units,
            TimeAxis::new(time.as_array().to_owned(), time_units, Calendar::from_str(calendar)?),
            HorizontalGrid::new(lat.as_array().to_owned(), lon.as_array().to_owned()),
            data.as_array().to_owned(),
            fill_value,
        )?;
        self.0.insert_flux(model, field);
        Ok(())
    }

    fn model_ids(&self) -> Vec<String> {
        self.0.model_ids()
    }
}
