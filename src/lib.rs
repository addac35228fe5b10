//! TileWand Rust Extensions
//!
//! Magic wand selection on tiled canvases, with Python bindings via PyO3
//! and WASM bindings for JavaScript.
//!
//! ## Canvas Format
//! Canvases are split into square tiles (power-of-two edge length) holding
//! premultiplied RGBA pixels:
//! - `u8`: 8-bit per channel (0-255)
//! - `f32`: Float per channel (0.0-1.0)
//!
//! Fully transparent tiles are not stored. A fill visits only the tiles its
//! region touches and crosses empty tiles in one step.
//!
//! ## Output
//! The selection is returned as a vector outline: closed axis-aligned
//! polygons on the pixel-corner lattice, one vertex per corner, to be
//! filled with the even-odd rule (holes are separate sub-paths).
//!
//! Flat images handed in through the bindings use straight alpha with
//! (height, width, channels) layout, 1, 3 or 4 channels.

pub mod config;
pub mod error;
pub mod geometry;
pub mod selection;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::WandConfig;
pub use error::{Result, WandError};
pub use geometry::{Direction, RectI, VecI};
pub use selection::{
    magic_wand_flood_fill, magic_wand_select, magic_wand_select_cancellable, CancellationToken,
    MagicWandResult, VectorPath,
};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use ndarray::Array2;
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::config::WandConfig;
    use crate::error::WandError;
    use crate::selection::magic_wand::{magic_wand_select_image, MagicWandResult};

    fn to_py_err(err: WandError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    fn select<'py>(
        image: &PyReadonlyArray3<'py, u8>,
        x: i32,
        y: i32,
        tolerance: f64,
        tile_size: usize,
    ) -> PyResult<(MagicWandResult, usize, usize)> {
        let view = image.as_array();
        let (height, width, _) = view.dim();
        let config = WandConfig::new(tolerance, tile_size).map_err(to_py_err)?;
        let result = magic_wand_select_image(view, x, y, &config).map_err(to_py_err)?;
        Ok((result, width, height))
    }

    // ========================================================================
    // Magic Wand
    // ========================================================================

    /// Magic wand selection returning the outline polygons.
    ///
    /// # Arguments
    /// * `image` - Input image (1, 3, or 4 channels, straight alpha)
    /// * `x`, `y` - Seed pixel
    /// * `tolerance` - Color tolerance (0.0-1.0)
    /// * `tile_size` - Tile edge length used internally (power of two)
    ///
    /// # Returns
    /// Tuple of (list of polygons as lists of (x, y) corners, pixel count).
    /// Fill with the even-odd rule.
    #[pyfunction]
    #[pyo3(signature = (image, x, y, tolerance=0.0, tile_size=64))]
    pub fn magic_wand_contours<'py>(
        image: PyReadonlyArray3<'py, u8>,
        x: i32,
        y: i32,
        tolerance: f64,
        tile_size: usize,
    ) -> PyResult<(Vec<Vec<(i32, i32)>>, u64)> {
        let (result, _, _) = select(&image, x, y, tolerance, tile_size)?;
        let polygons = result
            .path
            .subpaths()
            .into_iter()
            .map(|polygon| polygon.into_iter().map(|p| (p.x, p.y)).collect())
            .collect();
        Ok((polygons, result.pixel_count))
    }

    /// Magic wand selection rasterized to a mask (255 = selected).
    #[pyfunction]
    #[pyo3(signature = (image, x, y, tolerance=0.0, tile_size=64))]
    pub fn magic_wand_mask<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        x: i32,
        y: i32,
        tolerance: f64,
        tile_size: usize,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        let (result, width, height) = select(&image, x, y, tolerance, tile_size)?;
        let mask = Array2::from_shape_vec((height, width), result.path.to_mask(width, height))
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(mask.into_pyarray(py))
    }

    /// Outline as an SVG path string ("M x,y L x,y ... Z").
    #[pyfunction]
    #[pyo3(signature = (image, x, y, tolerance=0.0, tile_size=64))]
    pub fn magic_wand_svg_path<'py>(
        image: PyReadonlyArray3<'py, u8>,
        x: i32,
        y: i32,
        tolerance: f64,
        tile_size: usize,
    ) -> PyResult<String> {
        let (result, _, _) = select(&image, x, y, tolerance, tile_size)?;
        Ok(result.path.to_svg_path())
    }

    /// TileWand Rust extension module
    #[pymodule]
    pub fn tilewand_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // Magic wand
        m.add_function(wrap_pyfunction!(magic_wand_contours, m)?)?;
        m.add_function(wrap_pyfunction!(magic_wand_mask, m)?)?;
        m.add_function(wrap_pyfunction!(magic_wand_svg_path, m)?)?;

        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::tilewand_rust;
