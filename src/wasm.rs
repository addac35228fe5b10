//! WebAssembly exports for TileWand selection.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! ## Input
//!
//! Images arrive as flat straight-alpha RGBA bytes (length =
//! width * height * 4) and are split into tiles of `DEFAULT_TILE_SIZE`.
//!
//! ## Output Format
//!
//! Contours use the flat layout shared with the canvas code on the JS side:
//! `[num_contours, len1, x1, y1, x2, y2, ..., len2, ...]`

use ndarray::Array3;
use wasm_bindgen::prelude::*;

use crate::config::{WandConfig, DEFAULT_TILE_SIZE};
use crate::error::WandError;
use crate::selection::magic_wand::{magic_wand_select_image, MagicWandResult};

fn to_js_err(err: WandError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn select(
    data: &[u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    tolerance: f64,
) -> Result<MagicWandResult, JsValue> {
    let input = Array3::from_shape_vec((height, width, 4), data.to_vec()).map_err(|_| {
        to_js_err(WandError::ShapeMismatch {
            expected: vec![height, width, 4],
            actual: vec![data.len()],
        })
    })?;
    let config = WandConfig::new(tolerance, DEFAULT_TILE_SIZE).map_err(to_js_err)?;
    magic_wand_select_image(input.view(), x, y, &config).map_err(to_js_err)
}

// ============================================================================
// Magic Wand
// ============================================================================

/// Magic wand selection returning the outline in flat contour format.
///
/// # Arguments
/// * `data` - Flat array of RGBA bytes
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `x`, `y` - Seed pixel
/// * `tolerance` - Color tolerance (0.0-1.0)
///
/// # Returns
/// `[num_contours, len1, x1, y1, ...]`, filled with the even-odd rule
#[wasm_bindgen]
pub fn magic_wand_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    tolerance: f64,
) -> Result<Vec<f32>, JsValue> {
    let result = select(data, width, height, x, y, tolerance)?;
    Ok(result.path.to_flat())
}

/// Magic wand selection rasterized to a mask (255 = selected, 0 = not).
///
/// # Returns
/// Flat array of width * height bytes
#[wasm_bindgen]
pub fn magic_wand_mask_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    tolerance: f64,
) -> Result<Vec<u8>, JsValue> {
    let result = select(data, width, height, x, y, tolerance)?;
    Ok(result.path.to_mask(width, height))
}

/// Outline as an SVG path string.
#[wasm_bindgen]
pub fn magic_wand_svg_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    tolerance: f64,
) -> Result<String, JsValue> {
    let result = select(data, width, height, x, y, tolerance)?;
    Ok(result.path.to_svg_path())
}
