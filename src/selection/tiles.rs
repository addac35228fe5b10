//! Tile storage and the tile source contract consumed by the flood filler.
//!
//! A canvas is split into square tiles whose edge length is a power of two.
//! Tiles are either populated (own a premultiplied RGBA buffer) or empty,
//! meaning uniformly transparent. Empty tiles cost nothing to store and let
//! the flood filler cross large transparent areas in one step.
//!
//! ## Buffer Formats
//!
//! | Variant | Type | Range |
//! |---------|------|-------|
//! | `PixelData::U8` | u8 | 0-255 |
//! | `PixelData::F32` | f32 | 0.0-1.0 |
//!
//! Buffers are row-major, 4 premultiplied channels per pixel.

use std::sync::Arc;

use ndarray::ArrayView3;
use rayon::prelude::*;

use crate::config::validate_tile_size;
use crate::error::{Result, WandError};
use crate::geometry::{RectI, VecI};
use crate::selection::color_bounds::{Channel, ColorBounds, ColorF};

/// Raw channel storage of one tile.
#[derive(Clone, Debug, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

/// Pixels of one populated tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileBuffer {
    size: usize,
    data: PixelData,
}

impl TileBuffer {
    /// Transparent 8-bit tile.
    pub fn new_u8(size: usize) -> Self {
        Self {
            size,
            data: PixelData::U8(vec![0; size * size * 4]),
        }
    }

    /// Transparent float tile.
    pub fn new_f32(size: usize) -> Self {
        Self {
            size,
            data: PixelData::F32(vec![0.0; size * size * 4]),
        }
    }

    /// Wrap raw premultiplied channels; `data` must hold `size * size * 4` values.
    pub fn from_data(size: usize, data: PixelData) -> Result<Self> {
        let len = match &data {
            PixelData::U8(v) => v.len(),
            PixelData::F32(v) => v.len(),
        };
        if len != size * size * 4 {
            return Err(WandError::ShapeMismatch {
                expected: vec![size * size * 4],
                actual: vec![len],
            });
        }
        Ok(Self { size, data })
    }

    /// Caller guarantees `data` holds `size * size * 4` channels.
    pub(crate) fn from_parts(size: usize, data: PixelData) -> Self {
        Self { size, data }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    pub fn is_f32(&self) -> bool {
        matches!(self.data, PixelData::F32(_))
    }

    #[inline]
    fn offset(&self, local: VecI) -> usize {
        local.y as usize * self.size + local.x as usize
    }

    /// Decoded color at a local position.
    pub fn pixel(&self, local: VecI) -> ColorF {
        let start = self.offset(local) * 4;
        match &self.data {
            PixelData::U8(v) => ColorF::from_channels(&v[start..start + 4]),
            PixelData::F32(v) => ColorF::from_channels(&v[start..start + 4]),
        }
    }

    pub fn set_pixel(&mut self, local: VecI, color: ColorF) {
        let start = self.offset(local) * 4;
        let channels = [color.r, color.g, color.b, color.a];
        match &mut self.data {
            PixelData::U8(v) => {
                for (dst, src) in v[start..start + 4].iter_mut().zip(channels) {
                    *dst = (src.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
            PixelData::F32(v) => v[start..start + 4].copy_from_slice(&channels),
        }
    }

    /// Bound test on the pixel at `offset` (row-major pixel index), in the
    /// buffer's own channel representation.
    #[inline]
    pub fn matches(&self, bounds: &ColorBounds, offset: usize) -> bool {
        match &self.data {
            PixelData::U8(v) => bounds.is_match_at(v, offset),
            PixelData::F32(v) => bounds.is_match_at(v, offset),
        }
    }

    /// True when every alpha channel is zero.
    pub fn is_fully_transparent(&self) -> bool {
        match &self.data {
            PixelData::U8(v) => v.chunks_exact(4).all(|p| p[3] == 0),
            PixelData::F32(v) => v.chunks_exact(4).all(|p| p[3] == 0.0),
        }
    }
}

/// A tile as handed out by a [`TileSource`].
#[derive(Clone, Debug)]
pub enum Tile {
    Populated(Arc<TileBuffer>),
    /// Uniformly transparent.
    Empty,
}

impl Tile {
    pub fn is_empty(&self) -> bool {
        matches!(self, Tile::Empty)
    }

    /// Decoded color at a local position, transparent for empty tiles.
    pub fn pixel(&self, local: VecI) -> ColorF {
        match self {
            Tile::Populated(buffer) => buffer.pixel(local),
            Tile::Empty => ColorF::TRANSPARENT,
        }
    }
}

/// Supplies tiles by tile coordinate.
///
/// Implementations must return the same data for the whole duration of one
/// flood fill. Coordinates outside the document yield [`Tile::Empty`].
pub trait TileSource {
    /// Tile edge length. Fills reject sources whose size fails
    /// [`validate_tile_size`].
    fn tile_size(&self) -> usize;

    /// Document size in pixels.
    fn size(&self) -> VecI;

    fn tile(&self, coord: VecI) -> Tile;
}

/// Sparse in-memory tiled image.
///
/// Tiles live in a flat `Vec` indexed by `row * tiles_per_row + column`;
/// `None` entries are empty tiles. Populated tiles are shared through `Arc`
/// so handing one to a fill never copies pixels.
#[derive(Clone, Debug)]
pub struct TiledCanvas {
    size: VecI,
    tile_size: usize,
    grid: VecI,
    tiles: Vec<Option<Arc<TileBuffer>>>,
}

impl TiledCanvas {
    /// Fully transparent canvas.
    pub fn new(width: usize, height: usize, tile_size: usize) -> Result<Self> {
        validate_tile_size(tile_size)?;
        let grid = VecI::new(
            width.div_ceil(tile_size) as i32,
            height.div_ceil(tile_size) as i32,
        );
        Ok(Self {
            size: VecI::new(width as i32, height as i32),
            tile_size,
            grid,
            tiles: vec![None; (grid.x * grid.y) as usize],
        })
    }

    /// Split a straight-alpha 8-bit image (H, W, C) into premultiplied tiles.
    ///
    /// Grayscale (C=1) and RGB (C=3) inputs are treated as opaque.
    /// Fully transparent tiles are stored as empty. Parallelized with Rayon.
    pub fn from_rgba_u8(image: ArrayView3<u8>, tile_size: usize) -> Result<Self> {
        let (height, width, channels) = image.dim();
        check_channels(channels, image.shape())?;
        let mut canvas = Self::new(width, height, tile_size)?;
        let grid = canvas.grid;

        let tiles = (0..(grid.x * grid.y) as usize)
            .into_par_iter()
            .map(|index| {
                let rect = canvas.tile_rect_at(index);
                let mut buffer = vec![0u8; tile_size * tile_size * 4];
                let mut any_visible = false;
                for y in rect.top..rect.bottom {
                    for x in rect.left..rect.right {
                        let (y, x) = (y as usize, x as usize);
                        let rgba = straight_u8(&image, y, x, channels);
                        let a = rgba[3] as u16;
                        if a == 0 {
                            continue;
                        }
                        any_visible = true;
                        let local = (y - rect.top as usize) * tile_size + (x - rect.left as usize);
                        let dst = &mut buffer[local * 4..local * 4 + 4];
                        for c in 0..3 {
                            dst[c] = ((rgba[c] as u16 * a) / 255) as u8;
                        }
                        dst[3] = rgba[3];
                    }
                }
                any_visible.then(|| {
                    Arc::new(TileBuffer {
                        size: tile_size,
                        data: PixelData::U8(buffer),
                    })
                })
            })
            .collect();

        canvas.tiles = tiles;
        Ok(canvas)
    }

    /// Split a straight-alpha float image (H, W, C), values 0.0-1.0, into
    /// premultiplied float tiles. Parallelized with Rayon.
    pub fn from_rgba_f32(image: ArrayView3<f32>, tile_size: usize) -> Result<Self> {
        let (height, width, channels) = image.dim();
        check_channels(channels, image.shape())?;
        let mut canvas = Self::new(width, height, tile_size)?;
        let grid = canvas.grid;

        let tiles = (0..(grid.x * grid.y) as usize)
            .into_par_iter()
            .map(|index| {
                let rect = canvas.tile_rect_at(index);
                let mut buffer = vec![0.0f32; tile_size * tile_size * 4];
                let mut any_visible = false;
                for y in rect.top..rect.bottom {
                    for x in rect.left..rect.right {
                        let (y, x) = (y as usize, x as usize);
                        let rgba = straight_f32(&image, y, x, channels);
                        if rgba[3] <= 0.0 {
                            continue;
                        }
                        any_visible = true;
                        let local = (y - rect.top as usize) * tile_size + (x - rect.left as usize);
                        let dst = &mut buffer[local * 4..local * 4 + 4];
                        for c in 0..3 {
                            dst[c] = rgba[c] * rgba[3];
                        }
                        dst[3] = rgba[3];
                    }
                }
                any_visible.then(|| {
                    Arc::new(TileBuffer {
                        size: tile_size,
                        data: PixelData::F32(buffer),
                    })
                })
            })
            .collect();

        canvas.tiles = tiles;
        Ok(canvas)
    }

    pub fn size(&self) -> VecI {
        self.size
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Number of tiles along each axis.
    pub fn grid(&self) -> VecI {
        self.grid
    }

    pub fn populated_tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_some()).count()
    }

    fn index(&self, coord: VecI) -> Option<usize> {
        coord
            .is_inside(self.grid)
            .then(|| (coord.y * self.grid.x + coord.x) as usize)
    }

    /// Document-clipped pixel rectangle of the tile at flat `index`.
    fn tile_rect_at(&self, index: usize) -> RectI {
        let ts = self.tile_size as i32;
        let coord = VecI::new(index as i32 % self.grid.x, index as i32 / self.grid.x);
        RectI::new(coord * ts, VecI::new(ts, ts)).intersect(&RectI::new(VecI::ZERO, self.size))
    }

    /// Replace a whole tile. `None` or a fully transparent buffer makes it empty.
    pub fn set_tile(&mut self, coord: VecI, buffer: Option<TileBuffer>) -> Result<()> {
        let Some(index) = self.index(coord) else {
            return Ok(());
        };
        self.tiles[index] = match buffer {
            Some(buffer) if buffer.size != self.tile_size => {
                return Err(WandError::ShapeMismatch {
                    expected: vec![self.tile_size, self.tile_size],
                    actual: vec![buffer.size, buffer.size],
                });
            }
            Some(buffer) if !buffer.is_fully_transparent() => Some(Arc::new(buffer)),
            _ => None,
        };
        Ok(())
    }

    /// Write one premultiplied pixel, allocating an 8-bit tile on demand.
    /// Returns false when `pos` lies outside the canvas.
    pub fn set_pixel(&mut self, pos: VecI, color: ColorF) -> bool {
        if !pos.is_inside(self.size) {
            return false;
        }
        let ts = self.tile_size as i32;
        let coord = VecI::tile_of(pos, ts);
        let Some(index) = self.index(coord) else {
            return false;
        };
        let local = pos - coord * ts;
        let slot = &mut self.tiles[index];
        if let Some(tile) = slot.as_mut() {
            Arc::make_mut(tile).set_pixel(local, color);
        } else if !color.is_transparent() {
            let mut buffer = TileBuffer::new_u8(self.tile_size);
            buffer.set_pixel(local, color);
            *slot = Some(Arc::new(buffer));
        }
        true
    }

    /// Fill a rectangle with one color (clipped to the canvas).
    pub fn fill_rect(&mut self, rect: RectI, color: ColorF) {
        let rect = rect.intersect(&RectI::new(VecI::ZERO, self.size));
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                self.set_pixel(VecI::new(x, y), color);
            }
        }
    }

    /// Decoded color at a document position, transparent outside.
    pub fn get_pixel(&self, pos: VecI) -> ColorF {
        if !pos.is_inside(self.size) {
            return ColorF::TRANSPARENT;
        }
        let ts = self.tile_size as i32;
        let coord = VecI::tile_of(pos, ts);
        self.tile(coord).pixel(pos - coord * ts)
    }
}

impl TileSource for TiledCanvas {
    fn tile_size(&self) -> usize {
        self.tile_size
    }

    fn size(&self) -> VecI {
        self.size
    }

    fn tile(&self, coord: VecI) -> Tile {
        match self.index(coord).and_then(|i| self.tiles[i].clone()) {
            Some(buffer) => Tile::Populated(buffer),
            None => Tile::Empty,
        }
    }
}

fn check_channels(channels: usize, shape: &[usize]) -> Result<()> {
    if matches!(channels, 1 | 3 | 4) {
        Ok(())
    } else {
        Err(WandError::ShapeMismatch {
            expected: vec![shape[0], shape[1], 4],
            actual: shape.to_vec(),
        })
    }
}

#[inline]
fn straight_u8(image: &ArrayView3<u8>, y: usize, x: usize, channels: usize) -> [u8; 4] {
    match channels {
        1 => {
            let v = image[[y, x, 0]];
            [v, v, v, 255]
        }
        3 => [image[[y, x, 0]], image[[y, x, 1]], image[[y, x, 2]], 255],
        _ => [image[[y, x, 0]], image[[y, x, 1]], image[[y, x, 2]], image[[y, x, 3]]],
    }
}

#[inline]
fn straight_f32(image: &ArrayView3<f32>, y: usize, x: usize, channels: usize) -> [f32; 4] {
    match channels {
        1 => {
            let v = image[[y, x, 0]];
            [v, v, v, 1.0]
        }
        3 => [image[[y, x, 0]], image[[y, x, 1]], image[[y, x, 2]], 1.0],
        _ => [image[[y, x, 0]], image[[y, x, 1]], image[[y, x, 2]], image[[y, x, 3]]],
    }
}

/// Read channels of any representation as floats; used when compositing
/// mixed-precision layers.
pub(crate) fn channels_as_f32<C: Channel>(data: &[C]) -> Vec<f32> {
    data.iter().map(|c| c.to_unit()).collect()
}
