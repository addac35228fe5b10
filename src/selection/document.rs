//! Layered documents and the flattened tile source used for sampling.
//!
//! A fill samples a set of layers as if they were merged. When exactly one
//! layer is selected its tiles are handed out directly; otherwise tiles are
//! composited on demand (premultiplied source-over, bottom to top) and only
//! for the coordinates the fill actually visits.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::validate_tile_size;
use crate::error::{Result, WandError};
use crate::geometry::VecI;
use crate::selection::tiles::{channels_as_f32, PixelData, Tile, TileBuffer, TileSource, TiledCanvas};

/// Stable identifier of a layer within a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A raster layer; one canvas per animation frame.
#[derive(Clone, Debug)]
pub struct Layer {
    pub name: String,
    frames: Vec<TiledCanvas>,
}

impl Layer {
    pub fn frames(&self) -> &[TiledCanvas] {
        &self.frames
    }

    /// Canvas shown at `frame`, `None` when the layer has no such frame.
    pub fn canvas_at(&self, frame: usize) -> Option<&TiledCanvas> {
        self.frames.get(frame)
    }

    pub fn canvas_at_mut(&mut self, frame: usize) -> Option<&mut TiledCanvas> {
        self.frames.get_mut(frame)
    }
}

/// Read-only view of a document for a fill: size plus tile access.
pub trait ReadOnlyDocument {
    fn size(&self) -> VecI;

    fn tile_size(&self) -> usize;

    /// Tile source that samples `members` merged at `frame`.
    fn sample_source(&self, members: &HashSet<LayerId>, frame: usize) -> Result<FlattenedSource<'_>>;
}

/// In-memory layered document. Layers are ordered bottom to top.
#[derive(Clone, Debug)]
pub struct Document {
    size: VecI,
    tile_size: usize,
    next_id: u64,
    layers: Vec<(LayerId, Layer)>,
}

impl Document {
    pub fn new(width: usize, height: usize, tile_size: usize) -> Result<Self> {
        validate_tile_size(tile_size)?;
        Ok(Self {
            size: VecI::new(width as i32, height as i32),
            tile_size,
            next_id: 1,
            layers: Vec::new(),
        })
    }

    /// Append a transparent layer with `frame_count` frames (at least one)
    /// on top of the stack.
    pub fn add_layer(&mut self, name: &str, frame_count: usize) -> Result<LayerId> {
        let mut frames = Vec::with_capacity(frame_count.max(1));
        for _ in 0..frame_count.max(1) {
            frames.push(TiledCanvas::new(
                self.size.x as usize,
                self.size.y as usize,
                self.tile_size,
            )?);
        }
        let id = LayerId(self.next_id);
        self.next_id += 1;
        self.layers.push((
            id,
            Layer {
                name: name.to_string(),
                frames,
            },
        ));
        Ok(id)
    }

    /// Append a single-frame layer from an existing canvas.
    pub fn add_canvas_layer(&mut self, name: &str, canvas: TiledCanvas) -> Result<LayerId> {
        if canvas.size() != self.size || canvas.tile_size() != self.tile_size {
            return Err(WandError::ShapeMismatch {
                expected: vec![self.size.y as usize, self.size.x as usize, self.tile_size],
                actual: vec![
                    canvas.size().y as usize,
                    canvas.size().x as usize,
                    canvas.tile_size(),
                ],
            });
        }
        let id = LayerId(self.next_id);
        self.next_id += 1;
        self.layers.push((
            id,
            Layer {
                name: name.to_string(),
                frames: vec![canvas],
            },
        ));
        Ok(id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|(lid, _)| *lid == id).map(|(_, l)| l)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|(lid, _)| *lid == id).map(|(_, l)| l)
    }

    /// Layer ids bottom to top.
    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|(id, _)| *id).collect()
    }
}

impl ReadOnlyDocument for Document {
    fn size(&self) -> VecI {
        self.size
    }

    fn tile_size(&self) -> usize {
        self.tile_size
    }

    fn sample_source(&self, members: &HashSet<LayerId>, frame: usize) -> Result<FlattenedSource<'_>> {
        if let Some(missing) = members.iter().find(|id| self.layer(**id).is_none()) {
            return Err(WandError::UnknownLayer(*missing));
        }
        let canvases = self
            .layers
            .iter()
            .filter(|(id, _)| members.contains(id))
            .filter_map(|(_, layer)| layer.canvas_at(frame))
            .collect();
        Ok(FlattenedSource {
            size: self.size,
            tile_size: self.tile_size,
            canvases,
        })
    }
}

/// Tile source merging several canvases, bottom to top.
#[derive(Clone, Debug)]
pub struct FlattenedSource<'a> {
    size: VecI,
    tile_size: usize,
    canvases: Vec<&'a TiledCanvas>,
}

impl FlattenedSource<'_> {
    pub fn layer_count(&self) -> usize {
        self.canvases.len()
    }
}

impl TileSource for FlattenedSource<'_> {
    fn tile_size(&self) -> usize {
        self.tile_size
    }

    fn size(&self) -> VecI {
        self.size
    }

    fn tile(&self, coord: VecI) -> Tile {
        let populated: Vec<Arc<TileBuffer>> = self
            .canvases
            .iter()
            .filter_map(|canvas| match canvas.tile(coord) {
                Tile::Populated(buffer) => Some(buffer),
                Tile::Empty => None,
            })
            .collect();

        match populated.len() {
            0 => Tile::Empty,
            1 => Tile::Populated(populated[0].clone()),
            _ => Tile::Populated(Arc::new(composite(&populated, self.tile_size))),
        }
    }
}

/// Premultiplied source-over of `layers` (bottom first). The result keeps
/// 8-bit precision unless any input is a float tile.
fn composite(layers: &[Arc<TileBuffer>], tile_size: usize) -> TileBuffer {
    let mut acc = vec![0.0f32; tile_size * tile_size * 4];
    for layer in layers {
        let src = match layer.data() {
            PixelData::U8(v) => channels_as_f32(v),
            PixelData::F32(v) => v.clone(),
        };
        for (dst, src) in acc.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            let inv = 1.0 - src[3];
            for c in 0..4 {
                dst[c] = src[c] + dst[c] * inv;
            }
        }
    }

    let data = if layers.iter().any(|l| l.is_f32()) {
        PixelData::F32(acc)
    } else {
        PixelData::U8(acc.iter().map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8).collect())
    };
    TileBuffer::from_parts(tile_size, data)
}
