//! Magic wand selection over tiled canvases.
//!
//! - **Color bounds**: per-channel tolerance ranges around the seed color
//! - **Tiles / documents**: tile storage and the sources a fill samples
//! - **Magic wand**: frontier flood fill that crosses empty tiles whole
//! - **Edges / contour**: boundary edge bookkeeping and the vector outline
//!
//! The outline is used for selection tools and marching ants visualization.

pub mod color_bounds;
pub mod contour;
pub mod document;
pub mod edges;
pub mod magic_wand;
pub mod tiles;

pub use color_bounds::{ColorBounds, ColorF};
pub use contour::{build_contour, FillRule, PathCommand, VectorPath};
pub use document::{Document, LayerId, ReadOnlyDocument};
pub use edges::{Edge, EdgeSet};
pub use magic_wand::{
    magic_wand_flood_fill, magic_wand_select, magic_wand_select_cancellable,
    magic_wand_select_image, CancellationToken, FillStats, MagicWandResult,
};
pub use tiles::{Tile, TileBuffer, TileSource, TiledCanvas};
