//! Comparison frame layout.
//!
//! ```text
//! ┌───────────────────┬────┬───────────────────┐
//! │ reference         │ 10 │ upscaled          │  sr height + 5
//! ├───────────────────┴────┴───────────────────┤
//! │ 5 reference tiles │ 5 upscaled tiles       │  crop tile + 5
//! └────────────────────────────────────────────┘
//! ```

pub mod compositor;
pub mod geometry;
pub mod ops;

pub use compositor::FrameCompositor;
pub use geometry::OutputGeometry;
