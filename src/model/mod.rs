pub mod color;
pub mod color_map;
pub mod params;
pub mod particle;
pub mod system;
pub mod transform;

// Re-export commonly used types at the model level.
pub use color::Color;
pub use color_map::{palettes, ColorGradient, ColorMap, ColorStop};
pub use params::Params;
pub use particle::{Particle, Point};
pub use system::{BlendDef, FormulaDef, FormulaSource, SystemDef};
pub use transform::Transform;
