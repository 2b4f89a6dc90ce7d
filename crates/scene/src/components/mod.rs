pub mod bounds;
pub mod geometry;
pub mod material;
pub mod transform;

pub use bounds::*;
pub use geometry::*;
pub use material::*;
pub use transform::*;
