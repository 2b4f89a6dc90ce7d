pub mod decoder;
pub mod model_codec;
pub mod scene_desc;
mod wire;

pub use decoder::*;
pub use model_codec::*;
pub use scene_desc::*;
