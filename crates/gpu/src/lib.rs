pub mod backend;
pub mod renderer;
pub mod settings;

pub use backend::*;
pub use renderer::*;
pub use settings::*;
