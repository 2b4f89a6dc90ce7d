pub mod components;
pub mod instance;
pub mod node;
pub mod optimize;

pub use components::*;
pub use instance::*;
pub use node::*;
pub use optimize::*;
