pub mod camera;
pub mod config;
pub mod controller;
pub mod controls;
pub mod gate;
pub mod intro;
pub mod ports;
pub mod viewer;

pub use camera::*;
pub use config::*;
pub use controller::*;
pub use controls::*;
pub use gate::*;
pub use intro::*;
pub use ports::*;
pub use viewer::*;
