//! Scene primitives: camera, light and model transform

pub mod camera;
pub mod light;
pub mod transform;

pub use camera::Camera;
pub use light::Light;
pub use transform::Transform;
