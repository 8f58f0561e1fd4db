pub mod light;
#[cfg(test)]
mod shadow;

pub use self::light::{Light, OrthoVolume};
