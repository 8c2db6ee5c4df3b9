//! Diffusion-based region shaping

mod diffuse;

pub use diffuse::{diffuse, Diffuse, DiffuseInput, DiffuseParams};
