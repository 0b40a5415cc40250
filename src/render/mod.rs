pub mod composite;
pub mod cone;
pub mod image;
pub mod mask;
pub mod pipeline;
pub mod plane;
pub mod raster;
pub mod renderer;
pub mod surface;
