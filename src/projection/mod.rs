pub mod cone;
pub mod homography;
