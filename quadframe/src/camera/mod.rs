//! Camera module - the fixed viewpoint looking at the quad.
//!
//! The camera only produces matrices. Uploading them is the caller's job
//! (see `ResourceUploader::upload_constant_matrix`).

mod camera;

pub use camera::QuadCamera;
