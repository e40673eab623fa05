pub mod convert;
pub mod octree;
pub mod raytracing;
pub mod spatial;

mod record_store;
