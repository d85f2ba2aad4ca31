//! The default post-processor: a no-op, since tag-copying from source to
//! transcoded output is an external collaborator per spec §1.

pub use playsync_core::pipeline::syncer::noop_postprocessor;
