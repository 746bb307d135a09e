pub mod pipeline;
pub mod snapshot;
pub mod trip;
