pub mod registry;

pub use registry::{FeedSpec, Publisher, SourceRegistry};
