mod builder;
mod cache;
mod config;
mod document;
mod environment;
mod feature;
mod feature_value;
mod identity;
mod integration;
mod precedence;
mod rule;
mod segment;
mod store;
mod test_common;
mod version;

pub use builder::*;
pub use cache::*;
pub use config::*;
pub use document::*;
pub use environment::*;
pub use feature::*;
pub use feature_value::*;
pub use identity::*;
pub use integration::*;
pub use precedence::*;
pub use rule::*;
pub use segment::*;
pub use store::*;
pub use version::*;
