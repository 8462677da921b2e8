//! Natlog Time Series - Typed Series Store and Resampling Engine
//!
//! Named, typed, append-only series of timestamped points, with exact
//! retrieval by sequence and resampled queries over arbitrary windows that
//! can continue live as new points arrive.
//!
//! Key Features:
//! - Scalar, fixed-shape array, and MIME-typed blob datatypes
//! - Strictly time-ordered appends with dense per-series sequence numbers
//! - Fixed-width binning with pluggable reduction and interpolation
//! - Continuous queries driven by a cancellable tokio task
//! - JSON snapshot export and restore
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod codec;
pub mod continuous;
pub mod datatype;
pub mod engine;
pub mod export;
pub mod interpolation;
pub mod query;
pub mod reduction;
pub mod registry;
pub mod selector;
pub mod store;
pub mod value;

pub use continuous::{ContinuousBin, ContinuousQuery};
pub use datatype::{Datatype, ScalarType};
pub use engine::Database;
pub use export::{Snapshot, SeriesSnapshot};
pub use interpolation::Interpolation;
pub use query::{Bins, QueryEngine, QueryResult};
pub use reduction::Reduction;
pub use registry::{ConfigUpdate, SeriesConfig, SeriesRegistry};
pub use selector::{parse_selector_string, Selector};
pub use store::{BlobHandle, PointGroup, PointStore, PointValue, ReadResult};
pub use value::{ArrayData, ArrayValue, RawValue, Value};
