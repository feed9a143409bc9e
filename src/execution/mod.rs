pub mod aggregate;
pub mod approx;
pub mod batch;
pub mod engine;
pub mod result;
pub mod sampling;

pub use aggregate::{AggregateState, PartialAggregate};
pub use approx::{CountMinSketch, HyperLogLog};
pub use batch::BatchIterator;
pub use engine::{ExecutionMode, QueryEngine, QueryRequest};
pub use result::{ExactComparison, QueryResponse, ResultRow, ResultRowBuilder};
pub use sampling::{reservoir_from_source, Reservoir};
