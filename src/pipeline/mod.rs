//! Pipeline coordination for the RTL factory.

pub mod coordinator;

pub use coordinator::{
    Coordinator, ItemReport, ItemStatus, PersistedFiles, PipelineError, PipelineStats,
};
