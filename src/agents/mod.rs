//! Agents for topic selection, RTL synthesis and documentation.

pub mod coder;
pub mod error;
pub mod trend_scout;
pub mod writer;

pub use coder::{Coder, CoderConfig};
pub use error::{AgentError, AgentResult};
pub use trend_scout::{TrendScout, TrendScoutConfig, WorkItem, TOPIC_CATEGORIES};
pub use writer::{Writer, WriterConfig};
