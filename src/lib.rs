pub mod config;
pub mod devrev;
pub mod error;
pub mod input;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod slack;

pub use config::{Event, ResolvedConfig};
pub use devrev::types::OpportunityRecord;
pub use devrev::DevRevClient;
pub use error::{Error, Result};
pub use input::{ReportTarget, TimeWindow};
pub use llm::LlmClient;
pub use metrics::{OwnerAggregates, StageCounts};
pub use pipeline::{run_event, run_events, RunReport, RunStatus};
pub use slack::SlackClient;
