//! Domain entities (§3 of the spec): Job, ProcessedMessage, AgentSession,
//! Assignment, Organization, Integration.

mod agent;
mod integration;
mod job;
mod organization;
mod processed_message;

pub use agent::{AgentSession, Assignment};
pub use integration::{ChatPlatform, Integration};
pub use job::{DiscordPayload, Job, JobPayload, JobType, SlackPayload};
pub use organization::Organization;
pub use processed_message::{MessageStatus, ProcessedMessage};
