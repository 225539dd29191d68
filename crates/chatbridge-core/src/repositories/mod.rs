//! Typed CRUD repositories (C3). Every method takes `org_id` and embeds it in
//! the query predicate (I5/P4); `get_by_id`-style methods return
//! `Option<T>` rather than a nullable pointer (§9).

mod agents;
mod integrations;
mod jobs;
mod messages;
mod organizations;

pub use agents::AgentsRepository;
pub use integrations::IntegrationsRepository;
pub use jobs::{JobCreation, JobsRepository};
pub use messages::MessagesRepository;
pub use organizations::OrganizationsRepository;
