pub mod generator;
pub mod jobs;
pub mod notify;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod validator;
pub mod worker;
