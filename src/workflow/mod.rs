pub mod request_ctx;
pub mod submission_flow;

pub use request_ctx::{RequestContext, Role};
pub use submission_flow::{SubmissionFlow, SubmissionRequest, SubmissionResult};
