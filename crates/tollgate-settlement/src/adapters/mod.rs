pub mod http;
pub mod scripted;

pub use http::HttpWorkflowEngine;
pub use scripted::ScriptedWorkflowEngine;
