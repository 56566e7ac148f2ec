//! Supervisor: planning, routing and the decision parser

pub mod machine;
pub mod parser;
pub mod prompts;

pub use machine::{PLAN_REASON, Supervisor};
pub use parser::{
    Decision, PlanRecord, UNPARSEABLE_REASON, extract_json_object, normalize_agent, parse_decision, parse_plan,
    truncate_chars,
};
