//! Decision parser - turns free-text model output into a validated decision
//!
//! Every function here is total. Whatever the model wrote, the result names
//! one of the valid roles or the terminal sentinel; anything ambiguous
//! resolves to stopping.

use serde_json::{Map, Value};

use crate::domain::{AgentRole, NextAgent};

/// Reason recorded when no JSON object could be recovered
pub const UNPARSEABLE_REASON: &str = "unparseable response";

/// Label prefixes models put in front of the agent name
const LABEL_PREFIXES: &[&str] = &["next_agent:", "next agent:", "next:", "agent:"];

/// Upper bound on opening braces tried as object starts per response
const MAX_CANDIDATES: usize = 64;

/// A validated routing decision
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub next_agent: NextAgent,
    pub instruction: String,
    pub reason: String,
    pub rationale: String,
    pub plan_update: Option<String>,
    /// False when the response held no usable JSON object
    pub parsed: bool,
}

impl Decision {
    /// Stop the run with the given reason
    pub fn terminal(reason: impl Into<String>) -> Self {
        Self {
            next_agent: NextAgent::Finish,
            instruction: String::new(),
            reason: reason.into(),
            rationale: String::new(),
            plan_update: None,
            parsed: false,
        }
    }
}

/// The supervisor's opening plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRecord {
    pub plan: String,
    pub first_agent: AgentRole,
    pub first_instruction: String,
    pub complexity: String,
    pub estimated_steps: Option<u64>,
    pub thinking: String,
}

/// Parse a routing response. Never fails.
pub fn parse_decision(raw: &str, valid: &[AgentRole]) -> Decision {
    let Some(obj) = extract_json_object(raw) else {
        let mut decision = Decision::terminal(UNPARSEABLE_REASON);
        decision.rationale = truncate_chars(raw.trim(), 200);
        return decision;
    };

    let next_agent = match obj.get("next_agent") {
        Some(value) => normalize_agent(&field_value_text(value), valid),
        None => NextAgent::Finish,
    };

    let rationale = match text_field(&obj, "thinking") {
        t if t.is_empty() => text_field(&obj, "rationale"),
        t => t,
    };

    let plan_update = Some(text_field(&obj, "plan_update")).filter(|p| !p.trim().is_empty());

    Decision {
        next_agent,
        instruction: text_field(&obj, "instruction"),
        reason: text_field(&obj, "reason"),
        rationale,
        plan_update,
        parsed: true,
    }
}

/// Parse a planning response; `None` when no JSON object can be recovered
pub fn parse_plan(raw: &str, valid: &[AgentRole], default_agent: AgentRole) -> Option<PlanRecord> {
    let obj = extract_json_object(raw)?;

    let first_agent = obj
        .get("first_agent")
        .map(|value| normalize_agent(&field_value_text(value), valid))
        .and_then(|next| next.role())
        .unwrap_or_else(|| fallback_role(valid, default_agent));

    let plan = match obj.get("plan") {
        // Some models return the plan as a list of steps
        Some(Value::Array(steps)) => steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, field_value_text(step)))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(value) => field_value_text(value),
        None => String::new(),
    };

    let estimated_steps = match obj.get("estimated_steps") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    Some(PlanRecord {
        plan,
        first_agent,
        first_instruction: text_field(&obj, "first_instruction"),
        complexity: text_field(&obj, "complexity"),
        estimated_steps,
        thinking: text_field(&obj, "thinking"),
    })
}

/// The designated default role, or the first valid one when it is not available
pub fn fallback_role(valid: &[AgentRole], default_agent: AgentRole) -> AgentRole {
    if valid.is_empty() || valid.contains(&default_agent) {
        default_agent
    } else {
        valid[0]
    }
}

/// Map a raw agent label onto the closed routing domain
pub fn normalize_agent(raw: &str, valid: &[AgentRole]) -> NextAgent {
    let mut value = trim_label(raw);

    if let Some((first, _)) = value.split_once('|') {
        value = trim_label(first);
    }

    loop {
        let stripped = LABEL_PREFIXES.iter().find_map(|prefix| {
            value
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| trim_label(&value[prefix.len()..]))
        });
        match stripped {
            Some(rest) => value = rest,
            None => break,
        }
    }

    let lowered = value.to_lowercase();
    if lowered.is_empty() || lowered == "finish" {
        return NextAgent::Finish;
    }

    if let Some(role) = valid.iter().find(|role| role.as_str() == lowered) {
        return NextAgent::Worker(*role);
    }

    // e.g. "developer_node", "qa agent"
    if let Some(role) = valid.iter().find(|role| lowered.contains(role.as_str())) {
        log::debug!("agent label '{}' matched '{}' by substring", raw, role);
        return NextAgent::Worker(*role);
    }

    log::warn!("agent label '{}' is not a valid agent, stopping", raw);
    NextAgent::Finish
}

/// Locate the first JSON object in a response.
///
/// Strategies in order: a fenced block tagged `json`, any fenced block, the
/// first balanced `{...}`, and the span from the first `{` to the last `}`.
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let tagged = fenced_blocks(raw, true);
    let fenced = fenced_blocks(raw, false);
    let balanced = balanced_objects(raw);
    let greedy = greedy_object(raw);

    tagged
        .into_iter()
        .chain(fenced)
        .chain(balanced)
        .chain(greedy)
        .find_map(as_object)
}

fn as_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn fenced_blocks(raw: &str, json_only: bool) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find("```") {
        let after = &rest[start + 3..];
        let Some(end) = after.find("```") else {
            break;
        };
        let block = &after[..end];

        let (info, body) = match block.find('\n') {
            Some(nl) => (&block[..nl], &block[nl + 1..]),
            None => ("", block),
        };

        let is_json = info.trim().eq_ignore_ascii_case("json");
        if !json_only || is_json {
            // ```{"a": 1}``` has no info string, the object starts right away
            blocks.push(if info.trim_start().starts_with('{') { block } else { body });
        }

        rest = &after[end + 3..];
    }

    blocks
}

/// Every balanced `{...}` span, in order of its opening brace
fn balanced_objects(raw: &str) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut spans = Vec::new();

    for (start, _) in raw.match_indices('{').take(MAX_CANDIDATES) {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, &b) in bytes[start..].iter().enumerate() {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        spans.push(&raw[start..start + offset + 1]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    spans
}

fn greedy_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn trim_label(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim()
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).map(field_value_text).unwrap_or_default()
}

fn field_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Truncate to at most `max` characters, marking the cut
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
