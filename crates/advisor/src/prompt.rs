//! Prompt assembly for the completion service.
//!
//! The user prompt is rendered from a fixed Handlebars template. Sections
//! always appear in the same order; empty evidence is replaced by an explicit
//! placeholder so the model can tell "nothing found" from "not included".

use handlebars::Handlebars;
use serde::Serialize;

use crate::alert::AlertRecord;
use crate::completion::CompletionRequest;
use crate::error::AdvisorResult;
use crate::evidence::EvidenceBundle;

/// System instruction sent with every prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are a Kubernetes SRE assistant. \
Provide safe, step-by-step troubleshooting guidance. \
No self-healing: never perform or trigger remediation actions yourself; \
a human operator executes every change. \
Use the provided Kubernetes evidence (resource status, events, logs) to be specific. \
Include kubectl commands and what to validate in Prometheus/Grafana.";

pub const NO_EVENTS_PLACEHOLDER: &str = "(no events or no resource label provided)";
pub const NO_LOGS_PLACEHOLDER: &str = "(no logs or no resource label provided)";
pub const NO_RUNBOOK_PLACEHOLDER: &str = "(no matching runbook snippet)";

const TEMPLATE_NAME: &str = "recommendation";

const USER_TEMPLATE: &str = "Alert:
- alertname: {{alert.alertname}}
- severity: {{alert.severity}}
- namespace: {{alert.namespace}}
- resource: {{alert.resourceName}}
- deployment: {{alert.deploymentName}}
- summary: {{alert.summary}}

Kubernetes evidence (most important):
Resource summary:
{{resource_summary}}

Recent events (newest first):
{{events}}

Log tail:
{{log_tail}}

Runbook context:
{{runbook}}

Return:
1) Probable cause (based on evidence)
2) Immediate checks (commands)
3) Mitigation steps
4) What confirms recovery
";

/// Everything a recommendation is based on.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationPrompt<'a> {
    pub alert: &'a AlertRecord,
    pub evidence: &'a EvidenceBundle,
    /// Retrieved runbook passage, empty when nothing matched
    pub runbook_snippet: &'a str,
}

/// Template context with placeholders already substituted.
#[derive(Serialize)]
struct PromptContext<'a> {
    alert: &'a AlertRecord,
    resource_summary: &'a str,
    events: String,
    log_tail: &'a str,
    runbook: &'a str,
}

/// Renders [`RecommendationPrompt`]s into completion requests.
pub struct PromptAssembler {
    handlebars: Handlebars<'static>,
}

impl PromptAssembler {
    pub fn new() -> AdvisorResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);
        handlebars.register_template_string(TEMPLATE_NAME, USER_TEMPLATE)?;
        Ok(Self { handlebars })
    }

    /// Render the system instruction and user prompt.
    pub fn assemble(&self, prompt: &RecommendationPrompt<'_>) -> AdvisorResult<CompletionRequest> {
        let evidence = prompt.evidence;
        let events = if evidence.events.is_empty() {
            NO_EVENTS_PLACEHOLDER.to_string()
        } else {
            serde_json::to_string_pretty(&evidence.events)?
        };

        let context = PromptContext {
            alert: prompt.alert,
            resource_summary: &evidence.resource_summary,
            events,
            log_tail: non_empty_or(&evidence.log_tail, NO_LOGS_PLACEHOLDER),
            runbook: non_empty_or(prompt.runbook_snippet, NO_RUNBOOK_PLACEHOLDER),
        };

        Ok(CompletionRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_prompt: self.handlebars.render(TEMPLATE_NAME, &context)?,
        })
    }
}

fn non_empty_or<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}
