//! `PromptAssembler`: builds the system prompt sent with each LLM call and
//! validates that the assembled request fits the session window.
//!
//! Grounded on the teacher's prompt-building helpers in
//! `llama-agent::types::sessions` (per-request system prompt composed from a
//! persona string plus runtime context), generalized to the spec's
//! per-mode, per-tier template selection.

use crate::mode_machine::allowed_tools_for;
use crate::types::{ActiveContext, Mode, PromptError, TokenCounter, Tier};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Runtime context the orchestrator supplies for each turn; nothing here is
/// persisted, it is recomputed on every assembly.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub working_directory: PathBuf,
    pub active_skills: Vec<String>,
    pub now: DateTime<Utc>,
}

fn persona_for(mode: Mode) -> &'static str {
    match mode {
        Mode::Assistant => "You are a general-purpose assistant. Answer directly and ask before taking action.",
        Mode::Planning => "You are in planning mode. Produce plans and task breakdowns; do not modify files.",
        Mode::Developer => "You are in developer mode. You may read and write files, run tests, and use the shell.",
        Mode::Debugger => "You are in debugger mode. Focus on root-causing failures; prefer inspection tools over edits.",
    }
}

/// Tier-specific framing: smaller tiers get a terser template so the
/// instructions themselves do not dominate a small window.
fn template_for(tier: Tier) -> &'static str {
    match tier {
        Tier::T1 => "Be extremely concise. Omit preamble.",
        Tier::T2 => "Be concise.",
        Tier::T3 | Tier::T4 => "Respond naturally, with reasoning where useful.",
        Tier::T5 => "You have ample context; feel free to reason at length and reference prior summaries.",
    }
}

pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Builds the full system prompt for the next request: persona for
    /// `mode`, a tier-specific instruction, the active skill list, and
    /// orchestrator-provided runtime context.
    pub fn assemble(&self, mode: Mode, tier: Tier, ctx: &TurnContext) -> String {
        let tools = allowed_tools_for(mode).join(", ");
        let skills = if ctx.active_skills.is_empty() {
            "none".to_string()
        } else {
            ctx.active_skills.join(", ")
        };

        format!(
            "{persona}\n{template}\n\nAvailable tools: {tools}\nActive skills: {skills}\n\
             Working directory: {cwd}\nCurrent time: {now}",
            persona = persona_for(mode),
            template = template_for(tier),
            tools = tools,
            skills = skills,
            cwd = ctx.working_directory.display(),
            now = ctx.now.to_rfc3339(),
        )
    }

    /// Confirms the assembled request (system prompt + checkpoint summaries
    /// + recent messages + reserve) fits `window_tokens`. Called
    /// immediately before every LLM call, per §4.6's validation-before-send
    /// contract.
    pub fn validate(
        &self,
        active_context: &ActiveContext,
        window_tokens: usize,
        reserve_tokens: usize,
        counter: &dyn TokenCounter,
    ) -> Result<(), PromptError> {
        let total = active_context.system_prompt_tokens(counter)
            + active_context.checkpoint_tokens()
            + active_context.recent_tokens()
            + reserve_tokens;

        if total > window_tokens {
            return Err(PromptError::DoesNotFit);
        }
        Ok(())
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SimpleTokenCounter;

    fn turn_context() -> TurnContext {
        TurnContext {
            working_directory: PathBuf::from("/workspace"),
            active_skills: vec!["search".to_string()],
            now: Utc::now(),
        }
    }

    #[test]
    fn assembled_prompt_mentions_mode_specific_tools() {
        let assembler = PromptAssembler::new();
        let prompt = assembler.assemble(Mode::Developer, Tier::T3, &turn_context());
        assert!(prompt.contains("write_file"));
        assert!(!prompt.contains("inspect_stack"));
    }

    #[test]
    fn smaller_tiers_get_a_terser_template() {
        let assembler = PromptAssembler::new();
        let t1 = assembler.assemble(Mode::Assistant, Tier::T1, &turn_context());
        let t5 = assembler.assemble(Mode::Assistant, Tier::T5, &turn_context());
        assert!(t1.contains("extremely concise"));
        assert!(t5.contains("reference prior summaries"));
    }

    #[test]
    fn validate_rejects_a_request_that_does_not_fit() {
        let assembler = PromptAssembler::new();
        let mut ctx = ActiveContext::new("a very short system prompt");
        ctx.recent_messages.push(crate::types::Message::new(
            crate::types::MessageRole::User,
            "x",
            &SimpleTokenCounter,
        ));
        ctx.recent_messages[0].token_count = 10_000;

        let result = assembler.validate(&ctx, 4096, 512, &SimpleTokenCounter);
        assert!(matches!(result, Err(PromptError::DoesNotFit)));
    }

    #[test]
    fn validate_accepts_a_request_within_budget() {
        let assembler = PromptAssembler::new();
        let ctx = ActiveContext::new("short");
        let result = assembler.validate(&ctx, 4096, 512, &SimpleTokenCounter);
        assert!(result.is_ok());
    }
}
