//! Prompt assembly: query + context + mood → [`GenerationRequest`].
//!
//! The system instruction is a role preamble, the mood's tone instruction and a
//! grounding directive. The user payload carries the query, the rendered context
//! and output instructions as separate `###` sections.
//!
//! # Truncation
//!
//! The rendered context must fit `max_context_chars`. Facts are dropped one at a
//! time in a fixed order until it does:
//!
//! 1. walking primaries from lowest rank to highest, trailing facts are dropped
//!    until each primary keeps one;
//! 2. walking primaries from lowest rank to highest, each primary's last fact is
//!    dropped.
//!
//! Dropped facts are announced with a marker line. When the marked rendering does
//! not fit, the same state is tried without markers. Primaries themselves are never
//! dropped. If the primaries-only rendering still does not fit, assembly fails with
//! [`Error::ContextTooLarge`]. Because the order
//! is fixed, a smaller limit never yields a longer context.

use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::retrieval::context::{ContextSummary, RenderOptions};
use crate::retrieval::mood::MoodLabel;

const ROLE_PREAMBLE: &str = "You are a world-class travel planner and itinerary designer.";

const GROUNDING_DIRECTIVE: &str = "Ground every factual claim in the Context Summary provided \
by the user. Do not introduce places, activities or regions that are not present in it. If the \
context does not cover part of the request, say so instead of inventing details.";

/// Default maximum rendered context length, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 6000;

/// The assembled payload for the generation backend.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub query: String,
    pub mood: MoodLabel,
    /// Rendered (possibly truncated) context summary.
    pub context: String,
    pub system_instruction: String,
    /// Query, context and output instructions as delimited sections.
    pub user_payload: String,
    /// Number of facts dropped to fit the context limit.
    pub omitted_facts: usize,
}

/// Builds [`GenerationRequest`]s under a context length limit.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_context_chars: usize,
    render: RenderOptions,
}

impl PromptAssembler {
    pub fn new(max_context_chars: usize, render: RenderOptions) -> Self {
        Self {
            max_context_chars,
            render,
        }
    }

    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    pub fn assemble(
        &self,
        query: &str,
        context: &ContextSummary,
        mood: &MoodLabel,
    ) -> Result<GenerationRequest> {
        let (rendered, omitted_facts) = self.fit_context(context)?;
        if omitted_facts > 0 {
            warn!(
                omitted_facts,
                limit = self.max_context_chars,
                "context truncated to fit limit"
            );
        }

        let system_instruction = format!(
            "{ROLE_PREAMBLE}\n\n\
             Your goal is to create a {} travel experience for the user.\n\
             Use a {} tone throughout your answer.\n\n\
             {GROUNDING_DIRECTIVE}",
            mood.description, mood.tone
        );

        let user_payload = format!(
            "### User Query\n{query}\n\n\
             ### Context Summary\n{rendered}\n\
             ### Output Instructions\n\
             - Create a 4-day itinerary (or adapt if a duration is mentioned).\n\
             - Include location names, brief descriptions, and why they fit the theme.\n\
             - Use day headers and bullet points in markdown.\n\
             - Make sure your tone matches the mood: *{}*.\n",
            mood.tone
        );

        Ok(GenerationRequest {
            query: query.to_string(),
            mood: mood.clone(),
            context: rendered,
            system_instruction,
            user_payload,
            omitted_facts,
        })
    }

    /// Render the context within the limit. Returns the text and the number of
    /// facts dropped.
    ///
    /// Each truncation state is tried with omission markers first, then without.
    /// The last state without markers is the primaries-only rendering, so
    /// [`Error::ContextTooLarge`] means exactly that the primaries alone exceed the
    /// limit.
    pub fn fit_context(&self, context: &ContextSummary) -> Result<(String, usize)> {
        let limit = self.max_context_chars;
        let mut kept = context.fact_counts();
        let total: usize = kept.iter().sum();

        let rendered = context.render_kept(&kept, &self.render);
        if char_len(&rendered) <= limit {
            return Ok((rendered, 0));
        }

        for step in truncation_order(&kept) {
            kept[step] -= 1;
            let omitted = total - kept.iter().sum::<usize>();
            for mark_omitted in [true, false] {
                let rendered = context.render_selection(&kept, mark_omitted, &self.render);
                if char_len(&rendered) <= limit {
                    return Ok((rendered, omitted));
                }
            }
        }

        let minimal = context.render_selection(&kept, false, &self.render);
        Err(Error::ContextTooLarge {
            required: char_len(&minimal),
            limit,
        })
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_CHARS, RenderOptions::default())
    }
}

/// Primary indices to decrement, one fact per entry, in drop order.
fn truncation_order(counts: &[usize]) -> Vec<usize> {
    let mut order = Vec::with_capacity(counts.iter().sum());
    for (i, &n) in counts.iter().enumerate().rev() {
        order.extend(std::iter::repeat(i).take(n.saturating_sub(1)));
    }
    for (i, &n) in counts.iter().enumerate().rev() {
        if n > 0 {
            order.push(i);
        }
    }
    order
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
