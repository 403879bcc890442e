// Evaluation engine: job lifecycle, the per-job pipeline, LLM scoring with
// provider fallback, and result persistence.
// All provider calls go through llm_client — no direct HTTP from here.

pub mod handlers;
pub mod jobs;
pub mod pipeline;
pub mod prompts;
pub mod results;
pub mod scoring;
