//! Prompt templates for the scoring and normalization calls.

/// The JSON shape every scoring response must follow. Embedded verbatim in
/// both the evaluation prompt and the normalization prompt so the two calls
/// can never drift apart.
pub const RESULT_SCHEMA: &str = r#"{
  "cv_match_rate": 0-1,
  "cv_feedback": "...",
  "project_score": 1-5,
  "project_feedback": "...",
  "overall_summary": "3-5 sentences summary"
}"#;

/// The five extracted text blocks a scoring call needs.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    pub cv_text: String,
    pub report_text: String,
    pub job_desc: String,
    pub case_study: String,
    pub rubric: String,
}

/// Builds the single evaluation instruction: reference materials first,
/// then candidate materials, closing with the schema the model must return.
pub fn build_evaluation_prompt(inputs: &PromptInputs) -> String {
    format!(
        "You are an HR evaluation assistant.\n\
         \n\
         Evaluate a candidate's CV and project report based on the provided \
         Job Description, Case Study, and Scoring Rubric.\n\
         \n\
         Return a structured JSON like this:\n\
         {schema}\n\
         \n\
         Job Description:\n{job_desc}\n\
         \n\
         Case Study Brief:\n{case_study}\n\
         \n\
         Scoring Rubric:\n{rubric}\n\
         \n\
         Candidate CV:\n{cv_text}\n\
         \n\
         Project Report:\n{report_text}\n",
        schema = RESULT_SCHEMA,
        job_desc = inputs.job_desc,
        case_study = inputs.case_study,
        rubric = inputs.rubric,
        cv_text = inputs.cv_text,
        report_text = inputs.report_text,
    )
}

/// Builds the corrective prompt that reformats prose into the result schema.
pub fn build_normalization_prompt(raw: &str) -> String {
    format!(
        "Convert the following text into valid JSON strictly following this format:\n\
         {RESULT_SCHEMA}\n\
         \n\
         Text to convert:\n{raw}\n"
    )
}
