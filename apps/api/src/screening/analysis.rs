//! Fitment analysis: the validated, wire-facing result of scoring one resume.
//!
//! The provider's completion is untrusted input. `parse_analysis` checks it
//! field by field and rejects anything outside the contract as
//! `MalformedScoringResponse` instead of passing bad data through.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::PipelineError;
use crate::llm_client::strip_json_fences;

/// Sentinel the model uses (and we normalise to) for unknown string fields.
pub const NOT_AVAILABLE: &str = "Not Available";

/// Structured scoring result. Field names are part of the HTTP contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitmentAnalysis {
    pub name: String,
    pub experience: f64,
    pub email: String,
    pub phone: String,
    pub current_role: String,
    pub current_employer: String,
    pub location: String,
    pub score: u8,
    pub resume_quality: u8,
    pub job_stability: u8,
    pub jd_fitment: u8,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub suggestions: Vec<String>,
    pub summary: String,
}

/// An analysis tagged with the upload it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedResume {
    pub file_name: String,
    #[serde(flatten)]
    pub analysis: FitmentAnalysis,
}

/// Parses and validates a raw completion body.
pub fn parse_analysis(body: &str) -> Result<FitmentAnalysis, PipelineError> {
    let value: Value = serde_json::from_str(strip_json_fences(body))
        .map_err(|e| malformed(format!("response is not valid JSON: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| malformed("response is not a JSON object"))?;
    let fields = Fields(object);

    let analysis = FitmentAnalysis {
        name: fields.text("name")?,
        experience: fields.experience("experience")?,
        email: fields.text("email")?,
        phone: fields.text("phone")?,
        current_role: fields.text("currentRole")?,
        current_employer: fields.text("currentEmployer")?,
        location: fields.text("location")?,
        score: fields.score("score")?,
        resume_quality: fields.score("resumeQuality")?,
        job_stability: fields.score("jobStability")?,
        jd_fitment: fields.score("jdFitment")?,
        matched_skills: fields.list("matchedSkills")?,
        missing_skills: fields.list("missingSkills")?,
        suggestions: fields.list("suggestions")?,
        summary: fields.text("summary")?,
    };

    let matched: HashSet<String> = analysis
        .matched_skills
        .iter()
        .map(|s| s.to_lowercase())
        .collect();
    if let Some(both) = analysis
        .missing_skills
        .iter()
        .find(|s| matched.contains(&s.to_lowercase()))
    {
        return Err(malformed(format!(
            "skill `{both}` is listed as both matched and missing"
        )));
    }

    Ok(analysis)
}

/// Matched skills that do not literally appear in the resume text.
///
/// Informational only: the model is told to restrict itself to skills present
/// in the resume, and callers log any drift rather than rejecting it.
pub fn unsupported_matched_skills<'a>(
    analysis: &'a FitmentAnalysis,
    resume_text: &str,
) -> Vec<&'a str> {
    let haystack = resume_text.to_lowercase();
    analysis
        .matched_skills
        .iter()
        .filter(|skill| !haystack.contains(&skill.to_lowercase()))
        .map(String::as_str)
        .collect()
}

fn malformed(message: impl Into<String>) -> PipelineError {
    PipelineError::MalformedScoringResponse(message.into())
}

struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    fn required(&self, key: &str) -> Result<&Value, PipelineError> {
        self.0
            .get(key)
            .ok_or_else(|| malformed(format!("missing required field `{key}`")))
    }

    fn text(&self, key: &str) -> Result<String, PipelineError> {
        match self.required(key)? {
            Value::String(s) if s.trim().is_empty() => Ok(NOT_AVAILABLE.to_string()),
            Value::String(s) => Ok(s.trim().to_string()),
            Value::Null => Ok(NOT_AVAILABLE.to_string()),
            // phone numbers occasionally come back unquoted
            Value::Number(n) => Ok(n.to_string()),
            other => Err(malformed(format!("`{key}` must be a string, got {other}"))),
        }
    }

    fn score(&self, key: &str) -> Result<u8, PipelineError> {
        let value = self.required(key)?;
        let score = value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        });
        match score {
            Some(s) if s <= 100 => Ok(s as u8),
            _ => Err(malformed(format!(
                "`{key}` must be an integer in [0,100], got {value}"
            ))),
        }
    }

    fn experience(&self, key: &str) -> Result<f64, PipelineError> {
        let value = self.required(key)?;
        let years = match value {
            Value::Number(n) => n.as_f64(),
            Value::Null => Some(0.0),
            Value::String(s) if s.trim().eq_ignore_ascii_case(NOT_AVAILABLE) => Some(0.0),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match years {
            Some(y) if y.is_finite() && y >= 0.0 => Ok(y),
            _ => Err(malformed(format!(
                "`{key}` must be a non-negative number, got {value}"
            ))),
        }
    }

    fn list(&self, key: &str) -> Result<Vec<String>, PipelineError> {
        match self.required(key)? {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) if s.trim().is_empty() => None,
                    Value::String(s) => Some(Ok(s.trim().to_string())),
                    other => Some(Err(malformed(format!(
                        "`{key}` must contain only strings, got {other}"
                    )))),
                })
                .collect(),
            Value::Null => Ok(Vec::new()),
            Value::String(s) if s.trim().eq_ignore_ascii_case(NOT_AVAILABLE) => Ok(Vec::new()),
            other => Err(malformed(format!("`{key}` must be a list, got {other}"))),
        }
    }
}
