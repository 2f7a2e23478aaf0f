// Screening LLM prompt templates.
// All prompts for the screening module are defined here.

pub const FITMENT_SYSTEM: &str = "\
You are a resume evaluation assistant. \
You MUST respond with a single valid JSON object only, with no markdown fences and no explanations. \
Never invent skills, employers, or experience that the resume does not state.";

pub const FITMENT_PROMPT_TEMPLATE: &str = r#"Based on the following resume and job description, extract and return a valid JSON object with the structure shown below. If any value is not clearly available, use "Not Available".

Resume:
"""{resume_text}"""

Job Description:
"""{job_description}"""

Return the JSON strictly in the following format:
{
  "name": "[Full name of the candidate]",
  "experience": [Total experience in years as a number, calculated from employment history],
  "email": "[Extracted email or Not Available]",
  "phone": "[Extracted phone or Not Available]",
  "currentRole": "[Most recent job title or Not Available]",
  "currentEmployer": "[Most recent company or Not Available]",
  "location": "[Current location or Not Available]",
  "score": [Overall resume fitment score, integer 0-100],
  "resumeQuality": [Resume hygiene, completeness and structure, integer 0-100],
  "jobStability": [Stability of the career trajectory, integer 0-100],
  "jdFitment": [Fitment with the job description, integer 0-100],
  "matchedSkills": [Skills explicitly written in the resume that also appear in the job description],
  "missingSkills": [Important job description skills missing from the resume],
  "suggestions": [Suggestions to improve the resume or profile for this role],
  "summary": "[A 2-3 line professional summary based on the resume]"
}

RULES:
1. "experience": sum employment durations from the work history. Ignore internships when they are explicitly marked as internships.
2. "currentRole" and "currentEmployer": use the most recent job title and company in the work history.
3. "location": infer from the contact section or the most recent employment location.
4. "matchedSkills" may only contain skills literally written in the resume. A skill can never be in both "matchedSkills" and "missingSkills".
5. "suggestions" must be practical and specific: missing elements, structure issues, or mismatches with the job description.
6. "summary" must sound professional and reflect the candidate's core strengths for this role.
7. If the resume has significant formatting issues or is missing sections such as work experience or education, deduct points in "resumeQuality".
8. All four scores must be whole numbers between 0 and 100.
9. Return ONLY the JSON object and nothing else."#;

/// Fills the fitment template. Both texts are embedded verbatim.
pub fn build_fitment_prompt(resume_text: &str, job_description: &str) -> String {
    // Substitute the job description first so resume text containing the
    // literal `{job_description}` cannot be re-expanded.
    FITMENT_PROMPT_TEMPLATE
        .replace("{job_description}", job_description)
        .replacen("{resume_text}", resume_text, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_both_texts_verbatim() {
        let prompt = build_fitment_prompt("Jane Doe, Python, SQL", "Looking for Python developer");
        assert!(prompt.contains("\"\"\"Jane Doe, Python, SQL\"\"\""));
        assert!(prompt.contains("\"\"\"Looking for Python developer\"\"\""));
        assert!(!prompt.contains("{resume_text}"));
        assert!(!prompt.contains("{job_description}"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_fitment_prompt("resume", "jd");
        let b = build_fitment_prompt("resume", "jd");
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_lists_every_contract_field() {
        let prompt = build_fitment_prompt("r", "j");
        for field in [
            "name",
            "experience",
            "email",
            "phone",
            "currentRole",
            "currentEmployer",
            "location",
            "score",
            "resumeQuality",
            "jobStability",
            "jdFitment",
            "matchedSkills",
            "missingSkills",
            "suggestions",
            "summary",
        ] {
            assert!(prompt.contains(&format!("\"{field}\"")), "missing {field}");
        }
    }

    #[test]
    fn test_placeholder_inside_resume_is_not_expanded() {
        let prompt = build_fitment_prompt("I wrote {job_description} templates", "Rust role");
        assert!(prompt.contains("I wrote {job_description} templates"));
    }
}
