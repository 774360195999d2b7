// src/matching/fallback.rs
//! Local defaults used when the AI service is unavailable

use crate::ai_client::{InterviewQuestion, MatchAnalysis, SalaryEstimate};
use crate::jobs::Job;
use crate::resumes::Resume;
use crate::utils::round2;
use std::collections::HashSet;

/// Score when the job lists no skills to compare against
pub const NEUTRAL_SCORE: f64 = 50.0;
pub const OWN_RANGE_CONFIDENCE: f64 = 0.5;

/// Share of the job's skills the resume covers, as a 0..=100 score
pub fn skill_overlap(resume: &Resume, job: &Job) -> MatchAnalysis {
    let have: HashSet<&str> = resume.skills.iter().map(String::as_str).collect();
    let (matched, missing): (Vec<String>, Vec<String>) = job
        .skills
        .iter()
        .cloned()
        .partition(|skill| have.contains(skill.as_str()));

    let score = if job.skills.is_empty() {
        NEUTRAL_SCORE
    } else {
        round2(matched.len() as f64 * 100.0 / job.skills.len() as f64)
    };

    let summary = if job.skills.is_empty() {
        "The job lists no skills; neutral estimate".to_string()
    } else {
        format!(
            "Estimated from skill overlap: {} of {} required skills",
            matched.len(),
            job.skills.len()
        )
    };

    MatchAnalysis {
        score,
        matched_skills: matched,
        missing_skills: missing,
        summary,
    }
}

/// The posting's own range, or an empty estimate when it has none
pub fn salary_from_posting(job: &Job) -> SalaryEstimate {
    let has_range = job.salary_min.is_some() || job.salary_max.is_some();
    SalaryEstimate {
        min: job.salary_min,
        max: job.salary_max,
        currency: job.currency.clone(),
        confidence: if has_range { OWN_RANGE_CONFIDENCE } else { 0.0 },
    }
}

const QUESTION_BANK: &[(&str, &str, &str)] = &[
    ("Walk us through your background and what draws you to the {title} role.", "background", "easy"),
    ("Which of your past projects best prepares you for this position?", "experience", "easy"),
    ("Describe a difficult technical problem you solved recently and how you approached it.", "technical", "medium"),
    ("How do you decide between shipping quickly and polishing a solution?", "judgment", "medium"),
    ("Tell us about a disagreement with a teammate and how it was resolved.", "behavioral", "medium"),
    ("How do you keep your skills current for a {title} position?", "growth", "easy"),
    ("What would you focus on during your first 90 days as {title}?", "planning", "medium"),
    ("Describe a time you had to learn a new tool or domain under pressure.", "behavioral", "medium"),
    ("How do you measure whether your work as {title} is successful?", "judgment", "hard"),
    ("Tell us about a failure and what you changed afterwards.", "behavioral", "hard"),
    ("Which part of the {title} job description do you expect to be hardest for you?", "self-assessment", "medium"),
    ("How do you document your work so others can pick it up?", "collaboration", "easy"),
    ("Describe how you would onboard yourself into an unfamiliar codebase or process.", "technical", "medium"),
    ("Tell us about a time you improved a process nobody asked you to fix.", "behavioral", "medium"),
    ("How do you prioritise when several stakeholders need something from you at once?", "judgment", "medium"),
    ("What feedback have you received recently, and what did you do with it?", "growth", "easy"),
    ("Walk us through how you would debug a problem you cannot reproduce.", "technical", "hard"),
    ("How would you explain a complex part of your work to a non-specialist?", "communication", "medium"),
    ("What trade-offs would you expect to make most often as {title}?", "judgment", "hard"),
    ("Why are you leaving your current role, and what are you looking for next?", "motivation", "easy"),
];

/// Fixed generic questions with the job title filled in, trimmed to `count`.
/// The bank covers the largest count the API accepts.
pub fn generic_questions(job: &Job, count: u32) -> Vec<InterviewQuestion> {
    QUESTION_BANK
        .iter()
        .take(count as usize)
        .map(|(question, category, difficulty)| InterviewQuestion {
            question: question.replace("{title}", &job.title),
            category: category.to_string(),
            difficulty: difficulty.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::NewJob;
    use chrono::Utc;
    use uuid::Uuid;

    fn job(skills: &[&str]) -> Job {
        NewJob {
            title: "Platform Engineer".to_string(),
            company: "Acme".to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
        .into_job(1)
        .unwrap()
    }

    fn resume(skills: &[&str]) -> Resume {
        Resume {
            id: Uuid::new_v4(),
            user_id: 1,
            title: "cv".to_string(),
            summary: String::new(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experience_years: 3,
            content: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_skill_overlap() {
        let analysis = skill_overlap(&resume(&["rust", "sql"]), &job(&["rust", "kubernetes", "sql"]));
        assert_eq!(analysis.score, 66.67);
        assert_eq!(analysis.matched_skills, vec!["rust", "sql"]);
        assert_eq!(analysis.missing_skills, vec!["kubernetes"]);

        let neutral = skill_overlap(&resume(&["rust"]), &job(&[]));
        assert_eq!(neutral.score, NEUTRAL_SCORE);
    }

    #[test]
    fn test_salary_fallback() {
        let mut posted = job(&[]);
        posted.salary_min = Some(80_000);
        let estimate = salary_from_posting(&posted);
        assert_eq!(estimate.min, Some(80_000));
        assert_eq!(estimate.confidence, OWN_RANGE_CONFIDENCE);

        let unknown = salary_from_posting(&job(&[]));
        assert_eq!(unknown.min, None);
        assert_eq!(unknown.max, None);
        assert_eq!(unknown.confidence, 0.0);
    }

    #[test]
    fn test_generic_questions() {
        let questions = generic_questions(&job(&[]), 3);
        assert_eq!(questions.len(), 3);
        assert!(questions[0].question.contains("Platform Engineer"));

        let all = generic_questions(&job(&[]), crate::matching::MAX_QUESTION_COUNT);
        assert_eq!(all.len(), crate::matching::MAX_QUESTION_COUNT as usize);
        let distinct: HashSet<&str> = all.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(distinct.len(), all.len());
        assert!(all.iter().all(|q| !q.question.contains("{title}")));
    }
}
