// src/ai_client.rs
//! Typed access to the external AI service (matching, salary, interview questions)

use crate::core::ServiceClient;
use crate::jobs::Job;
use crate::resumes::Resume;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

const MATCH_ENDPOINT: &str = "/match";
const SALARY_ENDPOINT: &str = "/salary/predict";
const QUESTIONS_ENDPOINT: &str = "/interview/questions";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchAnalysis {
    pub score: f64,
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalaryEstimate {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub currency: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterviewQuestion {
    pub question: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub difficulty: String,
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    resume: &'a Resume,
    job: &'a Job,
}

#[derive(Serialize)]
struct SalaryRequest<'a> {
    job: &'a Job,
}

#[derive(Serialize)]
struct QuestionsRequest<'a> {
    job: &'a Job,
    resume: Option<&'a Resume>,
    count: u32,
}

#[derive(Deserialize)]
struct QuestionsResponse {
    questions: Vec<InterviewQuestion>,
}

#[async_trait]
pub trait AiService: Send + Sync {
    async fn match_resume(&self, resume: &Resume, job: &Job) -> Result<MatchAnalysis>;

    async fn predict_salary(&self, job: &Job) -> Result<SalaryEstimate>;

    async fn interview_questions(
        &self,
        job: &Job,
        resume: Option<&Resume>,
        count: u32,
    ) -> Result<Vec<InterviewQuestion>>;
}

pub struct AiServiceClient {
    client: ServiceClient,
}

impl AiServiceClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self> {
        info!("AI service at {} (timeout {}s)", base_url, timeout_seconds);
        Ok(Self {
            client: ServiceClient::new(base_url, timeout_seconds)?,
        })
    }
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

#[async_trait]
impl AiService for AiServiceClient {
    async fn match_resume(&self, resume: &Resume, job: &Job) -> Result<MatchAnalysis> {
        let mut analysis: MatchAnalysis = self
            .client
            .post_json(MATCH_ENDPOINT, &MatchRequest { resume, job })
            .await?;
        analysis.score = clamp_score(analysis.score);
        Ok(analysis)
    }

    async fn predict_salary(&self, job: &Job) -> Result<SalaryEstimate> {
        let mut estimate: SalaryEstimate = self
            .client
            .post_json(SALARY_ENDPOINT, &SalaryRequest { job })
            .await?;
        estimate.confidence = estimate.confidence.clamp(0.0, 1.0);
        Ok(estimate)
    }

    async fn interview_questions(
        &self,
        job: &Job,
        resume: Option<&Resume>,
        count: u32,
    ) -> Result<Vec<InterviewQuestion>> {
        let response: QuestionsResponse = self
            .client
            .post_json(QUESTIONS_ENDPOINT, &QuestionsRequest { job, resume, count })
            .await?;

        if response.questions.is_empty() {
            anyhow::bail!("AI service returned no interview questions");
        }
        Ok(response
            .questions
            .into_iter()
            .take(count as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(72.5), 72.5);
    }

    #[test]
    fn test_match_response_tolerates_missing_lists() {
        let analysis: MatchAnalysis = serde_json::from_str(r#"{"score": 81}"#).unwrap();
        assert_eq!(analysis.score, 81.0);
        assert!(analysis.matched_skills.is_empty());
        assert!(analysis.summary.is_empty());
    }
}
