//! Query planning and page scoring through an Ollama chat endpoint

use crate::config::VerifierConfig;
use crate::crawler::ScrapedPage;
use crate::pipeline::{ApplicantInfo, QueryPlanner, Verdict, Verifier};
use crate::VetError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

const PLAN_TIMEOUT: Duration = Duration::from_secs(60);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    max_content_chars: usize,
}

impl OllamaClient {
    pub fn new(client: Client, config: &VerifierConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_content_chars: config.max_content_chars,
        }
    }

    async fn chat(
        &self,
        prompt: &str,
        json: bool,
        timeout: Duration,
    ) -> Result<String, reqwest::Error> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            format: json.then_some("json"),
        };

        let response: ChatResponse = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.message.content)
    }

    fn verification_prompt(&self, applicant: &ApplicantInfo, page: &ScrapedPage) -> String {
        let content: String = page.content.chars().take(self.max_content_chars).collect();

        format!(
            r#"Compare the application below with the web page and score how likely they describe the same company.

[Application]
Company: {company}
Address: {address}
Phone: {tel}
Other: {other}

[Page]
Title: {title}
URL: {url}
Content: {content}

[Scoring]
- exact company name match: +0.4
- partial company name match: +0.2
- exact address match: +0.3
- partial address match: +0.15
- phone number match: +0.3
- other information match: +0.1 to 0.2

Answer with JSON only, in this shape:
{{"score": 0.85, "reasoning": "...", "matched_info": ["company name exact"], "confidence": 0.9}}"#,
            company = applicant.company,
            address = applicant.address,
            tel = applicant.tel,
            other = applicant.other.join(", "),
            title = page.title,
            url = page.url,
            content = content,
        )
    }
}

#[async_trait]
impl QueryPlanner for OllamaClient {
    async fn plan_queries(
        &self,
        applicant: &ApplicantInfo,
        max_queries: u32,
    ) -> Result<Vec<String>, VetError> {
        let facts = serde_json::to_string(applicant)?;
        let prompt = format!(
            "Write up to {} web search queries that would find official information about this company. \
             Output one query per line, keywords only: no numbering, quotes, brackets or explanations.\n\
             Company information: {}",
            max_queries, facts
        );

        let content = self
            .chat(&prompt, false, PLAN_TIMEOUT)
            .await
            .map_err(|e| VetError::Verifier(format!("query planning failed: {}", e)))?;

        Ok(parse_query_lines(&content, max_queries as usize))
    }
}

#[async_trait]
impl Verifier for OllamaClient {
    async fn verify(
        &self,
        applicant: &ApplicantInfo,
        page: &ScrapedPage,
    ) -> Result<Verdict, VetError> {
        let prompt = self.verification_prompt(applicant, page);

        let content = self
            .chat(&prompt, true, VERIFY_TIMEOUT)
            .await
            .map_err(|e| VetError::Verifier(e.to_string()))?;

        parse_verdict(&content)
    }
}

/// Extracts queries from free-form model output, one per line
fn parse_query_lines(content: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();

    content
        .lines()
        .map(clean_query_line)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .filter(|line| seen.insert(line.to_lowercase()))
        .take(max)
        .collect()
}

fn clean_query_line(line: &str) -> String {
    let line = line.trim();

    // "1. query" / "2) query"; a query that merely starts with digits is kept
    let unnumbered = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let line = if unnumbered.len() < line.len() {
        unnumbered
            .strip_prefix(". ")
            .or_else(|| unnumbered.strip_prefix(") "))
            .unwrap_or(line)
    } else {
        line
    };

    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line);

    line.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '「' | '」' | '『' | '』'))
        .trim()
        .to_string()
}

/// Parses the JSON verdict, tolerating text around the object
fn parse_verdict(content: &str) -> Result<Verdict, VetError> {
    let start = content.find('{');
    let end = content.rfind('}');

    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(VetError::Verifier(format!(
                "no JSON object in response: {:.80}",
                content
            )))
        }
    };

    serde_json::from_str::<Verdict>(json)
        .map(Verdict::clamped)
        .map_err(|e| VetError::Verifier(format!("invalid verdict JSON: {}", e)))
}
