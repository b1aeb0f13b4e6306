//! AI-generated content likelihood estimation.
//!
//! Lexical heuristics over the homepage copy: marker phrases common in
//! machine-written marketing text, unnaturally uniform sentence lengths, and
//! template-phrase density. Deterministic for a fixed input; the score is a
//! likelihood hint, not a verdict.

use async_trait::async_trait;
use scraper::Html;
use serde_json::json;

use crate::models::{DataPoint, DataPointKey, FetchSource};

use super::{Analyzer, TaskContext, TaskError};

/// Phrases disproportionately common in generated marketing copy.
const MARKER_PHRASES: &[&str] = &[
    "in today's fast-paced world",
    "unlock the power",
    "look no further",
    "elevate your",
    "delve into",
    "seamlessly integrate",
    "comprehensive solution",
    "cutting-edge",
    "revolutionize the way",
    "unparalleled",
    "empower your",
    "take your business to the next level",
    "in conclusion",
    "whether you're a",
    "game-changer",
];

/// Estimates how likely the homepage copy is machine-generated.
///
/// Homepage-only and always runs, authorized or not.
pub struct AiContentAnalyzer;

#[async_trait]
impl Analyzer for AiContentAnalyzer {
    fn key(&self) -> DataPointKey {
        DataPointKey::AiGeneratedLikelihood
    }

    fn name(&self) -> &'static str {
        "ai-likelihood"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<Vec<DataPoint>, TaskError> {
        // Use the crawled homepage when available, otherwise fetch it.
        let (source_url, body) = match ctx
            .pages
            .values()
            .find(|p| p.url.trim_end_matches('/') == ctx.url.trim_end_matches('/'))
        {
            Some(page) => (page.url.clone(), page.body.clone()),
            None => {
                let page = ctx.client.fetch(&ctx.url, FetchSource::Homepage).await?;
                if !page.is_success() {
                    return Err(TaskError::NoContent(format!(
                        "homepage returned {}",
                        page.status
                    )));
                }
                (page.url.clone(), page.body)
            }
        };

        let text = visible_text(&body);
        let assessment = assess(&text);

        let payload = json!({
            "score": assessment.score,
            "band": assessment.band,
            "markers_found": assessment.markers,
            "sentence_count": assessment.sentence_count,
            "mean_sentence_words": assessment.mean_sentence_words,
        });

        Ok(vec![DataPoint::new(
            DataPointKey::AiGeneratedLikelihood,
            "AI-generated content likelihood",
            payload,
        )
        .with_sources(vec![source_url])
        .with_raw_response(format!("{} chars analyzed", text.len()))])
    }
}

struct Assessment {
    score: u32,
    band: &'static str,
    markers: Vec<String>,
    sentence_count: usize,
    mean_sentence_words: f64,
}

/// Strip tags and scripts, returning readable page text.
fn visible_text(html: &str) -> String {
    // Script and style bodies are text nodes too; drop them up front.
    let stripped = regex::Regex::new(r"(?si)<(script|style)[^>]*>.*?</(script|style)>")
        .expect("static regex")
        .replace_all(html, " ");
    let document = Html::parse_document(&stripped);
    let mut out = String::new();
    for node in document.root_element().text() {
        let trimmed = node.trim();
        if !trimmed.is_empty() {
            out.push_str(trimmed);
            out.push(' ');
        }
    }
    out
}

/// Score text 0-100 for machine-generation likelihood.
fn assess(text: &str) -> Assessment {
    let lower = text.to_lowercase();

    let markers: Vec<String> = MARKER_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .map(|p| p.to_string())
        .collect();

    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.split_whitespace().count() >= 3)
        .collect();
    let sentence_count = sentences.len();

    let lengths: Vec<f64> = sentences
        .iter()
        .map(|s| s.split_whitespace().count() as f64)
        .collect();
    let mean = if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<f64>() / lengths.len() as f64
    };
    let variance = if lengths.len() < 2 {
        f64::MAX
    } else {
        lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lengths.len() as f64
    };

    // Marker phrases dominate the score; uniform sentence rhythm adds to it.
    let mut score = (markers.len() as u32) * 18;
    if sentence_count >= 5 {
        let cv = variance.sqrt() / mean.max(1.0);
        if cv < 0.25 {
            score += 30;
        } else if cv < 0.40 {
            score += 15;
        }
    }
    let score = score.min(100);

    let band = match score {
        0..=29 => "unlikely",
        30..=59 => "possible",
        _ => "likely",
    };

    Assessment {
        score,
        band,
        markers,
        sentence_count,
        mean_sentence_words: mean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prose_scores_low() {
        let a = assess(
            "We are a family bakery. Opened in 1987 by Rosa. \
             Bread is baked each morning at five. Come say hello when you visit the market. \
             Closed on Mondays and most public holidays, sorry about that.",
        );
        assert!(a.score < 30, "score was {}", a.score);
        assert_eq!(a.band, "unlikely");
    }

    #[test]
    fn marker_heavy_copy_scores_high() {
        let a = assess(
            "Unlock the power of our comprehensive solution. In today's fast-paced world, \
             our cutting-edge platform will revolutionize the way you work. Look no further \
             than our unparalleled service. Elevate your business with seamless tools today.",
        );
        assert!(a.score >= 60, "score was {}", a.score);
        assert_eq!(a.band, "likely");
        assert!(a.markers.len() >= 4);
    }

    #[test]
    fn deterministic_and_clamped() {
        let text = "Unlock the power of everything. ".repeat(50);
        let first = assess(&text).score;
        let second = assess(&text).score;
        assert_eq!(first, second);
        assert!(first <= 100);
    }

    #[test]
    fn strips_markup() {
        let text = visible_text("<html><body><h1>Hello</h1><p>world</p></body></html>");
        assert_eq!(text.trim(), "Hello world");
    }
}
