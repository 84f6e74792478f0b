//! SQuAD v1.1 sample loading
//!
//! Experiments run over questions whose answers are likely to be PII (people,
//! places, organisations). Questions are kept when their lowercased text
//! contains any trigger phrase, in file order, until the sample budget is met.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::{Error, Result};

/// Trigger phrases used when none are configured.
pub const DEFAULT_TRIGGERS: &[&str] = &[
    "who",
    "where",
    "which company",
    "which organization",
    "which city",
    "name of",
];

/// One question with its context and reference answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub context: String,
    pub question: String,
    /// First reference answer, or empty when the question has none
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct SquadFile {
    data: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    context: String,
    qas: Vec<QuestionAnswers>,
}

#[derive(Debug, Deserialize)]
struct QuestionAnswers {
    question: String,
    #[serde(default)]
    answers: Vec<Answer>,
}

#[derive(Debug, Deserialize)]
struct Answer {
    text: String,
}

/// Load up to `limit` trigger-matching samples from a SQuAD JSON file.
pub fn load_squad(path: impl AsRef<Path>, limit: usize, triggers: &[String]) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Dataset(format!("failed to read {}: {e}", path.display())))?;

    let samples = parse_squad(&content, limit, triggers)?;
    info!(path = %path.display(), samples = samples.len(), "loaded PII-targeted samples");
    Ok(samples)
}

/// Parse SQuAD JSON and select samples; see [`load_squad`].
pub fn parse_squad(content: &str, limit: usize, triggers: &[String]) -> Result<Vec<Sample>> {
    let file: SquadFile = serde_json::from_str(content)
        .map_err(|e| Error::Dataset(format!("not a SQuAD v1.1 file: {e}")))?;

    let triggers: Vec<String> = triggers.iter().map(|t| t.to_lowercase()).collect();
    let mut samples = Vec::new();

    let questions = file
        .data
        .into_iter()
        .flat_map(|article| article.paragraphs)
        .flat_map(|paragraph| {
            let context = paragraph.context;
            paragraph
                .qas
                .into_iter()
                .map(move |qa| (context.clone(), qa))
        });

    for (context, qa) in questions {
        if samples.len() >= limit {
            break;
        }

        let lowered = qa.question.to_lowercase();
        if !triggers.iter().any(|t| lowered.contains(t.as_str())) {
            continue;
        }

        let answer = qa
            .answers
            .into_iter()
            .next()
            .map(|a| a.text)
            .unwrap_or_default();

        samples.push(Sample {
            context,
            question: qa.question,
            answer,
        });
    }

    Ok(samples)
}

/// Default triggers as owned strings, for config defaults.
pub fn default_triggers() -> Vec<String> {
    DEFAULT_TRIGGERS.iter().map(|t| t.to_string()).collect()
}

/// Split free text into documents on blank lines, trimming each one.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !buffer.is_empty() {
                paragraphs.push(buffer.join("\n"));
                buffer.clear();
            }
        } else {
            buffer.push(line.trim());
        }
    }

    // flush trailing paragraph
    if !buffer.is_empty() {
        paragraphs.push(buffer.join("\n"));
    }

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUAD: &str = r#"{
        "version": "1.1",
        "data": [{
            "title": "Science",
            "paragraphs": [
                {
                    "context": "Marie Curie was born in Warsaw.",
                    "qas": [
                        {"id": "1", "question": "Who was born in Warsaw?",
                         "answers": [{"answer_start": 0, "text": "Marie Curie"},
                                     {"answer_start": 6, "text": "Curie"}]},
                        {"id": "2", "question": "When was she born?",
                         "answers": [{"answer_start": 0, "text": "1867"}]},
                        {"id": "3", "question": "WHERE was Curie born?",
                         "answers": [{"answer_start": 24, "text": "Warsaw"}]}
                    ]
                },
                {
                    "context": "The Sorbonne is in Paris.",
                    "qas": [
                        {"id": "4", "question": "What is the name of the university?",
                         "answers": []}
                    ]
                }
            ]
        }]
    }"#;

    #[test]
    fn test_filters_by_trigger_case_insensitively() {
        let samples = parse_squad(SQUAD, 10, &default_triggers()).unwrap();
        let questions: Vec<_> = samples.iter().map(|s| s.question.as_str()).collect();
        assert_eq!(
            questions,
            vec![
                "Who was born in Warsaw?",
                "WHERE was Curie born?",
                "What is the name of the university?",
            ]
        );
    }

    #[test]
    fn test_takes_first_answer_or_empty() {
        let samples = parse_squad(SQUAD, 10, &default_triggers()).unwrap();
        assert_eq!(samples[0].answer, "Marie Curie");
        assert_eq!(samples[0].context, "Marie Curie was born in Warsaw.");
        assert_eq!(samples[2].answer, "");
    }

    #[test]
    fn test_respects_limit() {
        let samples = parse_squad(SQUAD, 1, &default_triggers()).unwrap();
        assert_eq!(samples.len(), 1);
        assert!(parse_squad(SQUAD, 0, &default_triggers()).unwrap().is_empty());
    }

    #[test]
    fn test_custom_triggers() {
        let samples = parse_squad(SQUAD, 10, &["when".to_string()]).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].answer, "1867");
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = parse_squad("{\"data\": 3}", 10, &default_triggers()).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_squad("/nonexistent/squad.json", 10, &default_triggers()).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }

    #[test]
    fn test_split_paragraphs() {
        let text = "First line\nstill first\n\n\n  Second  \n \nThird\n";
        assert_eq!(
            split_paragraphs(text),
            vec!["First line\nstill first", "Second", "Third"]
        );
        assert!(split_paragraphs("\n  \n").is_empty());
    }
}
