//! Prompt templates for the review, rewrite, run and chat calls

use crate::client::{CompletionRequest, Message};

/// Low randomness for review and rewrite
pub const REVIEW_TEMPERATURE: f32 = 0.2;

/// Headers the review must use, highest severity first
pub const SEVERITY_HEADERS: [&str; 4] = [
    "Critical Issues",
    "High Priority",
    "Medium Priority",
    "Low Priority",
];

/// Languages whose simulated output is a renderable HTML page
const WEB_LANGUAGES: &[&str] = &["html", "css", "svg", "xml"];

pub fn is_web_language(language: &str) -> bool {
    let lang = language.trim().to_ascii_lowercase();
    WEB_LANGUAGES.contains(&lang.as_str())
}

fn code_message(code: &str, language: &str) -> String {
    format!("Language: {}\n\nCODE:\n{}", language, code)
}

pub fn review_system_prompt(focus_areas: &[String]) -> String {
    let mut prompt = format!(
        "You are an Expert Code Reviewer. Analyze the code focusing on: {}.\n\
         CRITICAL: You MUST use these exact markdown headers:\n",
        focus_areas.join(", ")
    );
    for header in SEVERITY_HEADERS {
        prompt.push_str("### ");
        prompt.push_str(header);
        prompt.push('\n');
    }
    prompt.push_str("Provide specific code examples where relevant.");
    prompt
}

pub const REWRITE_SYSTEM_PROMPT: &str = "You are a Senior Principal Developer. Refactor and optimize the provided code.\n\
Format your response as follows:\n\
Brief summary of improvements (bullet points).\n\
---\n\
```[language]\n\
[FULL REWRITTEN CODE]\n\
```";

pub fn run_system_prompt(language: &str) -> String {
    let mut prompt =
        String::from("Simulate execution. Return ONLY JSON with \"stdout\" and \"stderr\" keys.");
    if is_web_language(language) {
        prompt.push_str(
            " This is web code: \"stdout\" MUST be a complete, self-contained HTML document \
             that renders the result. If only CSS is given, include sample markup that uses it.",
        );
    }
    prompt
}

pub fn chat_system_prompt(code: &str) -> String {
    format!("Context: {}", code)
}

pub fn review_request(model: &str, code: &str, language: &str, focus_areas: &[String]) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        messages: vec![
            Message::system(review_system_prompt(focus_areas)),
            Message::user(code_message(code, language)),
        ],
        temperature: Some(REVIEW_TEMPERATURE),
        json_mode: false,
    }
}

pub fn rewrite_request(model: &str, code: &str, language: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        messages: vec![
            Message::system(REWRITE_SYSTEM_PROMPT),
            Message::user(code_message(code, language)),
        ],
        temperature: Some(REVIEW_TEMPERATURE),
        json_mode: false,
    }
}

pub fn run_request(model: &str, code: &str, language: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        messages: vec![
            Message::system(run_system_prompt(language)),
            Message::user(format!("Language: {}\nCODE:\n{}", language, code)),
        ],
        temperature: None,
        json_mode: true,
    }
}

/// System context, prior transcript, then the new user message
pub fn chat_request(model: &str, code: &str, transcript: Vec<Message>, new_message: &str) -> CompletionRequest {
    let mut messages = Vec::with_capacity(transcript.len() + 2);
    messages.push(Message::system(chat_system_prompt(code)));
    messages.extend(transcript);
    messages.push(Message::user(new_message));

    CompletionRequest {
        model: model.to_string(),
        messages,
        temperature: None,
        json_mode: false,
    }
}
