use serde::{
    Deserialize,
    Serialize,
};

/// Languages the runner knows how to build and execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    Python,
    #[default]
    Java,
}

impl Language {
    /// Maps a request tag onto a language. Anything that is not a python
    /// tag is treated as java.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Language::Python,
            _ => Language::Java,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ExecutionPayload {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub stdin: Option<String>,
}

/// A single submission, built from the payload and dropped once the
/// response is written.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: Language,
    pub stdin: String,
}

impl From<ExecutionPayload> for ExecutionRequest {
    fn from(payload: ExecutionPayload) -> Self {
        ExecutionRequest {
            source: payload.code,
            language: payload
                .lang
                .as_deref()
                .map(Language::from_tag)
                .unwrap_or_default(),
            stdin: payload.stdin.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ExecutionResult {
    pub output: String,
}
