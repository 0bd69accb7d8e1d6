use serde::{Deserialize, Serialize};

/// Token accounting for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Running totals for a session.
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub request_count: u64,
}

impl UsageTracker {
    pub fn track(&mut self, usage: &TokenUsage) {
        self.total_prompt_tokens += usage.prompt_tokens as u64;
        self.total_completion_tokens += usage.completion_tokens as u64;
        self.request_count += 1;
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}
