//! Token estimation for context budget tracking.
//!
//! Uses the standard heuristic of ~4 characters per token for English text and
//! code. Images are charged a fixed character equivalent approximating the flat
//! ~258 token image cost, and every request carries a fixed structural overhead
//! for the system prompt and JSON envelope.

use super::types::TokenUsageStats;
use crate::session::Message;

/// Heuristic token counter using character-based estimation.
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    /// Characters per token ratio (default: 4)
    chars_per_token: usize,
    /// Character equivalent charged per attachment (default: 1100)
    image_char_equivalent: usize,
    /// Envelope/system prompt overhead in characters (default: 1000)
    structural_overhead_chars: usize,
}

impl HeuristicTokenCounter {
    /// Create a new heuristic counter with custom parameters.
    pub fn new(
        chars_per_token: usize,
        image_char_equivalent: usize,
        structural_overhead_chars: usize,
    ) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
            image_char_equivalent,
            structural_overhead_chars,
        }
    }

    /// Create with default parameters (chars/4, 1100 chars per image, 1000 chars overhead).
    pub fn with_defaults() -> Self {
        Self {
            chars_per_token: 4,
            image_char_equivalent: 1100,
            structural_overhead_chars: 1000,
        }
    }

    /// Count tokens in a plain text string.
    pub fn count_text(&self, text: &str) -> u32 {
        self.tokens_for_chars(text.chars().count())
    }

    /// Convert a character count into tokens, rounding up.
    pub fn tokens_for_chars(&self, chars: usize) -> u32 {
        let tokens = chars.div_ceil(self.chars_per_token);
        u32::try_from(tokens).unwrap_or(u32::MAX)
    }

    /// Character cost of a single message (content plus attachments).
    pub fn message_chars(&self, message: &Message) -> usize {
        message
            .content
            .chars()
            .count()
            .saturating_add(message.attachment_count().saturating_mul(self.image_char_equivalent))
    }

    /// Compute usage statistics for a transcript plus extra context against `limit`.
    pub fn usage(&self, messages: &[Message], extra_context: &str, limit: u32) -> TokenUsageStats {
        let mut char_count = 0usize;
        let mut image_count = 0usize;

        for message in messages {
            char_count = char_count.saturating_add(self.message_chars(message));
            image_count += message.attachment_count();
        }

        char_count = char_count
            .saturating_add(extra_context.chars().count())
            .saturating_add(self.structural_overhead_chars);

        TokenUsageStats::from_usage(self.tokens_for_chars(char_count), limit, image_count)
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Estimate tokens for `text` as `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> u32 {
    HeuristicTokenCounter::default().count_text(text)
}

/// Compute context usage with the default heuristic.
pub fn calculate_context_usage(
    messages: &[Message],
    extra_context: &str,
    limit: u32,
) -> TokenUsageStats {
    HeuristicTokenCounter::default().usage(messages, extra_context, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Attachment;

    fn image() -> Attachment {
        Attachment::new("img.png", "image/png", "AAAA")
    }

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(4001)), 1001);
    }

    #[test]
    fn estimate_tokens_counts_characters_not_bytes() {
        // 4 multi-byte characters are still one token
        assert_eq!(estimate_tokens("ñáéí"), 1);
    }

    #[test]
    fn empty_transcript_still_charges_overhead() {
        let stats = calculate_context_usage(&[], "", 100_000);
        assert_eq!(stats.used, 250);
        assert_eq!(stats.total, 100_000);
        assert_eq!(stats.image_count, 0);
        assert!(!stats.is_warning);
        assert!(!stats.is_critical);
    }

    #[test]
    fn attachments_and_extra_context_are_charged() {
        let messages = vec![
            Message::user("abcd", vec![image(), image()]),
            Message::model("efgh"),
        ];
        // 8 content chars + 2200 image chars + 4 context chars + 1000 overhead = 3212
        let stats = calculate_context_usage(&messages, "ctx!", 100_000);
        assert_eq!(stats.used, 803);
        assert_eq!(stats.image_count, 2);
    }

    #[test]
    fn is_pure_for_identical_inputs() {
        let messages = vec![Message::user("hello", vec![image()])];
        let first = calculate_context_usage(&messages, "code", 5_000);
        let second = calculate_context_usage(&messages, "code", 5_000);
        assert_eq!(first, second);
    }

    #[test]
    fn changing_only_limit_moves_thresholds() {
        let messages = vec![Message::user("x".repeat(34_000), vec![])];
        // (34000 + 1000) / 4 = 8750 tokens
        let roomy = calculate_context_usage(&messages, "", 100_000);
        let tight = calculate_context_usage(&messages, "", 10_000);
        let tiny = calculate_context_usage(&messages, "", 9_000);

        assert_eq!(roomy.used, tight.used);
        assert!(!roomy.is_warning);
        assert!(tight.is_warning && !tight.is_critical);
        assert!(tiny.is_critical);
        assert!((tiny.percentage - 97.22).abs() < 0.01);
    }

    #[test]
    fn content_of_three_point_nine_times_limit_is_critical() {
        let limit = 20_000u32;
        let messages = vec![Message::user("x".repeat((limit as usize * 39) / 10), vec![])];
        let stats = calculate_context_usage(&messages, "", limit);
        assert!(stats.is_critical);
        assert!(stats.is_warning);
    }

    #[test]
    fn percentage_is_capped_at_one_hundred() {
        let messages = vec![Message::user("x".repeat(1_000_000), vec![])];
        let stats = calculate_context_usage(&messages, "", 1_000);
        assert_eq!(stats.percentage, 100.0);
        assert_eq!(stats.remaining(), 0);
    }

    #[test]
    fn zero_limit_is_fully_consumed() {
        let stats = calculate_context_usage(&[], "", 0);
        assert_eq!(stats.percentage, 100.0);
        assert!(stats.is_critical);
    }

    #[test]
    fn custom_chars_per_token() {
        let counter = HeuristicTokenCounter::new(2, 0, 0);
        assert_eq!(counter.count_text("test"), 2);
        assert_eq!(counter.usage(&[Message::model("abc")], "", 100).used, 2);
    }
}
