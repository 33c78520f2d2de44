//! Heuristic token estimation for LLM text.
//!
//! The provider reports exact token counts only in its final usage events,
//! so mid-stream progress needs an approximation. This is a character/word
//! heuristic, not a real tokenizer: good enough to drive a progress bar,
//! never used for billing or context-limit decisions.

/// Average tokens produced per whitespace-separated word.
const WORD_TOKEN_RATIO: f64 = 1.3;

/// Weight per digit character. Multi-digit numbers compress to few tokens.
const DIGIT_TOKEN_WEIGHT: f64 = 0.25;

/// Weight per punctuation character (non-alphanumeric, non-whitespace).
const PUNCT_TOKEN_WEIGHT: f64 = 1.0;

/// Per-character discount for JSON-heavy text. Structural characters
/// tokenize more efficiently than the word ratio suggests.
const JSON_BIAS_PER_CHAR: f64 = 0.02;

/// Ceiling on the total JSON bias subtraction.
const JSON_BIAS_MAX: f64 = 40.0;

/// Estimate the LLM token count of `text`.
///
/// Pure and deterministic. The result is always within
/// `[ceil(len/5), ceil(len/2)]` for non-empty input, so pathological
/// inputs cannot produce absurd estimates. Empty input returns 0.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let len = text.chars().count();
    let words = text.split_whitespace().count();
    let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
    let punct = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();

    let raw = words as f64 * WORD_TOKEN_RATIO
        + digits as f64 * DIGIT_TOKEN_WEIGHT
        + punct as f64 * PUNCT_TOKEN_WEIGHT;

    let bias = (len as f64 * JSON_BIAS_PER_CHAR).min(JSON_BIAS_MAX);
    let estimate = (raw - bias).round().max(0.0) as usize;

    let floor = len.div_ceil(5);
    let ceiling = len.div_ceil(2);
    estimate.clamp(floor, ceiling)
}
