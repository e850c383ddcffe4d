//! Search terms from article text.

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "this", "that", "these",
    "those", "it", "its", "it's", "what", "which", "who", "when", "where", "why", "how",
    "about", "into", "through", "during", "before", "after", "above", "below", "between",
    "under", "again", "further", "then", "once", "said", "says", "their", "there", "they",
];

pub const MAX_KEYWORDS: usize = 5;

/// Up to [`MAX_KEYWORDS`] distinct lowercase terms longer than three
/// characters, in order of appearance. Falls back to the first long words
/// of the headline.
pub fn extract_keywords(headline: &str, commentary: &str) -> Vec<String> {
    let text = format!("{} {}", headline, commentary).to_lowercase();

    let mut keywords: Vec<String> = Vec::new();
    for word in text.split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ';' | ':')) {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.chars().count() <= 3 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !keywords.iter().any(|k| k == word) {
            keywords.push(word.to_string());
        }
        if keywords.len() >= MAX_KEYWORDS {
            break;
        }
    }

    if keywords.is_empty() {
        keywords = headline
            .split_whitespace()
            .take(3)
            .filter(|w| w.chars().count() > 3)
            .map(str::to_string)
            .collect();
    }

    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_stop_and_short_words() {
        let keywords = extract_keywords(
            "Wildfires spread across California",
            "Firefighters battle the wildfires, which spread quickly.",
        );
        assert_eq!(
            keywords,
            vec!["wildfires", "spread", "across", "california", "firefighters"]
        );
    }

    #[test]
    fn test_deduplicates_and_strips_punctuation() {
        let keywords = extract_keywords("\"Markets\" rally", "markets rally again (markets)");
        assert_eq!(keywords, vec!["markets", "rally"]);
    }

    #[test]
    fn test_headline_fallback() {
        assert!(extract_keywords("a to be", "it is on").is_empty());
        assert_eq!(extract_keywords("Ukraine", "").len(), 1);
    }
}
