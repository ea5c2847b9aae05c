//! Suffix-stripping stemmer and stopword list for the lexical embedder.
//!
//! Two passes: inflectional endings first, then one derivational ending, so that
//! "authentication", "authenticate" and "authenticated" share the stem "authentic".

/// Shortest stem a suffix rule may leave behind.
const MIN_STEM: usize = 3;

/// (suffix, replacement), first match wins.
const INFLECTIONAL: &[(&str, &str)] = &[
    ("sses", "ss"),
    ("ies", "y"),
    ("ating", "ate"),
    ("ated", "ate"),
    ("ing", ""),
    ("ed", ""),
    ("ss", "ss"),
    ("us", "us"),
    ("is", "is"),
    ("s", ""),
];

const DERIVATIONAL: &[(&str, &str)] = &[
    ("ization", ""),
    ("ational", ""),
    ("ation", ""),
    ("ition", ""),
    ("ement", ""),
    ("ment", ""),
    ("ness", ""),
    ("able", ""),
    ("ible", ""),
    ("ity", ""),
    ("ive", ""),
    ("ate", ""),
    ("ion", ""),
    ("ous", ""),
    ("ful", ""),
    ("al", ""),
    ("er", ""),
    ("or", ""),
    ("ly", ""),
];

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "will", "with",
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Stem a lowercase token. Tokens with digits or symbols (requirement ids) are kept as is.
pub fn stem(token: &str) -> String {
    if token.len() <= MIN_STEM || !token.chars().all(|c| c.is_ascii_lowercase()) {
        return token.to_string();
    }
    let word = strip_suffix(token, INFLECTIONAL);
    let mut word = strip_suffix(&word, DERIVATIONAL);
    if word.len() > MIN_STEM + 1 && word.ends_with('e') {
        word.pop();
    }
    word
}

fn strip_suffix(word: &str, rules: &[(&str, &str)]) -> String {
    for &(suffix, replacement) in rules {
        if word.len() >= suffix.len() + MIN_STEM && word.ends_with(suffix) {
            return format!("{}{}", &word[..word.len() - suffix.len()], replacement);
        }
    }
    word.to_string()
}
