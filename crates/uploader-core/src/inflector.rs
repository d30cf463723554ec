//! Name inflection helpers
//!
//! Just enough inflection for path templates: table names for `:model` and
//! URL-safe slugs for stored file names.

use once_cell::sync::Lazy;
use regex::Regex;

static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z\d])([A-Z])|([A-Z]+)([A-Z][a-z])").expect("valid regex"));

static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9\s]").expect("valid regex"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Words whose plural is the same word
const UNCOUNTABLE: &[&str] = &["equipment", "information", "media", "news", "series", "species"];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
];

const TRANSLITERATION: &[(char, &str)] = &[
    ('ä', "ae"), ('æ', "ae"), ('ö', "oe"), ('ø', "oe"), ('ü', "ue"), ('ß', "ss"),
    ('Ä', "Ae"), ('Æ', "Ae"), ('Ö', "Oe"), ('Ø', "Oe"), ('Ü', "Ue"),
    ('à', "a"), ('á', "a"), ('â', "a"), ('ã', "a"), ('å', "a"),
    ('À', "A"), ('Á', "A"), ('Â', "A"), ('Ã', "A"), ('Å', "A"),
    ('ç', "c"), ('Ç', "C"),
    ('è', "e"), ('é', "e"), ('ê', "e"), ('ë', "e"),
    ('È', "E"), ('É', "E"), ('Ê', "E"), ('Ë', "E"),
    ('ì', "i"), ('í', "i"), ('î', "i"), ('ï', "i"),
    ('Ì', "I"), ('Í', "I"), ('Î', "I"), ('Ï', "I"),
    ('ñ', "n"), ('Ñ', "N"),
    ('ò', "o"), ('ó', "o"), ('ô', "o"), ('õ', "o"),
    ('Ò', "O"), ('Ó', "O"), ('Ô', "O"), ('Õ', "O"),
    ('ù', "u"), ('ú', "u"), ('û', "u"),
    ('Ù', "U"), ('Ú', "U"), ('Û', "U"),
    ('ý', "y"), ('ÿ', "y"), ('Ý', "Y"),
];

/// `BlogPost` -> `blog_post`
pub fn underscore(name: &str) -> String {
    let spaced = CAMEL_BOUNDARY.replace_all(name, |caps: &regex::Captures<'_>| {
        match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
            (Some(a), Some(b), _, _) => format!("{}_{}", a.as_str(), b.as_str()),
            (_, _, Some(a), Some(b)) => format!("{}_{}", a.as_str(), b.as_str()),
            _ => caps[0].to_string(),
        }
    });
    spaced.replace(['-', ' '], "_").to_lowercase()
}

/// Plural of a lower-cased word
pub fn pluralize(word: &str) -> String {
    if word.is_empty() || UNCOUNTABLE.contains(&word) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == word) {
        return plural.to_string();
    }

    let consonant_y = word.ends_with('y')
        && !word[..word.len() - 1].ends_with(['a', 'e', 'i', 'o', 'u']);
    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if word.ends_with(['s', 'x', 'z']) || word.ends_with("ch") || word.ends_with("sh") {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// Table name of a model: `BlogPost` -> `blog_posts`
pub fn tableize(model: &str) -> String {
    let underscored = underscore(model);
    match underscored.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, pluralize(last)),
        None => pluralize(&underscored),
    }
}

/// URL-safe slug: transliterates common accents, turns everything else that
/// is not ASCII alphanumeric into `_`, collapses runs and trims the ends.
pub fn slug(text: &str) -> String {
    let mut transliterated = String::with_capacity(text.len());
    for c in text.chars() {
        match TRANSLITERATION.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => transliterated.push_str(to),
            None => transliterated.push(c),
        }
    }

    let cleaned = NON_SLUG_CHARS.replace_all(&transliterated, " ");
    let joined = WHITESPACE_RUN.replace_all(cleaned.trim(), "_");
    joined.trim_matches('_').to_string()
}
