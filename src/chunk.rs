//! Text cleaning and word-packing chunker.

use std::sync::OnceLock;

use regex::Regex;

use crate::records::{ArticleRecord, ChunkRecord};

pub const DEFAULT_MAX_LENGTH: usize = 512;

fn whitespace() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn disallowed() -> &'static Regex {
    static PUNCT: OnceLock<Regex> = OnceLock::new();
    PUNCT.get_or_init(|| Regex::new(r"[^\w\s-]").expect("static regex"))
}

/// Collapse whitespace runs to one space and drop everything except word
/// characters, whitespace and hyphens.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let collapsed = whitespace().replace_all(text, " ");
    disallowed().replace_all(&collapsed, "").trim().to_string()
}

/// Pack whitespace-separated words into chunks. Every word costs its length
/// in characters plus one separator; a chunk is closed as soon as the next
/// word would push it past `max_length`. A single word longer than the
/// budget still forms its own chunk.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_length = 0;

    for word in text.split_whitespace() {
        let cost = word.chars().count() + 1;
        if !current.is_empty() && current_length + cost > max_length {
            chunks.push(current.join(" "));
            current.clear();
            current_length = 0;
        }
        current.push(word);
        current_length += cost;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

/// Clean and chunk every article's text. Articles with no text produce no
/// chunks; `chunk_id` restarts at 0 for each article.
pub fn chunk_articles(articles: &[ArticleRecord], max_length: usize) -> Vec<ChunkRecord> {
    articles
        .iter()
        .flat_map(|article| {
            chunk_text(&clean_text(&article.text), max_length)
                .into_iter()
                .enumerate()
                .map(move |(chunk_id, text)| ChunkRecord {
                    id: article.id.clone(),
                    title: article.title.clone(),
                    chunk_id,
                    text,
                    authors: article.authors.clone(),
                    source: article.source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Source;

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("  BRCA1\t(p.Cys61Gly)\n\nvariant; de-novo!  "),
            "BRCA1 pCys61Gly variant de-novo"
        );
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_strict_packing() {
        assert_eq!(chunk_text("a b c d", 3), vec!["a", "b", "c", "d"]);
        assert_eq!(chunk_text("a b c d", 4), vec!["a b", "c d"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("", 512).is_empty());
        assert!(chunk_text("   \n ", 512).is_empty());
    }

    #[test]
    fn test_oversized_word_is_own_chunk() {
        assert_eq!(
            chunk_text("ab supercalifragilistic cd", 5),
            vec!["ab", "supercalifragilistic", "cd"]
        );
    }

    #[test]
    fn test_chunks_preserve_word_sequence() {
        let text = "The BRCA1 gene has been identified as a major risk factor for \
                    hereditary breast cancer and several pathogenic variants have \
                    been characterized in diverse populations";
        for max_length in [1, 7, 16, 40, 512] {
            let chunks = chunk_text(text, max_length);
            let rejoined = chunks.join(" ");
            assert_eq!(
                rejoined.split_whitespace().collect::<Vec<_>>(),
                text.split_whitespace().collect::<Vec<_>>()
            );
            for chunk in &chunks {
                let words: Vec<_> = chunk.split(' ').collect();
                let last = words[words.len() - 1].chars().count();
                let before_last = chunk.chars().count() + 1 - (last + 1);
                assert!(before_last <= max_length || words.len() == 1);
                assert!(chunk.chars().count() + 1 <= max_length + last + 1);
            }
        }
    }

    #[test]
    fn test_chunk_articles_ids() {
        let articles = vec![
            ArticleRecord {
                id: "1".into(),
                title: "One".into(),
                text: "alpha beta gamma delta".into(),
                authors: vec!["Smith John".into()],
                source: Some(Source::Pubmed),
            },
            ArticleRecord::new("2", Some(Source::Pubmed)),
            ArticleRecord {
                id: "3".into(),
                title: "Three".into(),
                text: "epsilon".into(),
                authors: vec![],
                source: None,
            },
        ];
        let chunks = chunk_articles(&articles, 12);
        let ids: Vec<_> = chunks.iter().map(|c| (c.id.as_str(), c.chunk_id)).collect();
        assert_eq!(ids, vec![("1", 0), ("1", 1), ("3", 0)]);
        assert_eq!(chunks[1].title, "One");
        assert_eq!(chunks[1].authors, vec!["Smith John"]);
        assert_eq!(chunks[1].text, "gamma delta");
    }
}
