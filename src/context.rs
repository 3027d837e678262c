//! Renders retrieved articles into the context block handed to the interpreter.

use crate::records::ArticleRecord;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFormatter {
    /// Maximum characters of article text per entry; `None` keeps it whole.
    pub abstract_limit: Option<usize>,
}

impl ContextFormatter {
    pub fn new(abstract_limit: Option<usize>) -> Self {
        Self { abstract_limit }
    }

    /// One `Title` / `Authors` / `Abstract` block per article, in input
    /// order, blocks separated by a blank line. Text cut by the limit ends
    /// with `...`.
    pub fn format<T: AsRef<ArticleRecord>>(&self, articles: &[T]) -> String {
        let mut context = String::new();
        for article in articles {
            let article = article.as_ref();
            context.push_str(&format!("Title: {}\n", article.title));
            context.push_str(&format!("Authors: {}\n", article.authors.join(", ")));
            context.push_str(&format!("Abstract: {}\n\n", self.abstract_text(&article.text)));
        }
        context.trim_end().to_string()
    }

    fn abstract_text(&self, text: &str) -> String {
        match self.abstract_limit {
            Some(limit) => match text.char_indices().nth(limit) {
                Some((cut, _)) => format!("{}...", &text[..cut]),
                None => text.to_string(),
            },
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, authors: &[&str], text: &str) -> ArticleRecord {
        ArticleRecord {
            id: "1".into(),
            title: title.into(),
            text: text.into(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            source: None,
        }
    }

    #[test]
    fn test_format_blocks() {
        let articles = vec![
            article("BRCA1 mutations", &["Smith J", "Doe R"], "BRCA1 is a risk factor."),
            article("TP53", &[], "Guardian of the genome."),
        ];
        let context = ContextFormatter::default().format(&articles);
        assert_eq!(
            context,
            "Title: BRCA1 mutations\nAuthors: Smith J, Doe R\nAbstract: BRCA1 is a risk factor.\n\n\
             Title: TP53\nAuthors: \nAbstract: Guardian of the genome."
        );
    }

    #[test]
    fn test_format_is_deterministic() {
        let articles = vec![article("A", &["X Y"], "text"), article("B", &[], "")];
        let formatter = ContextFormatter::new(Some(3));
        assert_eq!(formatter.format(&articles), formatter.format(&articles));
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let formatter = ContextFormatter::new(Some(4));
        let context = formatter.format(&[article("T", &[], "αβγδεζ")]);
        assert!(context.ends_with("Abstract: αβγδ..."));

        let context = formatter.format(&[article("T", &[], "abcd")]);
        assert!(context.ends_with("Abstract: abcd"));
    }

    #[test]
    fn test_empty_input() {
        let empty: Vec<ArticleRecord> = Vec::new();
        assert_eq!(ContextFormatter::default().format(&empty), "");
    }
}
