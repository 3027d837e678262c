use serde::{Deserialize, Serialize};

/// Literature database an article came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Pubmed,
    Pmc,
}

impl Source {
    /// E-utilities `db` parameter for this source.
    pub fn db(&self) -> &'static str {
        match self {
            Source::Pubmed => "pubmed",
            Source::Pmc => "pmc",
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pubmed" => Ok(Source::Pubmed),
            "pmc" => Ok(Source::Pmc),
            other => Err(format!("unknown literature source '{}'", other)),
        }
    }
}

/// One article as returned by a literature source.
///
/// Optional fields are plain strings and lists that default to empty, so a
/// record built from a sparse response never carries a missing title or
/// abstract.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleRecord {
    #[serde(alias = "pubmed_id", alias = "pmcid")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "full_text", alias = "abstract")]
    pub text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub source: Option<Source>,
}

impl ArticleRecord {
    pub fn new(id: impl Into<String>, source: Option<Source>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            text: String::new(),
            authors: Vec::new(),
            source,
        }
    }
}

impl AsRef<ArticleRecord> for ArticleRecord {
    fn as_ref(&self) -> &ArticleRecord {
        self
    }
}

/// A bounded slice of an article's text; the unit that gets embedded.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChunkRecord {
    #[serde(alias = "pubmed_id", alias = "pmcid")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub chunk_id: usize,
    pub text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub source: Option<Source>,
}

impl ChunkRecord {
    pub fn to_article(&self) -> ArticleRecord {
        ArticleRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            text: self.text.clone(),
            authors: self.authors.clone(),
            source: self.source,
        }
    }
}

/// A retrieved record. `chunk_id` and `score` are set in semantic mode only;
/// `score` is a squared L2 distance, lower is closer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    #[serde(flatten)]
    pub record: ArticleRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl From<ArticleRecord> for Evidence {
    fn from(record: ArticleRecord) -> Self {
        Self {
            record,
            chunk_id: None,
            score: None,
        }
    }
}

impl AsRef<ArticleRecord> for Evidence {
    fn as_ref(&self) -> &ArticleRecord {
        &self.record
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Gene,
    Phenotype,
}

/// Normalized retrieval key. Gene symbols keep their case, phenotype terms
/// are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    kind: EntityKind,
    name: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, raw: &str) -> Self {
        let trimmed = raw.trim();
        let name = match kind {
            EntityKind::Gene => trimmed.to_string(),
            EntityKind::Phenotype => trimmed.to_lowercase(),
        };
        Self { kind, name }
    }

    pub fn gene(symbol: &str) -> Self {
        Self::new(EntityKind::Gene, symbol)
    }

    pub fn phenotype(term: &str) -> Self {
        Self::new(EntityKind::Phenotype, term)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_normalization() {
        assert_eq!(EntityKey::gene("  BRCA1 ").as_str(), "BRCA1");
        assert_eq!(EntityKey::gene("c9orf72").as_str(), "c9orf72");
        assert_eq!(EntityKey::phenotype(" Breast Cancer").as_str(), "breast cancer");
    }

    #[test]
    fn test_legacy_article_json() {
        let json = r#"{"pubmed_id": "123", "title": "T", "text": "abc", "authors": ["Smith John"]}"#;
        let record: ArticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "123");
        assert_eq!(record.source, None);

        let json = r#"{"pmcid": "PMC9", "full_text": "body"}"#;
        let record: ArticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "PMC9");
        assert_eq!(record.text, "body");
        assert!(record.title.is_empty());
        assert!(record.authors.is_empty());
    }

    #[test]
    fn test_source_roundtrip_name() {
        let json = serde_json::to_string(&Source::Pmc).unwrap();
        assert_eq!(json, "\"pmc\"");
        assert_eq!("PubMed".parse::<Source>().unwrap(), Source::Pubmed);
        assert!("arxiv".parse::<Source>().is_err());
    }

    #[test]
    fn test_entity_keys_dedupe_in_sets() {
        let keys: std::collections::HashSet<EntityKey> = [
            EntityKey::gene("BRCA1"),
            EntityKey::gene(" BRCA1 "),
            EntityKey::phenotype("Seizure"),
            EntityKey::phenotype("seizure"),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 2);
    }
}
