//! Phenotype background knowledge from the EBI Ontology Lookup Service.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::Result;

pub const DEFAULT_OLS_URL: &str = "https://www.ebi.ac.uk/ols4/api";

#[derive(Debug, Clone, PartialEq)]
pub struct OntologyTerm {
    pub label: String,
    pub id: String,
    pub definition: Option<String>,
    pub synonyms: Vec<String>,
    pub superclasses: Vec<String>,
}

impl OntologyTerm {
    pub fn render(&self) -> String {
        let mut lines = vec![format!("Label: {}", self.label), format!("ID: {}", self.id)];
        if let Some(definition) = &self.definition {
            lines.push(format!("Definition: {}", definition));
        }
        if !self.synonyms.is_empty() {
            lines.push(format!("Synonyms: {}", self.synonyms.join(", ")));
        }
        if !self.superclasses.is_empty() {
            lines.push(format!("Superclasses: {}", self.superclasses.join(", ")));
        }
        lines.join("\n")
    }
}

pub fn not_found(term: &str) -> String {
    format!("No ontology match found for '{}'", term)
}

pub struct OntologyClient {
    client: Client,
    base_url: String,
    ontology: String,
}

impl OntologyClient {
    pub fn new(base_url: &str, ontology: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            ontology: ontology.to_string(),
        })
    }

    /// Best matching term for `term`, rendered as text, or the
    /// [`not_found`] sentinel.
    pub fn lookup(&self, term: &str) -> Result<String> {
        Ok(match self.find(term)? {
            Some(found) => found.render(),
            None => not_found(term),
        })
    }

    #[instrument(skip(self))]
    pub fn find(&self, term: &str) -> Result<Option<OntologyTerm>> {
        let resp: Value = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", term),
                ("ontology", self.ontology.as_str()),
                ("rows", "1"),
                ("exact", "false"),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        let Some(mut found) = parse_search_response(&resp) else {
            debug!(term, "no ontology match");
            return Ok(None);
        };

        let parents: Value = self
            .client
            .get(format!("{}/ontologies/{}/parents", self.base_url, self.ontology))
            .query(&[("id", found.id.as_str())])
            .send()?
            .error_for_status()?
            .json()?;
        found.superclasses = parse_parent_labels(&parents);
        Ok(Some(found))
    }
}

fn markup() -> &'static Regex {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

pub fn strip_markup(s: &str) -> String {
    markup().replace_all(s, "").trim().to_string()
}

/// OLS fields are sometimes a string and sometimes a list of strings.
fn strings(v: &Value) -> Vec<String> {
    match v {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|i| i.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn parse_search_response(resp: &Value) -> Option<OntologyTerm> {
    let doc = resp["response"]["docs"].as_array()?.first()?;
    let label = doc["label"].as_str()?.to_string();
    let id = doc["obo_id"]
        .as_str()
        .or_else(|| doc["short_form"].as_str())?
        .replace('_', ":");

    let definition = strings(&doc["description"])
        .into_iter()
        .map(|d| strip_markup(&d))
        .find(|d| !d.is_empty());
    let synonyms = strings(&doc["synonym"])
        .into_iter()
        .chain(strings(&doc["exact_synonyms"]))
        .map(|s| strip_markup(&s))
        .filter(|s| !s.is_empty())
        .collect();

    Some(OntologyTerm {
        label,
        id,
        definition,
        synonyms,
        superclasses: Vec::new(),
    })
}

pub fn parse_parent_labels(resp: &Value) -> Vec<String> {
    resp["_embedded"]["terms"]
        .as_array()
        .map(|terms| {
            terms
                .iter()
                .filter_map(|t| t["label"].as_str())
                .map(strip_markup)
                .filter(|l| !l.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_search_response() {
        let resp = json!({
            "response": {
                "numFound": 1,
                "docs": [{
                    "label": "Seizure",
                    "obo_id": "HP:0001250",
                    "description": ["A <b>seizure</b> is an intermittent abnormality."],
                    "synonym": ["Epileptic seizure", "Seizures"]
                }]
            }
        });
        let term = parse_search_response(&resp).unwrap();
        assert_eq!(term.id, "HP:0001250");
        assert_eq!(
            term.definition.as_deref(),
            Some("A seizure is an intermittent abnormality.")
        );
        assert_eq!(term.synonyms, vec!["Epileptic seizure", "Seizures"]);
    }

    #[test]
    fn test_empty_search_response() {
        let resp = json!({"response": {"numFound": 0, "docs": []}});
        assert_eq!(parse_search_response(&resp), None);
        assert_eq!(not_found("xyz"), "No ontology match found for 'xyz'");
    }

    #[test]
    fn test_parent_labels_are_stripped() {
        let resp = json!({"_embedded": {"terms": [
            {"label": "Abnormality of the <i>nervous system</i>"},
            {"label": "<span></span>"}
        ]}});
        assert_eq!(
            parse_parent_labels(&resp),
            vec!["Abnormality of the nervous system"]
        );
    }

    #[test]
    fn test_render_skips_absent_fields() {
        let term = OntologyTerm {
            label: "Ataxia".into(),
            id: "HP:0001251".into(),
            definition: None,
            synonyms: vec![],
            superclasses: vec!["Abnormal coordination".into()],
        };
        assert_eq!(
            term.render(),
            "Label: Ataxia\nID: HP:0001251\nSuperclasses: Abnormal coordination"
        );
    }
}
