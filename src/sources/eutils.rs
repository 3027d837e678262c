//! NCBI E-utilities client for PubMed abstracts and PMC full text.
//!
//! Endpoints used:
//!   esearch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi
//!   efetch:  https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi

use std::time::Duration;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::blocking::Client;
use tracing::{debug, instrument};

use super::LiteratureSource;
use crate::error::{Error, Result};
use crate::records::{ArticleRecord, Source};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub struct EutilsClient {
    client: Client,
    source: Source,
    api_key: Option<String>,
}

impl EutilsClient {
    pub fn new(source: Source, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("genevidence/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            source,
            api_key,
        })
    }

    pub fn source(&self) -> Source {
        self.source
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", self.source.db().to_string())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }
}

impl LiteratureSource for EutilsClient {
    #[instrument(skip(self))]
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let mut params = self.base_params();
        params.push(("term", query.to_string()));
        params.push(("retmax", max_results.to_string()));
        params.push(("retmode", "json".to_string()));
        if self.source == Source::Pubmed {
            params.push(("sort", "relevance".to_string()));
        }

        let resp: serde_json::Value = self
            .client
            .get(ESEARCH_URL)
            .query(&params)
            .send()?
            .error_for_status()?
            .json()?;

        let ids = parse_id_list(&resp);
        debug!(?ids, db = self.source.db(), "esearch returned ids");
        Ok(ids)
    }

    #[instrument(skip(self))]
    fn fetch_detail(&self, id: &str) -> Result<Option<ArticleRecord>> {
        let mut params = self.base_params();
        params.push(("id", id.to_string()));
        params.push(("retmode", "xml".to_string()));

        let xml = self
            .client
            .get(EFETCH_URL)
            .query(&params)
            .send()?
            .error_for_status()?
            .text()?;

        match self.source {
            Source::Pubmed => parse_pubmed_article(id, &xml),
            Source::Pmc => parse_pmc_article(id, &xml),
        }
    }
}

fn parse_id_list(resp: &serde_json::Value) -> Vec<String> {
    resp["esearchresult"]["idlist"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Text,
    Surname,
    Given,
}

/// Text collected while inside a field element, including text of nested
/// inline markup such as `<i>` or `<sup>`.
struct Capture {
    field: Field,
    element: Vec<u8>,
    buf: String,
}

/// Shared state machine for both efetch flavours. Only the first record
/// element in the document is read.
struct ArticleParser {
    record_element: &'static [u8],
    record: Option<ArticleRecord>,
    capture: Option<Capture>,
    title_done: bool,
    text_done: bool,
    author: Option<(Option<String>, Option<String>)>,
    author_element: Vec<u8>,
    body_depth: usize,
    body: Vec<String>,
}

impl ArticleParser {
    fn new(record_element: &'static [u8]) -> Self {
        Self {
            record_element,
            record: None,
            capture: None,
            title_done: false,
            text_done: false,
            author: None,
            author_element: Vec::new(),
            body_depth: 0,
            body: Vec::new(),
        }
    }

    fn begin(&mut self, field: Field, element: &[u8]) {
        if self.capture.is_none() {
            self.capture = Some(Capture {
                field,
                element: element.to_vec(),
                buf: String::new(),
            });
        }
    }

    fn begin_author(&mut self, element: &[u8]) {
        self.author = Some((None, None));
        self.author_element = element.to_vec();
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = self.capture.as_mut() {
            capture.buf.push_str(text);
        }
        if self.body_depth > 0 {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                self.body.push(trimmed.to_string());
            }
        }
    }

    fn end(&mut self, name: &[u8]) -> bool {
        if self.capture.as_ref().is_some_and(|c| c.element == name) {
            if let Some(capture) = self.capture.take() {
                let value = collapse_whitespace(&capture.buf);
                match capture.field {
                    Field::Title => {
                        if let Some(r) = self.record.as_mut() {
                            r.title = value;
                        }
                        self.title_done = true;
                    }
                    Field::Text => {
                        if let Some(r) = self.record.as_mut() {
                            r.text = value;
                        }
                        self.text_done = true;
                    }
                    Field::Surname => {
                        if let Some(author) = self.author.as_mut() {
                            author.0 = Some(value);
                        }
                    }
                    Field::Given => {
                        if let Some(author) = self.author.as_mut() {
                            author.1 = Some(value);
                        }
                    }
                }
            }
        }

        if self.author.is_some() && self.author_element == name {
            if let Some((Some(last), Some(first))) = self.author.take() {
                if let Some(r) = self.record.as_mut() {
                    r.authors.push(format!("{} {}", last, first).trim().to_string());
                }
            }
        }

        name == self.record_element
    }

    fn finish_body(&mut self) {
        if let Some(r) = self.record.as_mut() {
            r.text = collapse_whitespace(&self.body.join(" "));
        }
    }
}

fn text_of(event: &quick_xml::events::BytesText<'_>) -> String {
    event
        .unescape()
        .map(|t| t.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(event).into_owned())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_author_contrib(e: &BytesStart<'_>) -> bool {
    matches!(
        e.try_get_attribute("contrib-type"),
        Ok(Some(attr)) if attr.value.as_ref() == b"author"
    )
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Xml(e.to_string())
}

/// Parse a PubMed efetch document. Title is `ArticleTitle`, text is the
/// first `AbstractText`, authors are `LastName ForeName` pairs.
pub fn parse_pubmed_article(id: &str, xml: &str) -> Result<Option<ArticleRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut parser = ArticleParser::new(b"PubmedArticle");
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(ref e) => {
                let name = e.local_name().as_ref().to_vec();
                if parser.record.is_none() {
                    if name == parser.record_element {
                        parser.record = Some(ArticleRecord::new(id, Some(Source::Pubmed)));
                    }
                } else {
                    match name.as_slice() {
                        b"ArticleTitle" if !parser.title_done => parser.begin(Field::Title, &name),
                        b"AbstractText" if !parser.text_done => parser.begin(Field::Text, &name),
                        b"Author" => parser.begin_author(&name),
                        b"LastName" if parser.author.is_some() => parser.begin(Field::Surname, &name),
                        b"ForeName" if parser.author.is_some() => parser.begin(Field::Given, &name),
                        _ => {}
                    }
                }
            }
            Event::Text(ref e) => parser.text(&text_of(e)),
            Event::CData(e) => parser.text(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(ref e) => {
                if parser.record.is_some() && parser.end(e.local_name().as_ref()) {
                    return Ok(parser.record.take());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match parser.record {
        Some(_) => Err(Error::Xml(format!("unterminated PubmedArticle for id {}", id))),
        None => Ok(None),
    }
}

/// Parse a PMC efetch document. Title is the first `article-title`, text is
/// every text node under `body` joined by spaces, authors are
/// `surname given-names` of `contrib[contrib-type=author]`.
pub fn parse_pmc_article(id: &str, xml: &str) -> Result<Option<ArticleRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut parser = ArticleParser::new(b"article");
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(ref e) => {
                let name = e.local_name().as_ref().to_vec();
                if parser.record.is_none() {
                    if name == parser.record_element {
                        parser.record = Some(ArticleRecord::new(id, Some(Source::Pmc)));
                    }
                } else {
                    match name.as_slice() {
                        b"article-title" if !parser.title_done => parser.begin(Field::Title, &name),
                        b"body" => parser.body_depth += 1,
                        b"contrib" if is_author_contrib(e) => parser.begin_author(&name),
                        b"surname" if parser.author.is_some() => parser.begin(Field::Surname, &name),
                        b"given-names" if parser.author.is_some() => parser.begin(Field::Given, &name),
                        _ => {}
                    }
                }
            }
            Event::Text(ref e) => parser.text(&text_of(e)),
            Event::CData(e) => parser.text(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(ref e) => {
                if parser.record.is_some() {
                    let name = e.local_name().as_ref().to_vec();
                    if name == b"body" {
                        parser.body_depth = parser.body_depth.saturating_sub(1);
                    }
                    if parser.end(&name) {
                        parser.finish_body();
                        return Ok(parser.record.take());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match parser.record {
        Some(_) => Err(Error::Xml(format!("unterminated PMC article for id {}", id))),
        None => Ok(None),
    }
}
