//! TEI bibliography extraction.
//!
//! Parses the TEI XML produced by a GROBID-style conversion service and turns
//! every `listBibl/biblStruct` entry into a [`ReferenceRecord`]. The header
//! `biblStruct` describing the paper itself sits outside `listBibl` and is
//! ignored.
//!
//! Elements are matched by local name, so both prefixed (`tei:title`) and
//! default-namespace documents work.

use std::path::Path;

use citecheck_core::ReferenceRecord;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("malformed TEI XML: {0}")]
    Xml(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which field we're currently reading text for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    AnalyticTitle,
    MonogrTitle,
    Date,
    Doi,
    Forename,
    Surname,
}

struct Capture {
    field: Field,
    /// Stack depth of the element being captured.
    depth: usize,
    text: String,
}

#[derive(Default)]
struct AuthorBuilder {
    depth: usize,
    forename: Option<String>,
    surname: Option<String>,
}

impl AuthorBuilder {
    fn display_name(&self) -> String {
        [self.forename.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Accumulates one `biblStruct`. Each field keeps the first matching element
/// it sees, even when that element turns out to be empty.
#[derive(Default)]
struct BiblBuilder {
    depth: usize,
    analytic_title: Option<String>,
    monogr_title: Option<String>,
    date: Option<String>,
    doi: Option<String>,
    authors: Vec<String>,
    author: Option<AuthorBuilder>,
    capture: Option<Capture>,
}

impl BiblBuilder {
    fn open(&mut self, name: &[u8], parent: &[u8], grandparent: &[u8], e: &BytesStart<'_>, depth: usize) {
        if self.capture.is_some() {
            // Inline markup inside a captured field: keep accumulating text.
            return;
        }

        let field = match name {
            b"title" if parent == b"analytic" && self.analytic_title.is_none() => {
                Some(Field::AnalyticTitle)
            }
            b"title" if parent == b"monogr" && self.monogr_title.is_none() => {
                Some(Field::MonogrTitle)
            }
            b"date" if parent == b"imprint" && grandparent == b"monogr" && self.date.is_none() => {
                match attribute(e, b"when").filter(|w| !w.trim().is_empty()) {
                    Some(when) => {
                        self.date = Some(when.trim().to_string());
                        None
                    }
                    None => Some(Field::Date),
                }
            }
            b"idno"
                if self.doi.is_none()
                    && attribute(e, b"type").is_some_and(|t| t.eq_ignore_ascii_case("DOI")) =>
            {
                Some(Field::Doi)
            }
            b"author" if parent == b"analytic" => {
                self.author = Some(AuthorBuilder {
                    depth,
                    ..Default::default()
                });
                None
            }
            b"forename" if self.author.as_ref().is_some_and(|a| a.forename.is_none()) => {
                Some(Field::Forename)
            }
            b"surname" if self.author.as_ref().is_some_and(|a| a.surname.is_none()) => {
                Some(Field::Surname)
            }
            _ => None,
        };

        if let Some(field) = field {
            self.capture = Some(Capture {
                field,
                depth,
                text: String::new(),
            });
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(ref mut capture) = self.capture {
            capture.text.push_str(text);
        }
    }

    fn close(&mut self, depth: usize) {
        if self.capture.as_ref().is_some_and(|c| c.depth == depth)
            && let Some(capture) = self.capture.take()
        {
            let value = collapse_whitespace(&capture.text);
            match capture.field {
                Field::AnalyticTitle => self.analytic_title = Some(value),
                Field::MonogrTitle => self.monogr_title = Some(value),
                Field::Date => self.date = Some(value),
                Field::Doi => self.doi = Some(value),
                Field::Forename => {
                    if let Some(ref mut author) = self.author {
                        author.forename = Some(value);
                    }
                }
                Field::Surname => {
                    if let Some(ref mut author) = self.author {
                        author.surname = Some(value);
                    }
                }
            }
        }

        if self.author.as_ref().is_some_and(|a| a.depth == depth)
            && let Some(author) = self.author.take()
        {
            let name = author.display_name();
            if !name.is_empty() {
                self.authors.push(name);
            }
        }
    }

    fn finish(self) -> ReferenceRecord {
        let title = self
            .analytic_title
            .or(self.monogr_title)
            .unwrap_or_default();
        ReferenceRecord::new(
            title,
            self.date.unwrap_or_default(),
            self.doi.unwrap_or_default(),
            self.authors,
        )
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract every reference from a TEI document.
///
/// Returns an error for malformed XML or a document without a root element;
/// a well-formed document with no `listBibl` yields an empty list.
pub fn extract_references(tei_xml: &str) -> Result<Vec<ReferenceRecord>, ExtractError> {
    let mut xml = Reader::from_str(tei_xml);
    xml.config_mut().trim_text(false);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<BiblBuilder> = None;
    let mut records = Vec::new();
    let mut saw_root = false;

    loop {
        let event = xml.read_event().map_err(|e| {
            ExtractError::Xml(format!("at byte {}: {}", xml.buffer_position(), e))
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                saw_root = true;
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.local_name().as_ref().to_vec();
                let depth = stack.len();
                let parent = stack.last().map(Vec::as_slice).unwrap_or(b"");
                let grandparent = depth
                    .checked_sub(2)
                    .and_then(|i| stack.get(i))
                    .map(Vec::as_slice)
                    .unwrap_or(b"");

                match current {
                    None if name == b"biblStruct" && parent == b"listBibl" => {
                        current = Some(BiblBuilder {
                            depth,
                            ..Default::default()
                        });
                    }
                    Some(ref mut bibl) => bibl.open(&name, parent, grandparent, e, depth),
                    None => {}
                }

                if is_empty {
                    close_element(&mut current, &mut records, depth);
                } else {
                    stack.push(name);
                }
            }
            Event::End(_) => {
                stack.pop();
                close_element(&mut current, &mut records, stack.len());
            }
            Event::Text(ref e) => {
                if let Some(ref mut bibl) = current {
                    let text = e
                        .unescape()
                        .map_err(|err| ExtractError::Xml(err.to_string()))?;
                    bibl.text(&text);
                }
            }
            Event::CData(ref e) => {
                if let Some(ref mut bibl) = current {
                    bibl.text(&String::from_utf8_lossy(e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ExtractError::Xml("document has no root element".into()));
    }
    if !stack.is_empty() {
        return Err(ExtractError::Xml("unexpected end of document".into()));
    }

    tracing::debug!(count = records.len(), "extracted TEI references");
    Ok(records)
}

fn close_element(
    current: &mut Option<BiblBuilder>,
    records: &mut Vec<ReferenceRecord>,
    depth: usize,
) {
    let Some(bibl) = current else {
        return;
    };
    if bibl.depth == depth {
        if let Some(done) = current.take() {
            records.push(done.finish());
        }
    } else {
        bibl.close(depth);
    }
}

/// Read a TEI file from disk and extract its references.
pub fn extract_references_from_file(path: &Path) -> Result<Vec<ReferenceRecord>, ExtractError> {
    let content = std::fs::read_to_string(path)?;
    extract_references(&content)
}
