//! Atom feed parsing for the arXiv query API.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::arxiv::paper::Paper;

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    updated: String,
    authors: Vec<String>,
    categories: Vec<String>,
    primary_category: String,
    pdf_url: String,
    alternate_url: String,
}

impl EntryBuilder {
    fn build(self) -> Result<Paper> {
        let arxiv_id = self
            .id
            .rsplit('/')
            .next()
            .unwrap_or(&self.id)
            .to_string();

        let published = parse_atom_date(&self.published)?;
        let updated = parse_atom_date(&self.updated)?;

        let arxiv_url = if self.alternate_url.is_empty() {
            self.id.clone()
        } else {
            self.alternate_url
        };

        let primary_category = if self.primary_category.is_empty() {
            self.categories.first().cloned().unwrap_or_default()
        } else {
            self.primary_category
        };

        Ok(Paper {
            arxiv_id,
            title: normalize_whitespace(&self.title),
            abstract_text: normalize_whitespace(&self.summary),
            authors: self.authors,
            categories: self.categories,
            primary_category,
            published,
            updated,
            pdf_url: self.pdf_url,
            arxiv_url,
            interest_score: 0.0,
            interest_reason: String::new(),
        })
    }
}

/// Parse an arXiv Atom response into papers. Entries missing required
/// fields fail the whole parse; the API does not produce partial entries.
pub fn parse_feed(xml: &str) -> Result<Vec<Paper>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut in_author = false;
    let mut current_element = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                match name.as_str() {
                    "entry" => entry = Some(EntryBuilder::default()),
                    "author" => in_author = true,
                    _ => {}
                }
                current_element = name;
            }
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e);
                if let Some(builder) = entry.as_mut() {
                    match name.as_str() {
                        "category" => {
                            if let Some(term) = attribute(e, "term") {
                                builder.categories.push(term);
                            }
                        }
                        "primary_category" => {
                            if let Some(term) = attribute(e, "term") {
                                builder.primary_category = term;
                            }
                        }
                        "link" => {
                            let href = attribute(e, "href").unwrap_or_default();
                            if attribute(e, "title").as_deref() == Some("pdf") {
                                builder.pdf_url = href;
                            } else if attribute(e, "rel").as_deref() == Some("alternate") {
                                builder.alternate_url = href;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let Some(builder) = entry.as_mut() else {
                    buf.clear();
                    continue;
                };
                let text = e
                    .unescape()
                    .map_err(|e| anyhow!("invalid feed text: {e}"))?;

                match current_element.as_str() {
                    "id" => builder.id.push_str(&text),
                    "title" => builder.title.push_str(&text),
                    "summary" => builder.summary.push_str(&text),
                    "published" => builder.published.push_str(&text),
                    "updated" => builder.updated.push_str(&text),
                    "name" if in_author => builder.authors.push(text.trim().to_string()),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let local = e.local_name();
                let name = String::from_utf8_lossy(local.as_ref()).to_string();
                match name.as_str() {
                    "entry" => {
                        if let Some(builder) = entry.take() {
                            papers.push(builder.build()?);
                        }
                    }
                    "author" => in_author = false,
                    _ => {}
                }
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("feed parse error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(papers)
}

fn local_name(e: &BytesStart) -> String {
    let local = e.local_name();
    String::from_utf8_lossy(local.as_ref()).to_string()
}

fn attribute(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        let local = attr.key.local_name();
        if local.as_ref() == key.as_bytes() {
            Some(String::from_utf8_lossy(&attr.value).to_string())
        } else {
            None
        }
    })
}

fn parse_atom_date(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| anyhow!("invalid feed date {text:?}: {e}"))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=cat:cs.AI</title>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v2</id>
    <updated>2024-01-05T10:00:00Z</updated>
    <published>2024-01-01T18:30:00Z</published>
    <title>Retrieval-Augmented
 Generation at Scale</title>
    <summary>  We study retrieval-augmented generation
 across large corpora.  </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2401.00001v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2401.00001v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v1</id>
    <updated>2024-01-02T00:00:00Z</updated>
    <published>2024-01-02T00:00:00Z</published>
    <title>Second Paper</title>
    <summary>Another abstract.</summary>
    <author><name>Grace Hopper</name></author>
    <link href="http://arxiv.org/abs/2401.00002v1" rel="alternate" type="text/html"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed_entries() {
        let papers = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.arxiv_id, "2401.00001v2");
        assert_eq!(first.title, "Retrieval-Augmented Generation at Scale");
        assert_eq!(
            first.abstract_text,
            "We study retrieval-augmented generation across large corpora."
        );
        assert_eq!(first.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.categories, vec!["cs.CL", "cs.AI"]);
        assert_eq!(first.primary_category, "cs.CL");
        assert_eq!(first.pdf_url, "http://arxiv.org/pdf/2401.00001v2");
        assert_eq!(first.arxiv_url, "http://arxiv.org/abs/2401.00001v2");
        assert_eq!(first.published.to_rfc3339(), "2024-01-01T18:30:00+00:00");
    }

    #[test]
    fn test_primary_category_falls_back_to_first() {
        let papers = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(papers[1].primary_category, "cs.LG");
    }

    #[test]
    fn test_empty_feed() {
        let xml = r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_feed_errors() {
        assert!(parse_feed("<feed><entry></feed>").is_err());
    }
}
