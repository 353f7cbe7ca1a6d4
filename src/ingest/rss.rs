// src/ingest/rss.rs
//! Tolerant RSS/Atom item extraction.
//!
//! Regional feeds are messy: stray HTML entities, mixed RSS/Atom vocabulary,
//! dates in either RFC 2822 or ISO 8601. Parsing walks the document as an
//! event stream so it can stop as soon as `max_items` items were collected
//! and survive truncated/broken markup by returning whatever it got so far.

use quick_xml::events::Event;
use quick_xml::Reader;
use time::format_description::well_known::{Iso8601, Rfc2822, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::ingest::types::NewsItem;

/// Parse a feed date in any of the forms seen in the wild (RFC 2822 from the
/// classic feeds, ISO 8601 with or without an offset from the newer ones).
pub fn parse_pub_date(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return Some(dt.unix_timestamp());
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(dt.unix_timestamp());
    }
    // Naive ISO timestamp: treat as UTC.
    if let Ok(dt) = PrimitiveDateTime::parse(s, &Iso8601::DEFAULT) {
        return Some(dt.assume_utc().unix_timestamp());
    }
    None
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    Body,
    Date,
}

fn field_for(tag: &[u8]) -> Option<Field> {
    match tag {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        b"description" | b"summary" => Some(Field::Body),
        b"pubDate" | b"published" | b"updated" => Some(Field::Date),
        _ => None,
    }
}

#[derive(Default)]
struct ItemAcc {
    title: String,
    link: String,
    body: String,
    date: String,
}

impl ItemAcc {
    fn push(&mut self, field: Field, text: &str) {
        match field {
            Field::Title => self.title.push_str(text),
            // First non-empty link wins (an Atom entry may carry several).
            Field::Link => {
                if self.link.is_empty() {
                    self.link = text.trim().to_string();
                }
            }
            Field::Body => self.body.push_str(text),
            Field::Date => self.date.push_str(text),
        }
    }

    fn into_item(self) -> Option<NewsItem> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(NewsItem {
            title,
            link: self.link,
            body: self.body.trim().to_string(),
            published_at: parse_pub_date(&self.date),
        })
    }
}

fn href_attr(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == b"href" {
            if let Ok(v) = attr.unescape_value() {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}

/// Extract up to `max_items` items from an RSS or Atom document.
///
/// Malformed markup never fails the call: extraction stops at the first
/// unreadable event and the items collected until then are returned.
pub fn parse_feed_items(xml: &str, max_items: usize) -> Vec<NewsItem> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&cleaned);
    reader.config_mut().trim_text(true);

    let mut items: Vec<NewsItem> = Vec::new();
    let mut in_item = false;
    let mut field: Option<Field> = None;
    let mut acc = ItemAcc::default();

    if max_items == 0 {
        return items;
    }

    loop {
        match reader.read_event() {
            Err(_) | Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    in_item = true;
                    field = None;
                    acc = ItemAcc::default();
                }
                tag if in_item => {
                    field = field_for(tag);
                    // Atom carries the target in an href attribute.
                    if field == Some(Field::Link) {
                        if let Some(href) = href_attr(&e) {
                            acc.push(Field::Link, &href);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if in_item && e.local_name().as_ref() == b"link" {
                    if let Some(href) = href_attr(&e) {
                        acc.push(Field::Link, &href);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (true, Some(f)) = (in_item, field) {
                    if let Ok(text) = t.unescape() {
                        acc.push(f, &text);
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if let (true, Some(f)) = (in_item, field) {
                    acc.push(f, &String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    in_item = false;
                    field = None;
                    if let Some(item) = std::mem::take(&mut acc).into_item() {
                        items.push(item);
                        if items.len() >= max_items {
                            break;
                        }
                    }
                }
                tag if field_for(tag).is_some() => field = None,
                _ => {}
            },
            Ok(_) => {}
        }
    }

    items
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
