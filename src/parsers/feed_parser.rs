//! Quick-XML based channel feed parser
//!
//! Extracts only the entry fields the discovery pipeline uses from an Atom
//! channel feed. Field interpretation (recency, ID fallback) is left to the
//! feed collector.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::models::{AppError, AppResult};

/// One `<entry>` of a channel feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub video_id: Option<String>,
    pub title: String,
    pub link: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
}

/// Parsed channel feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelFeed {
    /// Feed-level author name, used when an entry has none
    pub author: Option<String>,
    pub entries: Vec<FeedEntry>,
}

pub fn parse_feed(document: &[u8]) -> AppResult<ChannelFeed> {
    let content = std::str::from_utf8(document)
        .map_err(|e| AppError::Parse(format!("feed is not valid UTF-8: {}", e)))?;

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feed = ChannelFeed::default();
    let mut current: Option<FeedEntry> = None;
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e)?;
                saw_root = true;
                if name == "entry" {
                    current = Some(FeedEntry::default());
                } else if name == "link" {
                    if let Some(entry) = current.as_mut() {
                        apply_link(entry, e);
                    }
                }
                stack.push(name);
                text.clear();
            }

            Ok(Event::Empty(ref e)) => {
                let name = element_name(e)?;
                saw_root = true;
                if name == "link" {
                    if let Some(entry) = current.as_mut() {
                        apply_link(entry, e);
                    }
                }
            }

            Ok(Event::Text(e)) => {
                let value = e
                    .unescape()
                    .map_err(|e| AppError::Parse(format!("invalid feed text: {}", e)))?;
                text.push_str(&value);
            }

            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }

            Ok(Event::End(_)) => {
                let Some(name) = stack.pop() else {
                    return Err(AppError::Parse("unbalanced feed document".to_string()));
                };
                let parent = stack.last().map(String::as_str);
                let value = text.trim().to_string();

                match (name.as_str(), parent) {
                    ("entry", _) => {
                        if let Some(entry) = current.take() {
                            feed.entries.push(entry);
                        }
                    }
                    ("yt:videoId", Some("entry")) => {
                        if let Some(entry) = current.as_mut() {
                            if !value.is_empty() {
                                entry.video_id = Some(value);
                            }
                        }
                    }
                    ("title", Some("entry")) => {
                        if let Some(entry) = current.as_mut() {
                            entry.title = value;
                        }
                    }
                    ("published", Some("entry")) => {
                        if let Some(entry) = current.as_mut() {
                            entry.published = Some(value);
                        }
                    }
                    ("name", Some("author")) if !value.is_empty() => {
                        if let Some(entry) = current.as_mut() {
                            entry.author = Some(value);
                        } else if feed.author.is_none() {
                            feed.author = Some(value);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }

            Ok(Event::Eof) => break,

            Ok(_) => {}

            Err(e) => {
                return Err(AppError::Parse(format!(
                    "malformed feed at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if !saw_root {
        return Err(AppError::Parse("empty feed document".to_string()));
    }
    if let Some(open) = stack.last() {
        return Err(AppError::Parse(format!("feed ended inside <{}>", open)));
    }

    Ok(feed)
}

fn element_name(e: &BytesStart<'_>) -> AppResult<String> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_string)
        .map_err(|e| AppError::Parse(format!("invalid UTF-8 in element name: {}", e)))
}

/// Prefers `rel="alternate"`; otherwise keeps the first link with an href
fn apply_link(entry: &mut FeedEntry, e: &BytesStart<'_>) {
    let mut href = None;
    let mut rel = None;

    for attr in e.attributes().flatten() {
        let Ok(value) = attr.unescape_value() else {
            continue;
        };
        match attr.key.as_ref() {
            b"href" => href = Some(value.into_owned()),
            b"rel" => rel = Some(value.into_owned()),
            _ => {}
        }
    }

    let Some(href) = href else {
        return;
    };
    let is_alternate = rel.as_deref().map_or(true, |rel| rel == "alternate");
    if is_alternate || entry.link.is_none() {
        entry.link = Some(href);
    }
}
