//! In-band attachment markers for chat message bodies.
//!
//! A message body is free text optionally followed by one marker:
//!
//! ```text
//! hello [IMAGE]<storage key>
//! hello [FILE]<storage key>|<original filename>
//! ```
//!
//! The marker format is part of the stored data, not just the API surface:
//! bodies written by earlier versions of the tool parse the same way.

use serde::{Deserialize, Serialize};

const IMAGE_MARKER: &str = "[IMAGE]";
const FILE_MARKER: &str = "[FILE]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    Image { path: String },
    File { path: String, filename: String },
}

/// Builds a message body from free text and an optional attachment.
pub fn encode(text: &str, attachment: Option<&Attachment>) -> String {
    let mut body = text.to_owned();
    match attachment {
        Some(Attachment::Image { path }) => {
            body.push_str(&format!(" {IMAGE_MARKER}{path}"));
        }
        Some(Attachment::File { path, filename }) => {
            body.push_str(&format!(" {FILE_MARKER}{path}|{filename}"));
        }
        None => {}
    }
    body
}

/// Splits a stored body back into free text and attachment. Bodies without a
/// marker come back unchanged with no attachment.
pub fn parse(body: &str) -> (String, Option<Attachment>) {
    if let Some((text, rest)) = body.split_once(IMAGE_MARKER) {
        return (
            text.trim_end().to_owned(),
            Some(Attachment::Image {
                path: rest.to_owned(),
            }),
        );
    }

    if let Some((text, rest)) = body.split_once(FILE_MARKER) {
        let (path, filename) = match rest.split_once('|') {
            Some((path, filename)) => (path.to_owned(), filename.to_owned()),
            // A file marker without a name; show the key itself.
            None => (rest.to_owned(), rest.to_owned()),
        };
        return (
            text.trim_end().to_owned(),
            Some(Attachment::File { path, filename }),
        );
    }

    (body.to_owned(), None)
}
