//! HTML page rendering.
//!
//! Pages are produced with the `quick-xml` writer so every text node and
//! attribute value is escaped on the way out.

use percent_encoding::utf8_percent_encode;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::notes::store::{Note, MAX_NOTE_LEN};

/// Path-segment encoding for blob names placed in application URLs.
const PATH_SEGMENT_ENCODE_SET: &percent_encoding::AsciiSet = &percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// An uploaded image as shown on the index page.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    /// Blob name.
    pub name: String,
    /// Public blob URL.
    pub url: String,
}

type HtmlWriter = Writer<Cursor<Vec<u8>>>;

// ── Index page ──────────────────────────────────────────────────────

/// Render the index page: note form, note list, upload form and images.
pub fn render_index(notes: &[Note], images: &[ImageEntry]) -> anyhow::Result<String> {
    let mut w = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    w.write_event(Event::DocType(BytesText::from_escaped("html")))?;
    start(&mut w, "html", &[("lang", "en")])?;

    start(&mut w, "head", &[])?;
    w.write_event(Event::Empty(
        BytesStart::new("meta").with_attributes([("charset", "utf-8")]),
    ))?;
    text_element(&mut w, "title", "Notes")?;
    end(&mut w, "head")?;

    start(&mut w, "body", &[])?;
    text_element(&mut w, "h1", "Notes")?;

    // New note.
    start(&mut w, "form", &[("method", "post"), ("action", "/")])?;
    let maxlength = MAX_NOTE_LEN.to_string();
    start(
        &mut w,
        "textarea",
        &[("name", "note"), ("rows", "3"), ("maxlength", maxlength.as_str())],
    )?;
    // Empty text node keeps the indenting writer from filling the textarea with whitespace.
    w.write_event(Event::Text(BytesText::new("")))?;
    end(&mut w, "textarea")?;
    submit_button(&mut w, "Add note")?;
    end(&mut w, "form")?;

    // Notes.
    start(&mut w, "ul", &[("id", "notes")])?;
    for note in notes {
        start(&mut w, "li", &[])?;
        text_element(&mut w, "span", &note.content)?;
        let action = format!("/delete/{}", note.id);
        start(&mut w, "form", &[("method", "post"), ("action", &action)])?;
        submit_button(&mut w, "Delete")?;
        end(&mut w, "form")?;
        end(&mut w, "li")?;
    }
    end(&mut w, "ul")?;

    // Upload.
    text_element(&mut w, "h2", "Images")?;
    start(
        &mut w,
        "form",
        &[
            ("method", "post"),
            ("action", "/upload"),
            ("enctype", "multipart/form-data"),
        ],
    )?;
    w.write_event(Event::Empty(BytesStart::new("input").with_attributes([
        ("type", "file"),
        ("name", "file"),
        ("accept", "image/*"),
    ])))?;
    submit_button(&mut w, "Upload")?;
    end(&mut w, "form")?;

    // Images.
    start(&mut w, "ul", &[("id", "images")])?;
    for image in images {
        let segment = utf8_percent_encode(&image.name, PATH_SEGMENT_ENCODE_SET).to_string();
        start(&mut w, "li", &[])?;
        w.write_event(Event::Empty(BytesStart::new("img").with_attributes([
            ("src", image.url.as_str()),
            ("alt", image.name.as_str()),
            ("width", "200"),
        ])))?;
        let download = format!("/download_image/{}", segment);
        start(&mut w, "a", &[("href", &download)])?;
        w.write_event(Event::Text(BytesText::new("Download")))?;
        end(&mut w, "a")?;
        let delete = format!("/delete_image/{}", segment);
        start(&mut w, "form", &[("method", "post"), ("action", &delete)])?;
        submit_button(&mut w, "Delete")?;
        end(&mut w, "form")?;
        end(&mut w, "li")?;
    }
    end(&mut w, "ul")?;

    end(&mut w, "body")?;
    end(&mut w, "html")?;

    Ok(String::from_utf8(w.into_inner().into_inner())?)
}

// ── Upload confirmation ─────────────────────────────────────────────

/// Render the upload confirmation fragment linking to the stored blob.
pub fn render_upload_success(blob_url: &str) -> anyhow::Result<String> {
    let mut w = Writer::new(Cursor::new(Vec::new()));
    w.write_event(Event::Text(BytesText::new(
        "File uploaded successfully! Access it at: ",
    )))?;
    start(&mut w, "a", &[("href", blob_url), ("target", "_blank")])?;
    w.write_event(Event::Text(BytesText::new(blob_url)))?;
    end(&mut w, "a")?;
    Ok(String::from_utf8(w.into_inner().into_inner())?)
}

// ── Helpers ─────────────────────────────────────────────────────────

fn start(w: &mut HtmlWriter, tag: &str, attrs: &[(&str, &str)]) -> quick_xml::Result<()> {
    w.write_event(Event::Start(
        BytesStart::new(tag).with_attributes(attrs.iter().copied()),
    ))
}

fn end(w: &mut HtmlWriter, tag: &str) -> quick_xml::Result<()> {
    w.write_event(Event::End(BytesEnd::new(tag)))
}

/// Write a `<tag>text</tag>` element.
fn text_element(w: &mut HtmlWriter, tag: &str, text: &str) -> quick_xml::Result<()> {
    start(w, tag, &[])?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    end(w, tag)
}

fn submit_button(w: &mut HtmlWriter, label: &str) -> quick_xml::Result<()> {
    start(w, "button", &[("type", "submit")])?;
    w.write_event(Event::Text(BytesText::new(label)))?;
    end(w, "button")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: i64, content: &str) -> Note {
        Note {
            id,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_render_index_lists_notes() {
        let html = render_index(&[note(1, "Buy milk"), note(7, "Call mom")], &[]).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Buy milk"));
        assert!(html.contains("Call mom"));
        assert!(html.contains(r#"action="/delete/1""#));
        assert!(html.contains(r#"action="/delete/7""#));
    }

    #[test]
    fn test_render_index_escapes_note_content() {
        let html = render_index(&[note(1, "<script>alert('x')</script> & co")], &[]).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp; co"));
    }

    #[test]
    fn test_render_index_lists_images() {
        let images = vec![ImageEntry {
            name: "my cat.png".to_string(),
            url: "https://acct.blob.core.windows.net/images/my%20cat.png".to_string(),
        }];
        let html = render_index(&[], &images).unwrap();
        assert!(html.contains(r#"src="https://acct.blob.core.windows.net/images/my%20cat.png""#));
        assert!(html.contains(r#"href="/download_image/my%20cat.png""#));
        assert!(html.contains(r#"action="/delete_image/my%20cat.png""#));
    }

    #[test]
    fn test_render_index_has_forms() {
        let html = render_index(&[], &[]).unwrap();
        assert!(html.contains(r#"name="note""#));
        assert!(html.contains(r#"maxlength="255""#));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
        assert!(html.contains(r#"name="file""#));
    }

    #[test]
    fn test_render_upload_success() {
        let url = "https://acct.blob.core.windows.net/images/x.png";
        let html = render_upload_success(url).unwrap();
        assert_eq!(
            html,
            format!(
                r#"File uploaded successfully! Access it at: <a href="{url}" target="_blank">{url}</a>"#
            )
        );
    }
}
