//! Extraction of listing entries from mi.tv channel pages.
//!
//! Each program is an element carrying the `broadcast` class, holding a
//! `.time` element, an `<h2>` title and an optional `.synopsis`. A block runs
//! from one `broadcast` opening tag to the next, so nesting depth does not
//! matter.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::NaiveDate;
use epgmgr_core::RawEntry;
use regex::Regex;

/// Opening tag of a program block.
#[allow(clippy::expect_used)]
static BROADCAST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<\w+[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?broadcast(?:\s[^"']*)?["'][^>]*>"#)
        .expect("failed to compile broadcast regex")
});

/// Opening tag of the time element.
#[allow(clippy::expect_used)]
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<(?P<tag>\w+)[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?time(?:\s[^"']*)?["'][^>]*>"#)
        .expect("failed to compile time regex")
});

/// Opening tag of the synopsis element.
#[allow(clippy::expect_used)]
static SYNOPSIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<(?P<tag>\w+)[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?synopsis(?:\s[^"']*)?["'][^>]*>"#,
    )
    .expect("failed to compile synopsis regex")
});

/// Opening tag of the title heading.
#[allow(clippy::expect_used)]
static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?P<tag>h2)\b[^>]*>").expect("failed to compile h2 regex"));

/// Extracts the entries of one channel page, in publication order.
///
/// Blocks without a time are skipped. Title and description are returned as
/// found; validation is left to the timeline builder.
#[must_use]
pub fn parse_listing(html: &str, date: NaiveDate) -> Vec<RawEntry> {
    let starts: Vec<usize> = BROADCAST_RE.find_iter(html).map(|m| m.end()).collect();
    let ends = starts
        .iter()
        .skip(1)
        .copied()
        .chain(std::iter::once(html.len()));

    starts
        .iter()
        .zip(ends)
        .filter_map(|(&start, end)| html.get(start..end))
        .filter_map(|block| {
            let time = element_text(block, &TIME_RE).filter(|t| !t.is_empty())?;
            let title = element_text(block, &H2_RE).unwrap_or_default();
            let entry = RawEntry::new(date, time, title);
            Some(match element_text(block, &SYNOPSIS_RE) {
                Some(synopsis) => entry.with_description(synopsis),
                None => entry,
            })
        })
        .collect()
}

/// Text content of the first element matched by `open_re`.
fn element_text(block: &str, open_re: &Regex) -> Option<String> {
    let caps = open_re.captures(block)?;
    let open = caps.get(0)?;
    let tag = caps.name("tag")?.as_str().to_ascii_lowercase();

    let rest = block.get(open.end()..)?;
    let close = format!("</{tag}");
    let inner_end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
    let inner = rest.get(..inner_end)?;

    Some(clean_text(inner))
}

/// Strips tags, decodes entities and collapses whitespace.
fn clean_text(fragment: &str) -> String {
    let mut stripped = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    let decoded = decode_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> Cow<'_, str> {
    match quick_xml::escape::unescape_with(text, quick_xml::escape::resolve_html5_entity) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::trace!(error = %e, "Undecodable entity, keeping raw text");
            Cow::Borrowed(text)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn test_parse_listing_fixture() {
        // Arrange
        let html = include_str!("../../../../fixtures/mitv/globo_2024-03-10.html");

        // Act
        let entries = parse_listing(html, date());

        // Assert
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].local_time, "20:30");
        assert_eq!(entries[0].title, "Jornal Nacional");
        assert_eq!(
            entries[0].description.as_deref(),
            Some("As principais notícias do Brasil & do mundo.")
        );
        assert_eq!(entries[1].title, "Novela das Nove");
        assert_eq!(entries[1].description, None);
        assert_eq!(entries[2].title, "Tela Quente: Velozes & Furiosos");
        assert_eq!(entries[2].description.as_deref(), Some("Filme de ação."));
        assert_eq!(entries[3].local_time, "01:15");
        assert_eq!(entries[3].title, "Corujão");
        assert!(entries.iter().all(|e| e.source_date == date()));
    }

    #[test]
    fn test_blocks_without_time_are_skipped() {
        // Arrange
        let html = r#"
            <li class="broadcast"><span class="time"></span><h2>Ghost</h2></li>
            <li class="broadcast live"><span class="time">10:00</span><h2>News</h2></li>
        "#;

        // Act
        let entries = parse_listing(html, date());

        // Assert
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "News");
    }

    #[test]
    fn test_class_must_match_whole_token() {
        // Arrange
        let html = r#"
            <ul class="broadcast-list">
              <li class="broadcast"><span class="time-zone">BRT</span><span class="time">07:00</span><h2>Bom Dia</h2></li>
            </ul>
        "#;

        // Act
        let entries = parse_listing(html, date());

        // Assert
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].local_time, "07:00");
    }

    #[test]
    fn test_clean_text_strips_nested_tags_and_entities() {
        assert_eq!(
            clean_text("  <b>Tom&nbsp;&amp;&#160;Jerry</b>\n  <i>HD</i> "),
            "Tom & Jerry HD"
        );
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        assert!(parse_listing("<html><body></body></html>", date()).is_empty());
    }
}
