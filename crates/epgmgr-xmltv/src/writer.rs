//! XMLTV document writer.

use std::path::Path;

use anyhow::{Context, Result};
use epgmgr_core::{Program, TimelineSink, format_xmltv};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Default `generator-info-name`.
pub const DEFAULT_GENERATOR_NAME: &str = "EPG Generator";

/// Default language of titles and descriptions.
pub const DEFAULT_LANG: &str = "pt";

/// Content rating attached to every programme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    /// Rating system (`Brazil`).
    pub system: String,
    /// Rating value (`[Livre]`).
    pub value: String,
}

/// Output options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmltvOptions {
    /// `generator-info-name` attribute of `<tv>`.
    pub generator_name: String,
    /// `lang` attribute of `<title>` and `<desc>`.
    pub lang: String,
    /// Rating block, omitted when `None`.
    pub rating: Option<Rating>,
}

impl Default for XmltvOptions {
    fn default() -> Self {
        Self {
            generator_name: String::from(DEFAULT_GENERATOR_NAME),
            lang: String::from(DEFAULT_LANG),
            rating: None,
        }
    }
}

#[derive(Debug)]
struct EmittedChannel {
    id: String,
    display_name: String,
    programs: Vec<Program>,
}

/// Collects emitted channels and renders them as one XMLTV document.
///
/// All `<channel>` elements come first, in emission order, followed by the
/// `<programme>` elements of each channel.
#[derive(Debug, Default)]
pub struct XmltvWriter {
    options: XmltvOptions,
    channels: Vec<EmittedChannel>,
}

impl XmltvWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new(options: XmltvOptions) -> Self {
        Self {
            options,
            channels: Vec::new(),
        }
    }

    /// Channels emitted so far.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Programmes emitted so far.
    #[must_use]
    pub fn programme_count(&self) -> usize {
        self.channels.iter().map(|c| c.programs.len()).sum()
    }

    /// Renders the document.
    ///
    /// # Errors
    ///
    /// Returns an error if XML serialization fails.
    pub fn render(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .context("failed to write XML declaration")?;

        let mut tv = BytesStart::new("tv");
        tv.push_attribute(("generator-info-name", self.options.generator_name.as_str()));
        writer.write_event(Event::Start(tv))?;

        for channel in &self.channels {
            let mut element = BytesStart::new("channel");
            element.push_attribute(("id", channel.id.as_str()));
            writer.write_event(Event::Start(element))?;
            write_text_element(&mut writer, "display-name", None, &channel.display_name)?;
            writer.write_event(Event::End(BytesEnd::new("channel")))?;
        }

        for channel in &self.channels {
            for program in &channel.programs {
                self.write_programme(&mut writer, &channel.id, program)
                    .with_context(|| {
                        format!("failed to write programme {:?}", program.title())
                    })?;
            }
        }

        writer.write_event(Event::End(BytesEnd::new("tv")))?;

        let mut document =
            String::from_utf8(writer.into_inner()).context("XMLTV output is not UTF-8")?;
        document.push('\n');
        Ok(document)
    }

    fn write_programme(
        &self,
        writer: &mut Writer<Vec<u8>>,
        channel_id: &str,
        program: &Program,
    ) -> Result<()> {
        let start = format_xmltv(program.start());
        let stop = format_xmltv(program.end());

        let mut element = BytesStart::new("programme");
        element.push_attribute(("start", start.as_str()));
        element.push_attribute(("stop", stop.as_str()));
        element.push_attribute(("channel", channel_id));
        writer.write_event(Event::Start(element))?;

        let lang = Some(self.options.lang.as_str());
        write_text_element(writer, "title", lang, program.title())?;
        if let Some(desc) = program.description().filter(|d| !d.is_empty()) {
            write_text_element(writer, "desc", lang, desc)?;
        }

        if let Some(rating) = &self.options.rating {
            let mut element = BytesStart::new("rating");
            element.push_attribute(("system", rating.system.as_str()));
            writer.write_event(Event::Start(element))?;
            write_text_element(writer, "value", None, &rating.value)?;
            writer.write_event(Event::End(BytesEnd::new("rating")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("programme")))?;
        Ok(())
    }

    /// Renders the document and replaces `path` with it.
    ///
    /// The document is written to a sibling temporary file first and then
    /// renamed over `path`, so readers never see a partial file.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering, directory creation, writing or the
    /// final rename fails.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let document = self.render()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let file_name = path
            .file_name()
            .with_context(|| format!("output path has no file name: {}", path.display()))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, &document)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        if let Err(e) = std::fs::rename(&tmp_path, path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e).with_context(|| format!("failed to replace {}", path.display()));
        }

        tracing::info!(
            path = %path.display(),
            channels = self.channel_count(),
            programmes = self.programme_count(),
            bytes = document.len(),
            "XMLTV written"
        );
        Ok(())
    }
}

impl TimelineSink for XmltvWriter {
    fn emit(&mut self, channel_id: &str, display_name: &str, programs: &[Program]) -> Result<()> {
        tracing::debug!(
            channel = channel_id,
            programmes = programs.len(),
            "Channel collected"
        );
        self.channels.push(EmittedChannel {
            id: String::from(channel_id),
            display_name: String::from(display_name),
            programs: programs.to_vec(),
        });
        Ok(())
    }
}

/// Writes `<name lang="..">text</name>`.
fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    lang: Option<&str>,
    text: &str,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    if let Some(lang) = lang {
        start.push_attribute(("lang", lang));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
