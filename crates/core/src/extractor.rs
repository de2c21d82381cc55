use crate::error::IngestError;
use lopdf::Document as PdfDocument;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Upper bound on the decompressed size of `word/document.xml`.
const MAX_DOCUMENT_XML_BYTES: u64 = 50 * 1024 * 1024;

pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["docx", "pdf"];

pub trait DocumentExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, IngestError>;
}

/// Reads Word documents. Paragraphs are joined with a single newline.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl DocumentExtractor for DocxExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, IngestError> {
        let file = BufReader::new(File::open(path)?);
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|error| IngestError::DocxParse(format!("{}: {error}", path.display())))?;

        let entry = archive
            .by_name("word/document.xml")
            .map_err(|error| IngestError::DocxParse(format!("{}: {error}", path.display())))?;

        let mut xml = Vec::new();
        entry.take(MAX_DOCUMENT_XML_BYTES).read_to_end(&mut xml)?;
        if xml.len() as u64 >= MAX_DOCUMENT_XML_BYTES {
            return Err(IngestError::DocxParse(format!(
                "word/document.xml exceeds size limit in {}",
                path.display()
            )));
        }

        let paragraphs = docx_paragraphs(&xml)?;
        Ok(paragraphs.join("\n"))
    }
}

fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, IngestError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => {
                if element.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::Text(text)) if in_text_run => {
                let unescaped = text
                    .unescape()
                    .map_err(|error| IngestError::DocxParse(error.to_string()))?;
                current.push_str(&unescaped);
            }
            Ok(Event::Empty(element)) => match element.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::End(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(error) => return Err(IngestError::DocxParse(error.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl DocumentExtractor for PdfTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, IngestError> {
        let document =
            PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;
            pages.push(text);
        }

        Ok(pages.join("\n"))
    }
}

pub fn is_supported(path: &Path) -> bool {
    extension_of(path).is_some()
}

fn extension_of(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    SUPPORTED_EXTENSIONS
        .iter()
        .copied()
        .find(|supported| ext.eq_ignore_ascii_case(supported))
}

pub fn extract_document_text(path: &Path) -> Result<String, IngestError> {
    match extension_of(path) {
        Some("docx") => DocxExtractor.extract_text(path),
        Some("pdf") => PdfTextExtractor.extract_text(path),
        _ => Err(IngestError::InvalidArgument(format!(
            "unsupported document type: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    pub(crate) fn write_docx(
        path: &Path,
        paragraphs: &[&str],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let body = paragraphs
            .iter()
            .map(|text| format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>"))
            .collect::<String>();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );

        let mut writer = zip::ZipWriter::new(File::create(path)?);
        writer.start_file("word/document.xml", SimpleFileOptions::default())?;
        writer.write_all(xml.as_bytes())?;
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn docx_paragraphs_are_joined_by_newline() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("rates.docx");
        write_docx(&path, &["Floating rate swap", "Pays SOFR &amp; receives fixed"])?;

        let text = DocxExtractor.extract_text(&path)?;
        assert_eq!(text, "Floating rate swap\nPays SOFR & receives fixed");
        Ok(())
    }

    #[test]
    fn runs_in_one_paragraph_are_concatenated() {
        let xml = br#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Interest </w:t></w:r><w:r><w:t>rate</w:t></w:r></w:p>
            <w:p/>
            <w:p><w:r><w:t>swap</w:t></w:r></w:p>
        </w:body></w:document>"#;

        let paragraphs = docx_paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["Interest rate", "", "swap"]);
    }

    #[test]
    fn corrupt_docx_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip archive")?;

        assert!(matches!(
            extract_document_text(&path),
            Err(IngestError::DocxParse(_))
        ));
        Ok(())
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(is_supported(Path::new("Rates.DOCX")));
        assert!(is_supported(Path::new("notes.pdf")));
        assert!(!is_supported(Path::new("notes.txt")));
    }
}
