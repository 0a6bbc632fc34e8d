use crate::error::{Error, Result};
use crate::Block;
use memmap2::Mmap;
use roxmltree::{Document, Node};
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const DOCUMENT_PART: &str = "word/document.xml";

const MMAP_THRESHOLD: u64 = 10 * 1024 * 1024;

pub trait Parser {
    /// Parse a packaged document into its ordered body paragraphs.
    fn parse<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Block>>;
}

/// DocxParser: reads `word/document.xml` and summarises each body paragraph as a [`Block`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxParser;

impl Parser for DocxParser {
    fn parse<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Block>> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Parse(format!("cannot open {}: {}", path.display(), e)))?;
        let file_size = file.metadata()?.len();

        if file_size > MMAP_THRESHOLD {
            let mmap = unsafe { Mmap::map(&file)? };
            self.parse_archive(Cursor::new(&mmap[..]))
        } else {
            let mut bytes = Vec::with_capacity(file_size as usize);
            let mut file = file;
            file.read_to_end(&mut bytes)?;
            self.parse_archive(Cursor::new(bytes))
        }
    }
}

impl DocxParser {
    pub fn parse_archive<R: Read + Seek>(&self, reader: R) -> Result<Vec<Block>> {
        let mut archive = ZipArchive::new(reader)?;

        let mut doc_xml = String::new();
        {
            let mut part = archive
                .by_name(DOCUMENT_PART)
                .map_err(|_| Error::Parse(format!("missing {}", DOCUMENT_PART)))?;
            part.read_to_string(&mut doc_xml)?;
        }

        self.parse_document_xml(&doc_xml)
    }

    pub fn parse_document_xml(&self, xml: &str) -> Result<Vec<Block>> {
        let doc = Document::parse(xml)?;
        let Some(body) = body_node(&doc) else {
            return Err(Error::Parse("document has no w:body".to_string()));
        };

        let blocks = body_paragraphs(body)
            .enumerate()
            .map(|(index, p_node)| self.parse_paragraph(index, p_node))
            .collect();

        Ok(blocks)
    }

    fn parse_paragraph(&self, index: usize, p_node: Node) -> Block {
        let runs: Vec<Node> = p_node.children().filter(|n| is_w(n, "r")).collect();
        let bold_runs = runs.iter().filter(|r| self.is_bold_run(**r)).count();

        Block::new(index, self.extract_text(p_node), runs.len(), bold_runs)
    }

    /// A run is bold when its own properties carry `w:b` not switched off.
    fn is_bold_run(&self, run: Node) -> bool {
        let Some(r_pr) = run.children().find(|n| is_w(n, "rPr")) else {
            return false;
        };
        match r_pr.children().find(|n| is_w(n, "b")) {
            Some(b) => !matches!(
                b.attribute((W_NS, "val")),
                Some("0") | Some("false") | Some("off")
            ),
            None => false,
        }
    }

    fn extract_text(&self, p_node: Node) -> String {
        let mut text = String::new();
        for node in p_node.descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "t" if node.tag_name().namespace() == Some(W_NS) => {
                    if let Some(t) = node.text() {
                        text.push_str(t);
                    }
                }
                "tab" if node.tag_name().namespace() == Some(W_NS) => text.push('\t'),
                "br" | "cr" if node.tag_name().namespace() == Some(W_NS) => text.push('\n'),
                _ => {}
            }
        }
        text
    }
}

pub(crate) fn is_w(node: &Node, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local && node.tag_name().namespace() == Some(W_NS)
}

pub(crate) fn body_node<'a, 'input>(doc: &'a Document<'input>) -> Option<Node<'a, 'input>> {
    doc.root_element().children().find(|n| is_w(n, "body"))
}

/// Paragraphs that are direct children of `w:body`, in document order.
pub(crate) fn body_paragraphs<'a, 'input: 'a>(
    body: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    body.children().filter(|n| is_w(n, "p"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{}"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            W_NS, body
        )
    }

    #[test]
    fn test_counts_bold_runs() {
        let xml = document(
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>ROOT </w:t></w:r><w:r><w:rPr><w:b w:val="1"/></w:rPr><w:t>CAUSE:</w:t></w:r></w:p>
<w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>Plain</w:t></w:r><w:r><w:t> text</w:t></w:r></w:p>"#,
        );
        let blocks = DocxParser.parse_document_xml(&xml).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "ROOT CAUSE:");
        assert_eq!((blocks[0].run_count, blocks[0].bold_runs), (2, 2));
        assert_eq!(blocks[1].text, "Plain text");
        assert_eq!((blocks[1].run_count, blocks[1].bold_runs), (2, 0));
    }

    #[test]
    fn test_only_body_level_paragraphs_are_blocks() {
        let xml = document(
            r#"<w:p><w:r><w:t>first</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p/>
<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t></w:r></w:p>"#,
        );
        let blocks = DocxParser.parse_document_xml(&xml).unwrap();
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "", "a\tb"]);
        assert_eq!(blocks[2].index, 2);
        assert_eq!(blocks[1].run_count, 0);
    }

    #[test]
    fn test_missing_body_is_parse_error() {
        let xml = format!(r#"<w:document xmlns:w="{}"/>"#, W_NS);
        assert!(matches!(
            DocxParser.parse_document_xml(&xml),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_not_a_zip_is_parse_error() {
        let result = DocxParser.parse_archive(Cursor::new(b"plain text".to_vec()));
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
