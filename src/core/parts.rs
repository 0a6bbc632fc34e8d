//! Typed views of the package parts touched by comment injection.
//!
//! Relationships and content types are small closed schemas and round-trip
//! through plain structs. The comments part keeps existing comment elements
//! byte-for-byte and only serializes the new ones. The main document is
//! patched by offset so nothing outside the inserted markers changes.

use crate::core::parser::{body_node, body_paragraphs, is_w, W_NS};
use crate::error::InjectionError;
use crate::Comment;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use roxmltree::{Document, Node};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub const DEFAULT_COMMENTS_TARGET: &str = "comments.xml";

pub const COMMENTS_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
pub const COMMENTS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";

const PACKAGE_RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const COMMENTS_REL_ID: &str = "rIdComments";

fn xml_writer() -> Writer<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    // Writing into a Vec cannot fail.
    let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))));
    writer
}

fn finish(writer: Writer<Vec<u8>>, part: &str) -> Result<String, InjectionError> {
    String::from_utf8(writer.into_inner()).map_err(|e| InjectionError::malformed(part, e))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event, part: &str) -> Result<(), InjectionError> {
    writer
        .write_event(event)
        .map_err(|e| InjectionError::malformed(part, e))
}

fn parse_doc<'input>(xml: &'input str, part: &str) -> Result<Document<'input>, InjectionError> {
    Document::parse(xml).map_err(|e| InjectionError::malformed(part, e))
}

fn required_attr<'a>(node: Node<'a, '_>, name: &str, part: &str) -> Result<&'a str, InjectionError> {
    node.attribute(name)
        .ok_or_else(|| InjectionError::malformed(part, format!("<{}> without {}", node.tag_name().name(), name)))
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

/// Prefix for WordprocessingML attributes, and the `xmlns:w` declaration it
/// needs when the part binds the namespace only as the default namespace.
/// Unprefixed attributes belong to no namespace.
fn attribute_prefix(prefix: Option<&str>) -> (String, Option<String>) {
    match prefix {
        Some(p) => (p.to_string(), None),
        None => ("w".to_string(), Some(W_NS.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Relationship manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    pub entries: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml: &str, part: &str) -> Result<Self, InjectionError> {
        let doc = parse_doc(xml, part)?;
        let root = doc.root_element();
        if root.tag_name().name() != "Relationships" {
            return Err(InjectionError::malformed(part, "root is not <Relationships>"));
        }

        let mut entries = Vec::new();
        for node in root
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
        {
            entries.push(Relationship {
                id: required_attr(node, "Id", part)?.to_string(),
                rel_type: required_attr(node, "Type", part)?.to_string(),
                target: required_attr(node, "Target", part)?.to_string(),
                target_mode: node.attribute("TargetMode").map(str::to_string),
            });
        }
        Ok(Self { entries })
    }

    pub fn find_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.rel_type == rel_type)
    }

    /// Make sure a comments relationship exists.
    ///
    /// Returns the comments target and whether an entry was added.
    pub fn ensure_comments(&mut self) -> (String, bool) {
        if let Some(existing) = self.find_by_type(COMMENTS_REL_TYPE) {
            return (existing.target.clone(), false);
        }
        let id = self.free_id();
        self.entries.push(Relationship {
            id,
            rel_type: COMMENTS_REL_TYPE.to_string(),
            target: DEFAULT_COMMENTS_TARGET.to_string(),
            target_mode: None,
        });
        (DEFAULT_COMMENTS_TARGET.to_string(), true)
    }

    fn free_id(&self) -> String {
        if !self.entries.iter().any(|r| r.id == COMMENTS_REL_ID) {
            return COMMENTS_REL_ID.to_string();
        }
        let next = self
            .entries
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
            + 1;
        format!("rId{}", next)
    }

    pub fn to_xml(&self) -> Result<String, InjectionError> {
        let part = DOCUMENT_RELS_PART;
        let mut writer = xml_writer();
        write(
            &mut writer,
            Event::Start(BytesStart::new("Relationships").with_attributes([("xmlns", PACKAGE_RELS_NS)])),
            part,
        )?;
        for rel in &self.entries {
            let mut el = BytesStart::new("Relationship");
            el.push_attribute(("Id", rel.id.as_str()));
            el.push_attribute(("Type", rel.rel_type.as_str()));
            el.push_attribute(("Target", rel.target.as_str()));
            if let Some(mode) = &rel.target_mode {
                el.push_attribute(("TargetMode", mode.as_str()));
            }
            write(&mut writer, Event::Empty(el), part)?;
        }
        write(&mut writer, Event::End(BytesEnd::new("Relationships")), part)?;
        finish(writer, part)
    }
}

/// Package path of a part targeted from the main document's relationships.
pub fn document_target_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target),
    }
}

// ---------------------------------------------------------------------------
// Content-type manifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTypeEntry {
    Default { extension: String, content_type: String },
    Override { part_name: String, content_type: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    pub entries: Vec<ContentTypeEntry>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self, InjectionError> {
        let part = CONTENT_TYPES_PART;
        let doc = parse_doc(xml, part)?;
        let root = doc.root_element();
        if root.tag_name().name() != "Types" {
            return Err(InjectionError::malformed(part, "root is not <Types>"));
        }

        let mut entries = Vec::new();
        for node in root.children().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "Default" => entries.push(ContentTypeEntry::Default {
                    extension: required_attr(node, "Extension", part)?.to_string(),
                    content_type: required_attr(node, "ContentType", part)?.to_string(),
                }),
                "Override" => entries.push(ContentTypeEntry::Override {
                    part_name: required_attr(node, "PartName", part)?.to_string(),
                    content_type: required_attr(node, "ContentType", part)?.to_string(),
                }),
                other => {
                    return Err(InjectionError::malformed(part, format!("unexpected <{}>", other)));
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn has_override(&self, part_name: &str) -> bool {
        self.entries.iter().any(|e| match e {
            ContentTypeEntry::Override { part_name: p, .. } => p.eq_ignore_ascii_case(part_name),
            ContentTypeEntry::Default { .. } => false,
        })
    }

    /// Add an override for `part_name` unless one exists. Returns whether one was added.
    pub fn ensure_override(&mut self, part_name: &str, content_type: &str) -> bool {
        if self.has_override(part_name) {
            return false;
        }
        self.entries.push(ContentTypeEntry::Override {
            part_name: part_name.to_string(),
            content_type: content_type.to_string(),
        });
        true
    }

    pub fn to_xml(&self) -> Result<String, InjectionError> {
        let part = CONTENT_TYPES_PART;
        let mut writer = xml_writer();
        write(
            &mut writer,
            Event::Start(BytesStart::new("Types").with_attributes([("xmlns", CONTENT_TYPES_NS)])),
            part,
        )?;
        for entry in &self.entries {
            let el = match entry {
                ContentTypeEntry::Default { extension, content_type } => BytesStart::new("Default")
                    .with_attributes([("Extension", extension.as_str()), ("ContentType", content_type.as_str())]),
                ContentTypeEntry::Override { part_name, content_type } => BytesStart::new("Override")
                    .with_attributes([("PartName", part_name.as_str()), ("ContentType", content_type.as_str())]),
            };
            write(&mut writer, Event::Empty(el), part)?;
        }
        write(&mut writer, Event::End(BytesEnd::new("Types")), part)?;
        finish(writer, part)
    }
}

// ---------------------------------------------------------------------------
// Comments part
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum CommentEntry {
    Existing { id: u32, xml: String },
    New(Comment),
}

impl CommentEntry {
    fn id(&self) -> u32 {
        match self {
            CommentEntry::Existing { id, .. } => *id,
            CommentEntry::New(c) => c.id,
        }
    }
}

/// The comments part: everything around the comment elements is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentsPart {
    name: String,
    head: String,
    tail: String,
    prefix: Option<String>,
    entries: Vec<CommentEntry>,
}

impl CommentsPart {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            head: format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:comments xmlns:w=\"{}\">",
                W_NS
            ),
            tail: "</w:comments>".to_string(),
            prefix: Some("w".to_string()),
            entries: Vec::new(),
        }
    }

    pub fn parse(xml: &str, name: &str) -> Result<Self, InjectionError> {
        let doc = parse_doc(xml, name)?;
        let root = doc.root_element();
        if !is_w(&root, "comments") {
            return Err(InjectionError::malformed(name, "root is not <w:comments>"));
        }
        let prefix = root.lookup_prefix(W_NS).map(str::to_string);

        let mut entries = Vec::new();
        for node in root.children().filter(|n| n.is_element()) {
            if !is_w(&node, "comment") {
                return Err(InjectionError::malformed(
                    name,
                    format!("unexpected <{}>", node.tag_name().name()),
                ));
            }
            let id = node
                .attribute((W_NS, "id"))
                .and_then(|v| v.trim().parse::<u32>().ok())
                .ok_or_else(|| InjectionError::malformed(name, "comment without numeric w:id"))?;
            entries.push(CommentEntry::Existing {
                id,
                xml: xml[node.range()].to_string(),
            });
        }

        let range = root.range();
        let (head, tail) = match (root.first_child(), root.last_child()) {
            (Some(first), Some(last)) => (
                xml[..first.range().start].to_string(),
                xml[last.range().end..].to_string(),
            ),
            _ => {
                let element = &xml[range.clone()];
                let closing = format!("</{}>", qualified(prefix.as_deref(), "comments"));
                if let Some(open) = element.strip_suffix("/>") {
                    (
                        format!("{}{}>", &xml[..range.start], open.trim_end()),
                        format!("{}{}", closing, &xml[range.end..]),
                    )
                } else {
                    let split = element.rfind("</").map(|p| range.start + p).unwrap_or(range.end);
                    (xml[..split].to_string(), xml[split..].to_string())
                }
            }
        };

        Ok(Self {
            name: name.to_string(),
            head,
            tail,
            prefix,
            entries,
        })
    }

    /// Highest comment id in the part, 0 when empty.
    pub fn max_id(&self) -> u32 {
        self.entries.iter().map(CommentEntry::id).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, comment: Comment) {
        self.entries.push(CommentEntry::New(comment));
    }

    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entries.iter().map(CommentEntry::id).collect();
        ids.sort_unstable();
        ids
    }

    /// Serialize with all comment elements in ascending id order.
    pub fn to_xml(&self) -> Result<String, InjectionError> {
        let mut ordered: Vec<&CommentEntry> = self.entries.iter().collect();
        ordered.sort_by_key(|e| e.id());

        let mut out = self.head.clone();
        for entry in ordered {
            match entry {
                CommentEntry::Existing { xml, .. } => out.push_str(xml),
                CommentEntry::New(comment) => out.push_str(&self.comment_xml(comment)?),
            }
        }
        out.push_str(&self.tail);
        Ok(out)
    }

    fn comment_xml(&self, comment: &Comment) -> Result<String, InjectionError> {
        let prefix = self.prefix.as_deref();
        let part = self.name.as_str();
        let q = |local: &str| qualified(prefix, local);
        let (attr_prefix, declare) = attribute_prefix(prefix);
        let a = |local: &str| format!("{}:{}", attr_prefix, local);
        let mut writer = Writer::new(Vec::new());

        let id = comment.id.to_string();
        let date = comment.date_stamp();
        let mut el = BytesStart::new(q("comment"));
        if let Some(ns) = &declare {
            el.push_attribute((format!("xmlns:{}", attr_prefix).as_str(), ns.as_str()));
        }
        el.push_attribute((a("id").as_str(), id.as_str()));
        el.push_attribute((a("author").as_str(), comment.author.as_str()));
        el.push_attribute((a("date").as_str(), date.as_str()));
        write(&mut writer, Event::Start(el), part)?;

        write(&mut writer, Event::Start(BytesStart::new(q("p"))), part)?;
        write(&mut writer, Event::Start(BytesStart::new(q("r"))), part)?;
        let t = BytesStart::new(q("t")).with_attributes([("xml:space", "preserve")]);
        write(&mut writer, Event::Start(t), part)?;
        write(&mut writer, Event::Text(BytesText::new(&comment.text)), part)?;
        write(&mut writer, Event::End(BytesEnd::new(q("t"))), part)?;
        write(&mut writer, Event::End(BytesEnd::new(q("r"))), part)?;
        write(&mut writer, Event::End(BytesEnd::new(q("p"))), part)?;
        write(&mut writer, Event::End(BytesEnd::new(q("comment"))), part)?;

        finish(writer, part)
    }
}

// ---------------------------------------------------------------------------
// Main document anchors
// ---------------------------------------------------------------------------

/// Mark the paragraphs comments refer to with range markers and a reference run.
///
/// `anchors` pairs a body paragraph index with a comment id. Ids whose
/// paragraph does not exist or has no content are returned unanchored.
pub fn anchor_comments(
    xml: &str,
    part: &str,
    anchors: &[(usize, u32)],
) -> Result<(String, Vec<u32>), InjectionError> {
    let doc = parse_doc(xml, part)?;
    let body = body_node(&doc).ok_or_else(|| InjectionError::malformed(part, "document has no w:body"))?;
    let paragraphs: Vec<Node> = body_paragraphs(body).collect();
    let prefix = doc.root_element().lookup_prefix(W_NS);
    let q = |local: &str| qualified(prefix, local);
    let (attr_prefix, declare) = attribute_prefix(prefix);
    let declaration = declare
        .map(|ns| format!(" xmlns:{}=\"{}\"", attr_prefix, ns))
        .unwrap_or_default();
    let id_attr = format!("{}:id", attr_prefix);

    let mut insertions: Vec<(usize, String)> = Vec::new();
    let mut unanchored = Vec::new();

    for &(block_index, id) in anchors {
        let Some(span) = paragraphs.get(block_index).and_then(|p| content_span(*p)) else {
            unanchored.push(id);
            continue;
        };
        insertions.push((
            span.0,
            format!(
                "<{start}{decl} {id_attr}=\"{id}\"/>",
                start = q("commentRangeStart"),
                decl = declaration,
                id_attr = id_attr,
                id = id
            ),
        ));
        insertions.push((
            span.1,
            format!(
                "<{end}{decl} {id_attr}=\"{id}\"/><{r}><{reference}{decl} {id_attr}=\"{id}\"/></{r}>",
                end = q("commentRangeEnd"),
                r = q("r"),
                reference = q("commentReference"),
                decl = declaration,
                id_attr = id_attr,
                id = id
            ),
        ));
    }

    // Apply from the end so earlier offsets stay valid.
    insertions.sort_by(|a, b| b.0.cmp(&a.0));
    let mut patched = xml.to_string();
    for (pos, markup) in insertions {
        patched.insert_str(pos, &markup);
    }
    Ok((patched, unanchored))
}

/// Byte offsets where a paragraph's content starts (after `w:pPr`) and ends.
fn content_span(p: Node) -> Option<(usize, usize)> {
    let content: Vec<Node> = p
        .children()
        .filter(|n| n.is_element() && !is_w(n, "pPr"))
        .collect();
    let first = content.first()?;
    let last = content.last()?;
    let start = match p.children().find(|n| is_w(n, "pPr")) {
        Some(p_pr) => p_pr.range().end,
        None => first.range().start,
    };
    Some((start, last.range().end))
}
