use std::collections::HashSet;

use archive_core::{ReferenceCollector, ReferenceEntry};
use ego_tree::NodeRef;
use percent_encoding::percent_decode_str;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use url::Url;

/// Host of the outbound redirect wrapper whose `target` parameter holds the real link.
pub const REDIRECT_HOST: &str = "link.zhihu.com";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "div", "figcaption", "figure", "footer", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table",
    "td", "th", "tr", "ul",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedContent {
    pub markup: String,
    /// Ordered by ordinal read as an integer.
    pub references: Vec<ReferenceEntry>,
}

/// Rewrites payload markup for standalone hosting.
#[derive(Debug, Clone, Default)]
pub struct ContentTransformer {
    local_ids: HashSet<String>,
}

impl ContentTransformer {
    pub fn new<I, S>(local_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            local_ids: local_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_local(&self, content_id: &str) -> bool {
        self.local_ids.contains(content_id)
    }

    /// Unwrap redirect links, then point links to archived items at their local page.
    pub fn resolve_link(&self, href: &str) -> String {
        let href = href.trim();
        let unwrapped = unwrap_redirect(href).unwrap_or_else(|| href.to_string());
        match trailing_segment(&unwrapped) {
            Some(id) if self.is_local(id) => format!("./{id}.html"),
            _ => unwrapped,
        }
    }

    pub fn transform(&self, markup: &str) -> TransformedContent {
        let fragment = Html::parse_fragment(markup);
        let mut ctx = RenderContext::default();
        for child in fragment.root_element().children() {
            self.write_node(child, &mut ctx);
        }
        TransformedContent {
            markup: ctx.out,
            references: ctx.references.into_sorted(),
        }
    }

    fn write_node(&self, node: NodeRef<'_, Node>, ctx: &mut RenderContext) {
        match node.value() {
            Node::Text(text) => ctx.out.push_str(&escape_html(text)),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.write_element(element, ctx);
                }
            }
            Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
            _ => {
                for child in node.children() {
                    self.write_node(child, ctx);
                }
            }
        }
    }

    fn write_element(&self, element: ElementRef, ctx: &mut RenderContext) {
        let tag = element.value().name().to_ascii_lowercase();
        match tag.as_str() {
            "script" => {}
            "u" => self.write_children(element, ctx),
            "sup" if element.value().attr("data-numero").is_some() => {
                self.write_reference(element, ctx)
            }
            "a" => self.write_anchor(element, ctx),
            "style" => {
                ctx.open_tag(&tag, sorted_attrs(element, &[]));
                for child in element.children() {
                    if let Node::Text(text) = child.value() {
                        ctx.out.push_str(text);
                    }
                }
                ctx.close_tag(&tag);
            }
            _ => {
                ctx.open_tag(&tag, sorted_attrs(element, &[]));
                if !VOID_ELEMENTS.contains(&tag.as_str()) {
                    self.write_children(element, ctx);
                    ctx.close_tag(&tag);
                }
            }
        }
    }

    fn write_children(&self, element: ElementRef, ctx: &mut RenderContext) {
        for child in element.children() {
            self.write_node(child, ctx);
        }
    }

    fn write_reference(&self, element: ElementRef, ctx: &mut RenderContext) {
        let attr = |name: &str| element.value().attr(name).map(str::trim).unwrap_or_default();
        let ordinal = attr("data-numero").to_string();
        let url = attr("data-url");
        let resolved_url = if url.is_empty() {
            String::new()
        } else {
            self.resolve_link(url)
        };
        ctx.references
            .insert(ReferenceEntry::new(ordinal.clone(), attr("data-text"), resolved_url));

        ctx.out.push_str(&format!(
            "<sup><a href=\"#{}\">[{}]</a></sup>",
            reference_anchor(&ordinal),
            escape_html(&ordinal)
        ));
    }

    fn write_anchor(&self, element: ElementRef, ctx: &mut RenderContext) {
        let mut attrs = sorted_attrs(element, &["href", "rel", "target"]);
        if let Some(href) = element.value().attr("href") {
            let resolved = self.resolve_link(href);
            let external = !resolved.is_empty() && !resolved.starts_with('#');
            attrs.push(("href".to_string(), resolved));
            if external {
                attrs.push(("rel".to_string(), "noopener noreferrer".to_string()));
                attrs.push(("target".to_string(), "_blank".to_string()));
            }
            attrs.sort();
        }
        ctx.open_tag("a", attrs);
        self.write_children(element, ctx);
        ctx.close_tag("a");
    }
}

#[derive(Default)]
struct RenderContext {
    out: String,
    references: ReferenceCollector,
}

impl RenderContext {
    fn open_tag(&mut self, tag: &str, attrs: Vec<(String, String)>) {
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            self.out.push(' ');
            self.out.push_str(&name);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(&value));
            self.out.push('"');
        }
        self.out.push('>');
    }

    fn close_tag(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }
}

fn sorted_attrs(element: ElementRef, skip: &[&str]) -> Vec<(String, String)> {
    let mut attrs: Vec<(String, String)> = element
        .value()
        .attrs()
        .filter(|(name, _)| !skip.contains(name))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    attrs.sort();
    attrs
}

/// The real destination of a redirect-wrapper link, if `href` is one.
pub fn unwrap_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    if url.host_str() != Some(REDIRECT_HOST) {
        return None;
    }
    // Only percent-escapes are undone; a literal `+` stays a `+`.
    let raw = url
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("target="))?;
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|target| target.into_owned())
        .filter(|target| !target.is_empty())
}

/// Last path segment of a link, ignoring query, fragment and trailing slashes.
pub fn trailing_segment(link: &str) -> Option<&str> {
    let end = link.find(['?', '#']).unwrap_or(link.len());
    link[..end]
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// Fragment id for a reference marker. Characters outside `[0-9A-Za-z_-]`
/// become `_`, so the id is always a bare token.
pub fn reference_anchor(ordinal: &str) -> String {
    let token: String = ordinal
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("ref_{token}")
}

/// HTML block listing references in order, each anchored as `ref_<ordinal>`.
pub fn render_references(references: &[ReferenceEntry]) -> String {
    if references.is_empty() {
        return String::new();
    }
    let mut out = String::from("<hr>\n<section class=\"references\">\n<h2>参考</h2>\n<ul>\n");
    for entry in references {
        out.push_str(&format!(
            "<li id=\"{}\">[{}] ",
            reference_anchor(&entry.ordinal),
            escape_html(&entry.ordinal)
        ));
        out.push_str(&escape_html(&entry.text));
        if !entry.resolved_url.is_empty() {
            let url = escape_attr(&entry.resolved_url);
            out.push_str(&format!(
                " <a href=\"{url}\" rel=\"noopener noreferrer\" target=\"_blank\">{}</a>",
                escape_html(&entry.resolved_url)
            ));
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n</section>\n");
    out
}

/// Visible text of `markup` with whitespace collapsed; block elements separate words.
pub fn plain_text(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let mut ctx = TextContext::default();
    for child in fragment.root_element().children() {
        collect_text(child, &mut ctx);
    }
    ctx.builder.trim().to_string()
}

fn collect_text(node: NodeRef<'_, Node>, ctx: &mut TextContext) {
    match node.value() {
        Node::Text(text) => ctx.append_text(text),
        Node::Element(element) => {
            let tag = element.name().to_ascii_lowercase();
            if matches!(tag.as_str(), "script" | "style" | "noscript" | "template") {
                return;
            }
            let block = BLOCK_ELEMENTS.contains(&tag.as_str());
            if block {
                ctx.separate();
            }
            for child in node.children() {
                collect_text(child, ctx);
            }
            if block {
                ctx.separate();
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, ctx);
            }
        }
    }
}

#[derive(Default)]
struct TextContext {
    builder: String,
    last_char: Option<char>,
}

impl TextContext {
    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                self.separate();
            } else {
                self.builder.push(ch);
                self.last_char = Some(ch);
            }
        }
    }

    fn separate(&mut self) {
        if self.builder.is_empty() || self.last_char == Some(' ') {
            return;
        }
        self.builder.push(' ');
        self.last_char = Some(' ');
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    escape_html(value).replace('"', "&quot;")
}
