use std::path::{Path, PathBuf};

use archive_core::{
    ContentType, Document, PageTemplate, SiteAccumulator, TemplateError, TemplateFields,
};
use archive_logging::{archive_debug, archive_info, archive_warn};
use thiserror::Error;

use crate::ledger::{CensorshipLedger, LedgerError, CENSORSHIP_FILE};
use crate::persist::{ensure_output_dir, AtomicFileWriter, PersistError};
use crate::store::{ArchiveStore, StoreError};
use crate::transform::{escape_html, plain_text, render_references, ContentTransformer};

pub const SUMMARY_FILE: &str = "index.html";
pub const SEARCH_INDEX_FILE: &str = "search_index.json";
pub const SITEMAP_FILE: &str = "sitemap.txt";

/// Standalone page for one document.
pub const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="zh">
<head>
    <meta charset="UTF-8">
    <title>{{title}}</title>
    <meta property="og:type" content="website">
    <meta property="og:title" content="{{title}}">
    <meta property="og:url" content="{{url}}">
    <meta name="description" property="og:description" content="{{excerpt?}}">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body { max-width: 1000px; margin: 0 auto; padding: 0 1em; }
        figure { margin: 1.4em 0; }
        figure img, .origin_image { width: 100%; }
        img { vertical-align: middle; }
        .author { display: flex; gap: 1em; }
        .author > div { flex: 1; }
        #avatar { width: 100px; height: 100px; }
        .stats { color: #999; font-size: 0.9em; }
    </style>
</head>
<body>
    <header>
        <img class="origin_image" src="{{image_url?}}" alt="">
        <h1><a href="{{url}}" target="_blank" rel="noopener noreferrer">{{title}}</a></h1>
        <div class="author">
            <img class="avatar" id="avatar" src="{{avatar_url?}}" alt="">
            <div>
                <h2 rel="author"><a href="{{author_url?}}" target="_blank" rel="noopener noreferrer">@{{author?}}</a></h2>
                <p>{{headline?}}</p>
            </div>
        </div>
        <time datetime="{{created_iso?}}">发表于 {{created_display?}}</time>
        <p class="stats">{{voteup_count}} 👍 / {{comment_count}} 💬</p>
    </header>
    <article>
        {{content}}
        {{references?}}
        <hr>
        <div class="column">
            <h2>专栏：{{column_title?}}</h2>
        </div>
    </article>
</body>
</html>
"#;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("page template: {0}")]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("serializing search index: {0}")]
    SearchIndex(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub pages: usize,
    pub skipped: usize,
    pub output_dir: PathBuf,
}

/// Renders every archived record into a static site.
pub struct SiteAssembler<'a> {
    store: &'a ArchiveStore,
    output_dir: PathBuf,
    template: PageTemplate,
    site_url: Option<String>,
}

impl<'a> SiteAssembler<'a> {
    pub fn new(store: &'a ArchiveStore, output_dir: impl Into<PathBuf>) -> Result<Self, PublishError> {
        Ok(Self {
            store,
            output_dir: output_dir.into(),
            template: PageTemplate::parse(PAGE_TEMPLATE)?,
            site_url: None,
        })
    }

    pub fn with_template(mut self, template: PageTemplate) -> Self {
        self.template = template;
        self
    }

    /// Absolute base for sitemap entries; without it the sitemap lists relative page names.
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn page_url(&self, document: &Document) -> String {
        match &self.site_url {
            Some(base) => format!("{base}/{}", document.page_filename()),
            None => document.page_filename(),
        }
    }

    /// Every parseable record, answers first, each type in file-name order.
    ///
    /// Records that are not JSON or carry an error envelope are skipped with a warning.
    pub fn load_documents(&self) -> Result<(Vec<Document>, usize), PublishError> {
        let mut documents = Vec::new();
        let mut skipped = 0;
        for content_type in ContentType::ALL {
            for content_id in self.store.record_ids(content_type)? {
                let payload = match self.store.read_record(content_type, &content_id) {
                    Ok(payload) => payload,
                    Err(StoreError::Malformed { path, source }) => {
                        archive_warn!("{:?} is not valid JSON, skipping: {}", path, source);
                        skipped += 1;
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                };
                match Document::from_payload(content_type, &content_id, &payload) {
                    Ok(document) => documents.push(document),
                    Err(err) => {
                        archive_warn!(
                            "{} {} cannot be rendered, skipping: {}",
                            content_type,
                            content_id,
                            err
                        );
                        skipped += 1;
                    }
                }
            }
        }
        Ok((documents, skipped))
    }

    /// Render one page and fold its search entry into `acc`.
    ///
    /// The document's references are filled in from its transformed content.
    pub fn render_document(
        &self,
        document: &mut Document,
        transformer: &ContentTransformer,
        acc: SiteAccumulator,
    ) -> Result<(String, SiteAccumulator), PublishError> {
        let transformed = transformer.transform(&document.content);
        document.references = transformed.references;

        let fields = TemplateFields::new()
            .with("title", escape_html(&document.title))
            .with("url", escape_html(&document.url))
            .with("excerpt", escape_html(&document.excerpt))
            .with("image_url", escape_html(&document.image_url))
            .with("avatar_url", escape_html(&document.author.avatar_url))
            .with("author_url", escape_html(&document.author.url))
            .with("author", escape_html(&document.author.name))
            .with("headline", escape_html(&document.author.headline))
            .with("created_iso", document.created_iso())
            .with("created_display", document.created_display())
            .with("voteup_count", document.voteup_count.to_string())
            .with("comment_count", document.comment_count.to_string())
            .with("content", transformed.markup.as_str())
            .with("references", render_references(&document.references))
            .with("column_title", escape_html(&document.column_title));
        let page = self.template.render(&fields)?;

        let entry = document.search_entry(plain_text(&document.content));
        let acc = acc.record(self.page_url(document), entry);
        Ok((page, acc))
    }

    pub fn publish(&self) -> Result<PublishSummary, PublishError> {
        ensure_output_dir(&self.output_dir)?;
        let writer = AtomicFileWriter::new(self.output_dir.clone());
        let transformer = ContentTransformer::new(self.store.archived_ids()?);
        let ledger = CensorshipLedger::load(self.store.root().join(CENSORSHIP_FILE))?;

        let (mut documents, skipped) = self.load_documents()?;
        let mut acc = SiteAccumulator::new();
        for document in &mut documents {
            let (page, next) = self.render_document(document, &transformer, acc)?;
            acc = next;
            writer.write(&document.page_filename(), page)?;
            archive_debug!("rendered {}", document.page_filename());
        }

        writer.write(SUMMARY_FILE, render_summary(&documents, &ledger))?;
        writer.write(
            SEARCH_INDEX_FILE,
            serde_json::to_string(acc.search_entries())?,
        )?;
        writer.write(SITEMAP_FILE, acc.render_sitemap())?;

        archive_info!(
            "published {} pages to {:?} ({} records skipped)",
            documents.len(),
            self.output_dir,
            skipped
        );
        Ok(PublishSummary {
            pages: documents.len(),
            skipped,
            output_dir: self.output_dir.clone(),
        })
    }
}

/// Summary page listing articles then answers, each by vote count descending.
pub fn render_summary(documents: &[Document], ledger: &CensorshipLedger) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>Content Directory</title>\n\
         <style>\n\
         body { max-width: 800px; margin: 0 auto; padding: 20px; }\n\
         .item { margin: 10px 0; }\n\
         .votes { color: #666; font-size: 0.9em; }\n\
         .created_time { color: #999; font-size: 0.9em; }\n\
         .censored { background-color: #ffeb3b; }\n\
         </style>\n</head>\n<body>\n<h1>Content Directory</h1>\n",
    );

    for (content_type, heading) in [
        (ContentType::Article, "Articles"),
        (ContentType::Answer, "Answers"),
    ] {
        let mut section: Vec<&Document> = documents
            .iter()
            .filter(|document| document.content_type == content_type)
            .collect();
        section.sort_by(|a, b| b.voteup_count.cmp(&a.voteup_count));

        out.push_str(&format!(
            "<section id=\"{}\">\n<h2>{heading} ({})</h2>\n",
            content_type.dir_name(),
            section.len()
        ));
        for document in section {
            let censored = ledger
                .get(&content_type.ledger_key(&document.id))
                .unwrap_or(false);
            let (class, marker) = if censored {
                ("censored", " (censored)")
            } else {
                ("", "")
            };
            out.push_str(&format!(
                "<div class=\"item\"><a href=\"./{}\" class=\"{class}\">{}{marker}</a> \
                 <span class=\"votes\">({} votes)</span> \
                 <span class=\"created_time\">({})</span></div>\n",
                document.page_filename(),
                escape_html(&document.title),
                document.voteup_count,
                document.created_date()
            ));
        }
        out.push_str("</section>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}
