//! Streaming metadata extraction and JSON-LD injection
//!
//! One forward pass over the HTML. Each [`Rule`] pairs a selector with a plain
//! function; lol_html calls the function for every matching element in document
//! order, and the element is fully handled before the stream moves past it. All rules
//! of one response share a single [`Article`], which the viewport anchor reads once to
//! decide whether to emit a JSON-LD script.

use crate::article::Article;
use crate::debug::DebugLog;
use crate::error::{EdgeError, Result};
use crate::jsonld::{build_json_ld, to_script_tag};
use anyhow::Context;
use lol_html::html_content::{ContentType, Element};
use lol_html::{HtmlRewriter, OutputSink, Settings, element};
use std::cell::RefCell;
use std::rc::Rc;

/// Handler invoked for one matching element
pub type Handler = fn(&mut Element<'_, '_>, &mut Article, &DebugLog);

/// A selector and the handler it dispatches to
#[derive(Clone, Copy)]
pub struct Rule {
    pub selector: &'static str,
    pub handler: Handler,
}

/// Element after which the JSON-LD script is inserted
pub const ANCHOR_SELECTOR: &str = r#"meta[name="viewport"]"#;

/// Extraction rules in registration order
pub const RULES: &[Rule] = &[
    Rule { selector: r#"meta[property="og:title"]"#, handler: og_title },
    Rule { selector: r#"meta[name="longdescription"]"#, handler: long_description },
    Rule { selector: r#"meta[property="og:description"]"#, handler: short_description },
    Rule { selector: r#"meta[name="description"]"#, handler: short_description },
    Rule { selector: r#"meta[property="og:image"]"#, handler: og_image },
    Rule { selector: r#"meta[property="og:image:alt"]"#, handler: og_image_alt },
    Rule { selector: r#"meta[property="og:url"]"#, handler: og_url },
    Rule { selector: r#"link[rel="canonical"]"#, handler: canonical_link },
    Rule { selector: r#"meta[name="author"]"#, handler: author },
    Rule { selector: r#"meta[name="author-url"]"#, handler: author_url },
    Rule { selector: r#"meta[name="linkedin"]"#, handler: linkedin },
    Rule { selector: r#"meta[name="published-date"]"#, handler: published_date },
    Rule { selector: r#"meta[name="modified-date"]"#, handler: modified_date },
    Rule { selector: r#"meta[name="json-ld"][content="article"]"#, handler: opt_in_marker },
    Rule { selector: r#"script[type="application/ld+json"][data-error]"#, handler: error_marker },
    Rule { selector: r#"script[type="application/ld+json"]:not([data-error])"#, handler: legacy_marker },
];

fn content(el: &Element<'_, '_>) -> Option<String> {
    el.get_attribute("content")
}

fn report(debug: &DebugLog, written: bool, field: &str, source: &str, value: &Option<String>) {
    if written {
        debug.log(format_args!("{field} <- {source}: {value:?}"));
    } else {
        debug.log(format_args!("{field} kept, ignored {source}"));
    }
}

fn og_title(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.set_title(content(el));
    report(debug, written, "title", "og:title", &article.title);
}

fn long_description(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.set_long_description(content(el));
    report(debug, written, "description", "longdescription", &article.description);
    el.remove();
}

fn short_description(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let source = el
        .get_attribute("property")
        .or_else(|| el.get_attribute("name"))
        .unwrap_or_default();
    let written = article.offer_description(content(el));
    report(debug, written, "description", &source, &article.description);
}

fn og_image(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.offer_image(content(el));
    report(debug, written, "image", "og:image", &article.image);
}

fn og_image_alt(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.offer_image_alt(content(el));
    report(debug, written, "imageAlt", "og:image:alt", &article.image_alt);
}

fn og_url(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.offer_url(content(el));
    report(debug, written, "url", "og:url", &article.url);
}

fn canonical_link(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.offer_url(el.get_attribute("href"));
    report(debug, written, "url", "canonical", &article.url);
}

fn author(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.offer_author(content(el));
    report(debug, written, "author", "author", &article.author);
}

fn author_url(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.set_author_url(content(el));
    report(debug, written, "authorUrl", "author-url", &article.author_url);
    el.remove();
}

// left in the page for third-party profile widgets
fn linkedin(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.back_fill_author_url(content(el));
    report(debug, written, "authorUrl", "linkedin", &article.author_url);
}

fn published_date(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.set_publish_date(content(el));
    report(debug, written, "publishDate", "published-date", &article.publish_date);
    el.remove();
}

fn modified_date(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let written = article.set_modified_date(content(el));
    report(debug, written, "modifiedDate", "modified-date", &article.modified_date);
    el.remove();
}

fn opt_in_marker(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    article.request_json_ld();
    debug.log("json-ld requested by json-ld metadata");
    el.remove();
}

/// The origin renders unparseable `json-ld` metadata as an empty script with the
/// parse error in `data-error`; authors who typed `article` end up here.
fn error_marker(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    let error = el.get_attribute("data-error").unwrap_or_default();
    if error.to_ascii_lowercase().contains("article") {
        article.request_json_ld();
        debug.log(format_args!("json-ld requested by metadata error: {error}"));
    } else {
        debug.log(format_args!("dropping unrelated json-ld error: {error}"));
    }
    el.remove();
}

fn legacy_marker(el: &mut Element<'_, '_>, article: &mut Article, debug: &DebugLog) {
    article.request_json_ld();
    debug.log("json-ld requested by legacy script");
    el.remove();
}

/// Script element to place after the anchor, if the article qualifies.
///
/// Serialization failures go to the debug log and are swallowed; the page is
/// served without structured data rather than failing.
pub fn injection_for(article: &Article, hostname: &str, debug: &DebugLog) -> Option<String> {
    if !article.is_ready_for_json_ld() {
        debug.log(if article.should_generate_json_ld {
            "json-ld requested but no title found"
        } else {
            "json-ld not requested"
        });
        return None;
    }

    match to_script_tag(&build_json_ld(article, hostname)) {
        Ok(tag) => {
            debug.log(format_args!("injecting json-ld: {tag}"));
            Some(tag)
        }
        Err(e) => {
            debug.log(format_args!("failed to serialize json-ld: {e}"));
            None
        }
    }
}

struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl OutputSink for SharedSink {
    fn handle_chunk(&mut self, chunk: &[u8]) {
        self.0.borrow_mut().extend_from_slice(chunk);
    }
}

/// Incremental HTML rewriter for one response.
///
/// Feed body chunks to [`write`](Self::write) as they arrive and forward whatever it
/// returns; [`end`](Self::end) flushes the tail and hands back the article record.
pub struct ArticleRewriter {
    rewriter: HtmlRewriter<'static, SharedSink>,
    output: Rc<RefCell<Vec<u8>>>,
    article: Rc<RefCell<Article>>,
}

impl ArticleRewriter {
    /// `hostname` is used as the JSON-LD publisher name
    pub fn new(hostname: &str, debug: DebugLog) -> Self {
        let article = Rc::new(RefCell::new(Article::new()));
        let output = Rc::new(RefCell::new(Vec::new()));

        let mut handlers = Vec::with_capacity(RULES.len() + 1);
        for rule in RULES {
            let article = Rc::clone(&article);
            let handler = rule.handler;
            handlers.push(element!(rule.selector, move |el| {
                handler(el, &mut article.borrow_mut(), &debug);
                Ok(())
            }));
        }

        let anchor_article = Rc::clone(&article);
        let hostname = hostname.to_string();
        let mut fired = false;
        handlers.push(element!(ANCHOR_SELECTOR, move |el| {
            if fired {
                return Ok(());
            }
            fired = true;
            if let Some(tag) = injection_for(&anchor_article.borrow(), &hostname, &debug) {
                el.after(&tag, ContentType::Html);
            }
            Ok(())
        }));

        let rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                ..Settings::default()
            },
            SharedSink(Rc::clone(&output)),
        );

        Self {
            rewriter,
            output,
            article,
        }
    }

    fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.output.borrow_mut())
    }

    /// Push one chunk through; returns the bytes ready to send on.
    pub fn write(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        self.rewriter
            .write(chunk)
            .map_err(|e| EdgeError::Rewrite(e.to_string()))?;
        Ok(self.take_output())
    }

    /// Finish the document, returning the remaining bytes and what was extracted
    pub fn end(self) -> Result<(Vec<u8>, Article)> {
        self.rewriter
            .end()
            .map_err(|e| EdgeError::Rewrite(e.to_string()))?;
        let tail = std::mem::take(&mut *self.output.borrow_mut());
        let article = self.article.borrow().clone();
        Ok((tail, article))
    }
}

/// Rewrite a complete document in one go
pub fn rewrite_html(html: &str, hostname: &str, debug: DebugLog) -> anyhow::Result<(String, Article)> {
    let mut rewriter = ArticleRewriter::new(hostname, debug);
    let mut out = rewriter
        .write(html.as_bytes())
        .context("failed to rewrite html")?;
    let (tail, article) = rewriter.end().context("failed to finish html rewrite")?;
    out.extend_from_slice(&tail);

    let html = String::from_utf8(out).context("rewritten html is not utf-8")?;
    Ok((html, article))
}

/// Whether a response with this content type should go through the rewriter
pub fn is_html(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
}
