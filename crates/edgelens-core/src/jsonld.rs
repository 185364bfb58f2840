//! schema.org `Article` synthesis from extracted page metadata

use crate::article::Article;
use crate::dates::format_iso8601_date;
use serde::Serialize;

pub const SCHEMA_CONTEXT: &str = "https://schema.org";

/// A schema.org Article ready to be embedded as JSON-LD
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JsonLdArticle {
    #[serde(rename = "@context")]
    pub context: &'static str,
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub headline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "datePublished", skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(rename = "dateModified", skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageObject>,
    pub publisher: Organization,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Person {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageObject {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Organization {
    #[serde(rename = "@type")]
    pub kind: &'static str,
    pub name: String,
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// Map an article record onto a schema.org Article.
///
/// The caller decides whether synthesis should happen at all; an article without a
/// title yields an empty headline. Dates that can't be normalized are left out.
pub fn build_json_ld(article: &Article, hostname: &str) -> JsonLdArticle {
    JsonLdArticle {
        context: SCHEMA_CONTEXT,
        kind: "Article",
        headline: article.title.clone().unwrap_or_default(),
        description: present(&article.description),
        url: present(&article.url),
        date_published: article
            .publish_date
            .as_deref()
            .and_then(format_iso8601_date),
        date_modified: article
            .modified_date
            .as_deref()
            .and_then(format_iso8601_date),
        author: present(&article.author).map(|name| Person {
            kind: "Person",
            name,
            url: present(&article.author_url),
        }),
        image: present(&article.image).map(|url| ImageObject {
            kind: "ImageObject",
            url,
            caption: present(&article.image_alt),
        }),
        publisher: Organization {
            kind: "Organization",
            name: hostname.to_string(),
        },
    }
}

/// Serialize for embedding inside `<script>`; `</` is escaped so no string
/// value can terminate the element early.
pub fn to_script_json(json_ld: &JsonLdArticle) -> serde_json::Result<String> {
    Ok(serde_json::to_string(json_ld)?.replace("</", "<\\/"))
}

/// The full `<script type="application/ld+json">` element
pub fn to_script_tag(json_ld: &JsonLdArticle) -> serde_json::Result<String> {
    Ok(format!(
        r#"<script type="application/ld+json">{}</script>"#,
        to_script_json(json_ld)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as JsonValue;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    fn titled(title: &str) -> Article {
        let mut article = Article::new();
        article.set_title(some(title));
        article
    }

    fn as_value(article: &Article) -> JsonValue {
        serde_json::to_value(build_json_ld(article, "www.example.com")).unwrap()
    }

    #[test]
    fn title_only_has_minimal_keys() {
        let article = titled("Hello");
        let value = as_value(&article);
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["@context", "@type", "headline", "publisher"]);
        assert_eq!(value["@context"], "https://schema.org");
        assert_eq!(value["@type"], "Article");
        assert_eq!(value["headline"], "Hello");
        assert_eq!(value["publisher"]["@type"], "Organization");
        assert_eq!(value["publisher"]["name"], "www.example.com");
    }

    #[test]
    fn full_article() {
        let mut article = titled("Hello");
        article.offer_description(some("About things"));
        article.offer_image(some("https://www.example.com/hero.png"));
        article.offer_image_alt(some("A hero"));
        article.offer_url(some("https://www.example.com/hello"));
        article.offer_author(some("Jane Doe"));
        article.set_author_url(some("https://www.example.com/authors/jane"));
        article.set_publish_date(some("December 10, 2024"));
        article.set_modified_date(some("11/12/2024"));
        let value = as_value(&article);
        assert_eq!(value["description"], "About things");
        assert_eq!(value["url"], "https://www.example.com/hello");
        assert_eq!(value["datePublished"], "2024-12-10");
        assert_eq!(value["dateModified"], "2024-12-11");
        assert_eq!(value["author"]["@type"], "Person");
        assert_eq!(value["author"]["name"], "Jane Doe");
        assert_eq!(value["author"]["url"], "https://www.example.com/authors/jane");
        assert_eq!(value["image"]["@type"], "ImageObject");
        assert_eq!(value["image"]["url"], "https://www.example.com/hero.png");
        assert_eq!(value["image"]["caption"], "A hero");
    }

    #[test]
    fn nested_objects_omit_absent_parts() {
        let mut article = titled("Hello");
        article.offer_author(some("Jane Doe"));
        article.offer_image(some("https://www.example.com/hero.png"));
        let value = as_value(&article);
        assert!(value["author"].get("url").is_none());
        assert!(value["image"].get("caption").is_none());
    }

    #[test]
    fn orphan_sub_fields_are_dropped() {
        let mut article = titled("Hello");
        article.back_fill_author_url(some("https://www.linkedin.com/in/jane"));
        article.offer_image_alt(some("A hero"));
        let value = as_value(&article);
        assert!(value.get("author").is_none());
        assert!(value.get("image").is_none());
    }

    #[test]
    fn profile_link_becomes_author_url() {
        let mut article = titled("Hello");
        article.offer_author(some("Jane Doe"));
        article.back_fill_author_url(some("https://www.linkedin.com/in/jane"));
        let value = as_value(&article);
        assert_eq!(value["author"]["url"], "https://www.linkedin.com/in/jane");
    }

    #[test]
    fn bad_dates_are_omitted() {
        let mut article = titled("Hello");
        article.set_publish_date(some("sometime last week"));
        article.set_modified_date(some("31/04/2024"));
        let value = as_value(&article);
        assert!(value.get("datePublished").is_none());
        assert!(value.get("dateModified").is_none());
    }

    #[test]
    fn impossible_canonical_dates_are_omitted() {
        let mut article = titled("Hello");
        article.set_publish_date(some("2024-13-45"));
        article.set_modified_date(some("2023-02-29"));
        let value = as_value(&article);
        assert!(value.get("datePublished").is_none());
        assert!(value.get("dateModified").is_none());

        let mut leap = titled("Hello");
        leap.set_publish_date(some("2024-02-29"));
        assert_eq!(as_value(&leap)["datePublished"], "2024-02-29");
    }

    #[test]
    fn script_tag_escapes_closing_sequences() {
        let article = titled("</script><script>alert(1)</script>");
        let tag = to_script_tag(&build_json_ld(&article, "www.example.com")).unwrap();
        assert!(tag.starts_with(r#"<script type="application/ld+json">{"#));
        assert_eq!(tag.matches("</script>").count(), 1);

        let inner = &tag[r#"<script type="application/ld+json">"#.len()..tag.len() - "</script>".len()];
        let value: JsonValue = serde_json::from_str(inner).unwrap();
        assert_eq!(value["headline"], "</script><script>alert(1)</script>");
    }
}
