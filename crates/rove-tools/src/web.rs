//! webresearch: search, read the top results, synthesize
//!
//! Search results come from an HTML results page. Each result page is fetched
//! best-effort; a page that cannot be fetched contributes its search snippet
//! instead.

use rove_agent::complete_with_retry;
use rove_core::{ChatRequest, Message};
use scraper::{Html, Node, Selector};
use tracing::{instrument, warn};
use url::Url;

use crate::error::{ToolError, ToolErrorKind, ToolResult};
use crate::registry::ToolServices;

/// Organic results used per query
pub const MAX_RESULTS: usize = 3;

/// Characters of page text passed to synthesis per result
pub const MAX_PAGE_CHARS: usize = 4_000;

/// One organic search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[instrument(skip(services))]
pub async fn web_research(services: &ToolServices, query: &str) -> ToolResult {
    let page = services
        .http
        .get_with(&services.search.web_search, &[("q", query)], &[])
        .await
        .map_err(|e| ToolError::new(ToolErrorKind::Network, format!("Error: Web search failed: {}", e)))?;

    if !page.is_success() {
        return Err(ToolError::new(
            ToolErrorKind::Network,
            format!("Error: Web search returned HTTP {}", page.status),
        ));
    }

    let results = parse_search_results(&page.body, MAX_RESULTS);
    if results.is_empty() {
        return Ok(format!("No web results found for \"{}\"", query));
    }
    tracing::info!("Found {} search results for {:?}", results.len(), query);

    let mut sources = Vec::with_capacity(results.len());
    for result in &results {
        let content = match fetch_page_text(services, &result.url).await {
            Some(text) if !text.is_empty() => text,
            _ => result.snippet.clone(),
        };
        sources.push(content);
    }

    let request = ChatRequest::new(
        services.text_model.clone(),
        vec![
            Message::system(
                "You are a research assistant. Synthesize the provided sources into a concise, \
                 accurate answer to the query. Mention disagreements between sources.",
            ),
            Message::user(synthesis_prompt(query, &results, &sources)),
        ],
    );

    let reply = complete_with_retry(services.model.as_ref(), &request, services.backoff)
        .await
        .map_err(|e| {
            ToolError::new(
                ToolErrorKind::Model,
                format!("Error: Failed to synthesize research results: {}", e),
            )
        })?;

    let summary = reply
        .text_content()
        .unwrap_or("The model returned no summary.")
        .to_string();

    let source_list = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} - {}", i + 1, r.title, r.url))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!("{}\n\nSources:\n{}", summary, source_list))
}

async fn fetch_page_text(services: &ToolServices, url: &str) -> Option<String> {
    match services.http.get(url).await {
        Ok(response) if response.is_success() => {
            Some(extract_page_text(&response.body, MAX_PAGE_CHARS))
        }
        Ok(response) => {
            warn!("Fetching {} returned HTTP {}, using snippet", url, response.status);
            None
        }
        Err(e) => {
            warn!("Fetching {} failed, using snippet: {}", url, e);
            None
        }
    }
}

fn synthesis_prompt(query: &str, results: &[SearchResult], sources: &[String]) -> String {
    let mut prompt = format!("Query: {}\n\n", query);
    for (i, (result, content)) in results.iter().zip(sources).enumerate() {
        prompt.push_str(&format!(
            "Source {} - {} ({})\n{}\n\n",
            i + 1,
            result.title,
            result.url,
            content
        ));
    }
    prompt.push_str("Write a single summary that answers the query using these sources.");
    prompt
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Organic results from an HTML search results page (ads skipped)
pub fn parse_search_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let (Some(result_sel), Some(link_sel), Some(snippet_sel)) = (
        selector("div.result"),
        selector("a.result__a"),
        selector(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        if element
            .value()
            .classes()
            .any(|c| c == "result--ad")
        {
            continue;
        }

        let Some(link) = element.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(decode_result_link) else {
            continue;
        };

        let title = collapse_whitespace(&link.text().collect::<String>());
        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_whitespace(&s.text().collect::<String>()))
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url,
            snippet,
        });
        if results.len() >= limit {
            break;
        }
    }

    results
}

/// Resolve a result link to its target URL
///
/// Result pages wrap targets in a redirect whose `uddg` parameter holds the
/// real URL; plain absolute links are returned unchanged.
pub fn decode_result_link(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }

    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

/// Visible text of an HTML page, whitespace collapsed, capped at `max_chars`
pub fn extract_page_text(html: &str, max_chars: usize) -> String {
    const SKIPPED: [&str; 6] = ["script", "style", "noscript", "head", "svg", "template"];

    let document = Html::parse_document(html);
    let mut pieces = Vec::new();

    for node in document.tree.root().descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| SKIPPED.contains(&el.name()))
            });
            if !hidden {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    pieces.push(trimmed);
                }
            }
        }
    }

    let text = collapse_whitespace(&pieces.join(" "));
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::services_with;
    use crate::registry::SearchEndpoints;
    use rove_agent::testing::{ScriptedModel, StubResponse, StubServer};
    use rove_core::{AssistantReply, MessageContent};
    use std::sync::Arc;

    fn results_page(base: &str) -> String {
        let link = |path: &str| {
            format!(
                "//duckduckgo.com/l/?uddg={}&rut=abc",
                url::form_urlencoded::byte_serialize(format!("{}{}", base, path).as_bytes())
                    .collect::<String>()
            )
        };
        format!(
            r#"<html><body>
            <div class="result result--ad"><a class="result__a" href="https://ads.example/">Sponsored</a></div>
            <div class="result"><a class="result__a" href="{}">First <b>Page</b></a>
                <a class="result__snippet">Snippet one</a></div>
            <div class="result"><a class="result__a" href="{}">Second Page</a>
                <a class="result__snippet">Snippet two</a></div>
            <div class="result"><a class="result__a" href="{}">Third Page</a>
                <a class="result__snippet">Snippet three</a></div>
            <div class="result"><a class="result__a" href="{}">Fourth Page</a></div>
            </body></html>"#,
            link("/one"),
            link("/two"),
            link("/three"),
            link("/four"),
        )
    }

    #[test]
    fn test_parse_search_results() {
        let html = results_page("https://site.test");
        let results = parse_search_results(&html, 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "First Page");
        assert_eq!(results[0].url, "https://site.test/one");
        assert_eq!(results[0].snippet, "Snippet one");
        assert_eq!(results[2].url, "https://site.test/three");
    }

    #[test]
    fn test_decode_result_link() {
        assert_eq!(
            decode_result_link("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1&rut=x"),
            Some("https://example.com/a?b=1".to_string())
        );
        assert_eq!(
            decode_result_link("https://example.com/direct"),
            Some("https://example.com/direct".to_string())
        );
        assert_eq!(decode_result_link("javascript:void(0)"), None);
        assert_eq!(decode_result_link("/relative"), None);
    }

    #[test]
    fn test_extract_page_text() {
        let html = r#"<html><head><title>T</title><style>.a{}</style></head>
            <body><h1>Hello</h1><script>var x = 1;</script>
            <p>World   of
            text</p></body></html>"#;
        assert_eq!(extract_page_text(html, 100), "Hello World of text");
        assert_eq!(extract_page_text(html, 5), "Hello...");
    }

    #[tokio::test]
    async fn test_web_research_falls_back_to_snippet() {
        let server = StubServer::start(|req| {
            let base = format!("http://{}", req.header("host").unwrap_or_default());
            match req.route() {
                "/html/" => StubResponse::html(results_page(&base)),
                "/one" => StubResponse::html("<html><body><p>Full text of page one</p></body></html>"),
                "/two" => StubResponse::status(404),
                "/three" => StubResponse::html("<html><body><p>Page three body</p></body></html>"),
                _ => StubResponse::status(404),
            }
        })
        .await
        .unwrap();

        let model = Arc::new(ScriptedModel::new(vec![AssistantReply::text("Synthesized answer")]));
        let services = services_with(
            model.clone(),
            SearchEndpoints {
                web_search: server.url("/html/"),
                ..SearchEndpoints::default()
            },
        );

        let output = web_research(&services, "rust async").await.unwrap();

        assert!(output.starts_with("Synthesized answer\n\nSources:\n1. First Page - http://"));
        assert!(output.contains("3. Third Page"));
        assert!(!output.contains("Fourth Page"));

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "text-model");
        let MessageContent::Text(prompt) = (match &requests[0].messages[1] {
            Message::User { content } => content.clone(),
            other => panic!("unexpected message {:?}", other),
        }) else {
            panic!("expected text prompt");
        };
        assert!(prompt.contains("Full text of page one"));
        assert!(prompt.contains("Snippet two"));
        assert!(prompt.contains("Page three body"));

        let search = &server.requests()[0];
        assert_eq!(search.path, "/html/?q=rust+async");
    }

    #[tokio::test]
    async fn test_web_research_without_results() {
        let server = StubServer::scripted(vec![StubResponse::html("<html><body>nothing</body></html>")])
            .await
            .unwrap();
        let model = Arc::new(ScriptedModel::new(vec![]));
        let services = services_with(
            model.clone(),
            SearchEndpoints {
                web_search: server.url("/html/"),
                ..SearchEndpoints::default()
            },
        );

        let output = web_research(&services, "zzqx").await.unwrap();

        assert_eq!(output, "No web results found for \"zzqx\"");
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_web_research_search_failure_is_error_text() {
        let server = StubServer::scripted(vec![StubResponse::status(403)]).await.unwrap();
        let services = services_with(
            Arc::new(ScriptedModel::new(vec![])),
            SearchEndpoints {
                web_search: server.url("/html/"),
                ..SearchEndpoints::default()
            },
        );

        let err = web_research(&services, "q").await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Network);
        assert_eq!(err.message, "Error: Web search returned HTTP 403");
    }
}
