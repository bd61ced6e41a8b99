//! analyze_image and image_search_analysis

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use rove_agent::complete_with_retry;
use rove_core::{ChatRequest, ContentPart, ImageSource, Message};
use scraper::{Html, Selector};
use tracing::{instrument, warn};

use crate::error::{ToolError, ToolErrorKind, ToolResult};
use crate::fs;
use crate::registry::ToolServices;

/// Images analyzed per search
pub const MAX_IMAGES: usize = 3;

const DEFAULT_IMAGE_PROMPT: &str = "Describe this image in detail.";

/// Image MIME type from a file extension, JPEG when unknown or not an image
pub fn mime_for_path(path: &str) -> String {
    mime_guess::from_path(path)
        .first()
        .filter(|mime| mime.type_().as_str() == "image")
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| "image/jpeg".to_string())
}

fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

#[instrument(skip(services, working_dir, prompt))]
pub async fn analyze_image(
    services: &ToolServices,
    working_dir: &Path,
    path: &str,
    prompt: Option<&str>,
) -> ToolResult {
    let source = if is_remote(path) {
        check_reachable(services, path).await?;
        ImageSource::Url(path.to_string())
    } else {
        let bytes = tokio::fs::read(fs::resolve(working_dir, path))
            .await
            .map_err(|e| fs::read_error(path, &e))?;
        ImageSource::Inline {
            mime: mime_for_path(path),
            data: STANDARD.encode(bytes),
        }
    };

    describe_image(services, &source, prompt.unwrap_or(DEFAULT_IMAGE_PROMPT), path).await
}

async fn check_reachable(services: &ToolServices, url: &str) -> Result<(), ToolError> {
    let response = services.image_http().head(url).await.map_err(|e| {
        ToolError::new(
            ToolErrorKind::Network,
            format!("Error: Image URL is not reachable: {} ({})", url, e),
        )
    })?;

    if !response.is_success() {
        return Err(ToolError::new(
            ToolErrorKind::Network,
            format!("Error: Image URL returned HTTP {}: {}", response.status, url),
        ));
    }
    Ok(())
}

async fn describe_image(
    services: &ToolServices,
    source: &ImageSource,
    prompt: &str,
    label: &str,
) -> ToolResult {
    let request = ChatRequest::new(
        services.vision_model.clone(),
        vec![Message::user_parts(vec![
            ContentPart::text(prompt),
            ContentPart::image(source),
        ])],
    );

    let reply = complete_with_retry(services.model.as_ref(), &request, services.image_backoff())
        .await
        .map_err(|e| {
            ToolError::new(
                ToolErrorKind::Model,
                format!("Error: Image analysis failed for {}: {}", label, e),
            )
        })?;

    reply.text_content().map(str::to_string).ok_or_else(|| {
        ToolError::new(
            ToolErrorKind::Model,
            format!("Error: The model returned no analysis for {}", label),
        )
    })
}

#[instrument(skip(services, analysis_prompt))]
pub async fn image_search_analysis(
    services: &ToolServices,
    query: &str,
    analysis_prompt: Option<&str>,
) -> ToolResult {
    let urls = find_image_urls(services, query).await;
    if urls.is_empty() {
        return Ok(format!("No images found for \"{}\"", query));
    }
    tracing::info!("Analyzing {} image(s) for {:?}", urls.len(), query);

    let prompt = analysis_prompt.unwrap_or(DEFAULT_IMAGE_PROMPT);
    let mut analyses = Vec::with_capacity(urls.len());
    for url in &urls {
        let analysis = match analyze_image(services, Path::new("."), url, Some(prompt)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Image analysis failed for {}: {}", url, e);
                format!("Analysis failed: {}", e.message)
            }
        };
        analyses.push(analysis);
    }

    let summary = match synthesize(services, query, prompt, &urls, &analyses).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!("Image summary failed: {}", e);
            format!("Summary unavailable: {}", e.message)
        }
    };

    let mut output = format!("Image search results for \"{}\"\n\nSummary:\n{}\n\nIndividual analyses:", query, summary);
    for (i, (url, analysis)) in urls.iter().zip(&analyses).enumerate() {
        output.push_str(&format!("\n\nImage {} ({}):\n{}", i + 1, url, analysis));
    }
    Ok(output)
}

async fn synthesize(
    services: &ToolServices,
    query: &str,
    prompt: &str,
    urls: &[String],
    analyses: &[String],
) -> ToolResult {
    let mut text = format!(
        "Query: {}\nAnalysis focus: {}\n\n",
        query, prompt
    );
    for (i, (url, analysis)) in urls.iter().zip(analyses).enumerate() {
        text.push_str(&format!("Image {} ({}):\n{}\n\n", i + 1, url, analysis));
    }
    text.push_str("Summarize what these images show together, noting common themes and differences.");

    let request = ChatRequest::new(services.text_model.clone(), vec![Message::user(text)]);
    let reply = complete_with_retry(services.model.as_ref(), &request, services.backoff)
        .await
        .map_err(|e| ToolError::new(ToolErrorKind::Model, format!("Error: {}", e)))?;

    reply.text_content().map(str::to_string).ok_or_else(|| {
        ToolError::new(ToolErrorKind::Model, "Error: The model returned no summary")
    })
}

/// Up to [`MAX_IMAGES`] image URLs for `query`
///
/// Tries the results page's markup first, then URLs embedded in its scripts,
/// then the JSON image endpoint.
pub async fn find_image_urls(services: &ToolServices, query: &str) -> Vec<String> {
    match services
        .http
        .get_with(&services.search.image_search, &[("q", query), ("form", "HDRSC2")], &[])
        .await
    {
        Ok(page) if page.is_success() => {
            let urls = extract_image_urls(&page.body, MAX_IMAGES);
            if !urls.is_empty() {
                return urls;
            }
            let urls = scan_script_urls(&page.body, MAX_IMAGES);
            if !urls.is_empty() {
                tracing::debug!("Image URLs recovered from page scripts");
                return urls;
            }
        }
        Ok(page) => warn!("Image search returned HTTP {}", page.status),
        Err(e) => warn!("Image search failed: {}", e),
    }

    match json_image_search(services, query).await {
        Ok(urls) => urls,
        Err(e) => {
            warn!("JSON image search failed: {}", e);
            Vec::new()
        }
    }
}

fn push_unique(urls: &mut Vec<String>, url: String) {
    if !urls.contains(&url) {
        urls.push(url);
    }
}

/// Image URLs from result markup: `a.iusc` metadata first, then thumbnails
pub fn extract_image_urls(html: &str, limit: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls = Vec::new();

    if let Ok(sel) = Selector::parse("a.iusc") {
        for element in document.select(&sel) {
            let murl = element
                .value()
                .attr("m")
                .and_then(|m| serde_json::from_str::<serde_json::Value>(m).ok())
                .and_then(|meta| meta.get("murl").and_then(|v| v.as_str()).map(str::to_string));
            if let Some(url) = murl.filter(|u| is_remote(u)) {
                push_unique(&mut urls, url);
            }
            if urls.len() >= limit {
                return urls;
            }
        }
    }

    if let Ok(sel) = Selector::parse("img.mimg, img[data-src]") {
        for element in document.select(&sel) {
            let src = element
                .value()
                .attr("data-src")
                .or_else(|| element.value().attr("src"));
            if let Some(url) = src.filter(|u| is_remote(u)) {
                push_unique(&mut urls, url.to_string());
            }
            if urls.len() >= limit {
                break;
            }
        }
    }

    urls
}

/// Image URLs mentioned anywhere in the page's scripts
pub fn scan_script_urls(html: &str, limit: usize) -> Vec<String> {
    let Ok(pattern) = Regex::new(
        r#"(?i)(?:"murl"\s*:\s*"|&quot;murl&quot;:&quot;)?(https?://[^"'\s<>\\]+?\.(?:jpe?g|png|gif|webp))"#,
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let Ok(script_sel) = Selector::parse("script") else {
        return Vec::new();
    };

    let mut urls = Vec::new();
    for script in document.select(&script_sel) {
        let body = script.text().collect::<String>();
        for caps in pattern.captures_iter(&body) {
            if let Some(url) = caps.get(1) {
                push_unique(&mut urls, url.as_str().to_string());
            }
            if urls.len() >= limit {
                return urls;
            }
        }
    }
    urls
}

/// Search token embedded in the JSON endpoint's landing page
pub fn extract_vqd(html: &str) -> Option<String> {
    let pattern = Regex::new(r#"vqd=["']?([\d-]+)"#).ok()?;
    pattern
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

async fn json_image_search(services: &ToolServices, query: &str) -> rove_core::Result<Vec<String>> {
    let base = services.search.image_json.trim_end_matches('/');
    let landing = services
        .http
        .get_with(&format!("{}/", base), &[("q", query), ("iax", "images"), ("ia", "images")], &[])
        .await?;

    let Some(vqd) = extract_vqd(&landing.body) else {
        tracing::debug!("No search token on image landing page");
        return Ok(Vec::new());
    };

    let referer = format!("{}/", base);
    let response = services
        .http
        .get_with(
            &format!("{}/i.js", base),
            &[("q", query), ("o", "json"), ("vqd", vqd.as_str()), ("l", "us-en")],
            &[("Referer", referer.as_str())],
        )
        .await?;

    if !response.is_success() {
        return Ok(Vec::new());
    }

    let body: serde_json::Value = serde_json::from_str(&response.body)?;
    let mut urls = Vec::new();
    if let Some(results) = body.get("results").and_then(|r| r.as_array()) {
        for result in results {
            if let Some(url) = result.get("image").and_then(|v| v.as_str()).filter(|u| is_remote(u)) {
                push_unique(&mut urls, url.to_string());
            }
            if urls.len() >= MAX_IMAGES {
                break;
            }
        }
    }
    Ok(urls)
}
