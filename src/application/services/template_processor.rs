use crate::domain::entities::{Template, TemplateStatus};
use crate::domain::ports::file_storage::FileStorage;
use crate::domain::ports::template_repository::TemplateRepository;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use base64::Engine;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

fn data_uri_regex() -> &'static Regex {
    static DATA_URI_REGEX: OnceLock<Regex> = OnceLock::new();
    DATA_URI_REGEX.get_or_init(|| {
        // Payloads may be wrapped across lines; continuation lines may carry
        // the padding.
        Regex::new(
            r"(?i)data:image/(png|jpeg|jpg|gif|webp|bmp|svg\+xml|x-icon);base64,([A-Za-z0-9+/]+(?:[ \t]*\r?\n[ \t]*[A-Za-z0-9+/=]+)*={0,2})",
        )
        .expect("Invalid data URI regex")
    })
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

fn extension_for(kind: &str) -> &'static str {
    match kind.to_ascii_lowercase().as_str() {
        "png" => "png",
        "jpeg" | "jpg" => "jpg",
        "gif" => "gif",
        "webp" => "webp",
        "bmp" => "bmp",
        "svg+xml" => "svg",
        "x-icon" => "ico",
        _ => "bin",
    }
}

/// One inline image found in template HTML. `data_uri` has line wrapping
/// removed.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub data_uri: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Distinct data-URI images in `html`, in order of first appearance.
pub fn find_inline_images(html: &str) -> ApiResult<Vec<InlineImage>> {
    let mut images: Vec<InlineImage> = Vec::new();

    for cap in data_uri_regex().captures_iter(html) {
        let data_uri = strip_whitespace(&cap[0]);
        if images.iter().any(|img| img.data_uri == data_uri) {
            continue;
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(strip_whitespace(&cap[2]))
            .map_err(|e| ApiError::bad_request(format!("Invalid base64 image data: {}", e)))?;

        images.push(InlineImage {
            data_uri,
            extension: extension_for(&cap[1]),
            bytes,
        });
    }

    Ok(images)
}

/// Replace every data URI whose unwrapped form has an entry in `urls`.
pub fn rewrite_image_references(html: &str, urls: &HashMap<String, String>) -> String {
    data_uri_regex()
        .replace_all(html, |cap: &Captures| {
            urls.get(&strip_whitespace(&cap[0]))
                .cloned()
                .unwrap_or_else(|| cap[0].to_string())
        })
        .into_owned()
}

/// Image-extraction pipeline run once per uploaded template.
///
/// Steps: find data-URI images, upload each decoded image, persist the
/// rewritten HTML. Any failure leaves the template disabled.
#[derive(Clone)]
pub struct TemplateProcessor {
    template_repo: Arc<dyn TemplateRepository>,
    storage: Arc<dyn FileStorage>,
}

impl TemplateProcessor {
    pub fn new(template_repo: Arc<dyn TemplateRepository>, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            template_repo,
            storage,
        }
    }

    /// Returns the number of images extracted.
    pub async fn process(&self, template_id: &str) -> ApiResult<usize> {
        let template = self
            .template_repo
            .get_template(template_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Template {} not found", template_id)))?;

        if template.status == TemplateStatus::Deleted {
            tracing::info!("Skipping processing of deleted template {}", template_id);
            return Ok(0);
        }

        // Status moves only out of `processing`, so a delete that lands
        // mid-run is not undone.
        match self.extract_and_store(template_id).await {
            Ok(count) => {
                let moved = self
                    .template_repo
                    .transition_template_status(
                        template_id,
                        TemplateStatus::Processing,
                        TemplateStatus::InService,
                    )
                    .await?;
                if !moved {
                    tracing::info!(
                        "Template {} changed during processing, leaving its status",
                        template_id
                    );
                    return Ok(count);
                }
                metrics::counter!("templates_processed_total").increment(1);
                tracing::info!(
                    "Template {} in service ({} image(s) extracted)",
                    template_id,
                    count
                );
                Ok(count)
            }
            Err(e) => {
                metrics::counter!("templates_failed_total").increment(1);
                tracing::error!("Processing template {} failed: {}", template_id, e);
                if let Err(status_err) = self
                    .template_repo
                    .transition_template_status(
                        template_id,
                        TemplateStatus::Processing,
                        TemplateStatus::Disabled,
                    )
                    .await
                {
                    tracing::error!(
                        "Failed to disable template {}: {}",
                        template_id,
                        status_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn extract_and_store(&self, template_id: &str) -> ApiResult<usize> {
        let source = self.storage.read(&Template::source_key(template_id)).await?;
        let html = String::from_utf8(source)
            .map_err(|_| ApiError::bad_request("Template HTML is not valid UTF-8"))?;

        let images = find_inline_images(&html)?;

        let mut urls = HashMap::with_capacity(images.len());
        for image in &images {
            let key = format!(
                "{}/{}.{}",
                Template::image_prefix(template_id),
                Uuid::new_v4(),
                image.extension
            );
            self.storage.save(&key, &image.bytes).await?;
            urls.insert(image.data_uri.clone(), self.storage.public_url(&key));
        }

        let rewritten = rewrite_image_references(&html, &urls);
        self.storage
            .save(&Template::html_key(template_id), rewritten.as_bytes())
            .await?;

        Ok(images.len())
    }
}
