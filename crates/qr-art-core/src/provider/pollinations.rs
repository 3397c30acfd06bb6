//! Бесплатный провайдер Pollinations
//!
//! Изображение генерируется сервером на лету при запросе URL, поэтому
//! сама генерация сводится к сборке ссылки.

use super::{GeneratedImage, ImageProvider, ProviderError, ProviderFuture};

const DEFAULT_BASE_URL: &str = "https://image.pollinations.ai/prompt";

/// Провайдер Pollinations
#[derive(Debug, Clone)]
pub struct PollinationsProvider {
    base_url: String,
    width: u32,
    height: u32,
}

impl Default for PollinationsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PollinationsProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            width: 1024,
            height: 1024,
        }
    }

    /// Другой адрес сервиса (зеркало, тестовый сервер)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// URL изображения для промпта
    pub fn image_url(&self, prompt: &str) -> Result<String, ProviderError> {
        let cleaned = clean_prompt(prompt);
        if cleaned.trim().is_empty() {
            return Err(ProviderError::BadRequest {
                status: 400,
                message: "prompt is empty after cleaning".to_string(),
            });
        }

        Ok(format!(
            "{}/{}?width={}&height={}&nologo=true",
            self.base_url,
            urlencoding::encode(&cleaned),
            self.width,
            self.height
        ))
    }
}

/// Очистка промпта: остаются латиница, цифры, `_`, пробелы и `,.-`
pub fn clean_prompt(prompt: &str) -> String {
    prompt
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '_' | ',' | '.' | '-'))
        .collect()
}

impl ImageProvider for PollinationsProvider {
    fn name(&self) -> &'static str {
        "pollinations"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move { self.image_url(prompt).map(GeneratedImage::Url) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_prompt() {
        assert_eq!(clean_prompt("  cherry blossom, sunset!! "), "cherry blossom, sunset");
        assert_eq!(clean_prompt("khu vườn hoa"), "khu vn hoa");
        assert_eq!(clean_prompt("a-b_c.d"), "a-b_c.d");
    }

    #[test]
    fn test_image_url() {
        let provider = PollinationsProvider::new();
        let url = provider.image_url("blue sky, white clouds").unwrap();
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/blue%20sky%2C%20white%20clouds?width=1024&height=1024&nologo=true"
        );
    }

    #[test]
    fn test_custom_base_and_size() {
        let provider = PollinationsProvider::new()
            .with_base_url("http://localhost:8080/prompt/")
            .with_size(512, 512);
        let url = provider.image_url("cat").unwrap();
        assert_eq!(url, "http://localhost:8080/prompt/cat?width=512&height=512&nologo=true");
    }

    #[test]
    fn test_prompt_without_usable_chars() {
        let provider = PollinationsProvider::new();
        assert!(matches!(provider.image_url("!!! ???"), Err(ProviderError::BadRequest { .. })));
    }
}
