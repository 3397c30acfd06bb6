//! Конвейер генерации
//!
//! Валидация → кодирование → фон → композиция → (проверка сканирования).
//! Ошибки получения фона не прерывают запрос: вместо фона берётся
//! градиент по умолчанию. Исключение: AI-фон, помеченный как обязательный.

use crate::background::{Background, BackgroundResolver, BackgroundSource, FetchConfig, Gradient};
use crate::compose::{CompositionResult, Compositor, DecorationSpec};
use crate::encoding::encode;
use crate::events::{EventSink, LogSink, PipelineEvent};
use crate::provider::{ImageProvider, ProviderError};
use crate::request::{EncodingRequest, ErrorCorrectionLevel, ValidationError};
use crate::style::ArtStyle;
use crate::verify::{ScanVerifier, ScannedCode};
use crate::{BackgroundError, ErrorKind, QrArtError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Конфигурация конвейера
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub decoration: DecorationSpec,
    pub fetch: FetchConfig,
    /// Проверять результат декодером перед выдачей
    pub verify_scan: bool,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, QrArtError> {
        let config: Self = serde_json::from_str(json).map_err(|e| QrArtError::Config(e.to_string()))?;
        config.decoration.validate()?;
        Ok(config)
    }
}

/// Откуда брать фон
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundRequest {
    /// Без фона: сплошная заливка
    #[default]
    None,
    /// Градиент или внешнее изображение
    Source { source: BackgroundSource },
    /// Сгенерировать через провайдера
    Ai {
        prompt: String,
        #[serde(default)]
        style: ArtStyle,
        /// Без AI-фона запрос считается неудачным
        #[serde(default)]
        required: bool,
    },
}

/// Запрос на генерацию
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub encoding: EncodingRequest,
    #[serde(default)]
    pub background: BackgroundRequest,
}

impl GenerationRequest {
    pub fn new(encoding: EncodingRequest, background: BackgroundRequest) -> Self {
        Self { encoding, background }
    }

    /// Проверка до начала любой работы
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.encoding.validate()?;
        if let BackgroundRequest::Ai { prompt, .. } = &self.background {
            if prompt.trim().is_empty() {
                return Err(ValidationError::EmptyPrompt);
            }
        }
        Ok(())
    }
}

/// Результат генерации
#[derive(Debug, Clone)]
pub struct Generation {
    pub result: CompositionResult,
    /// Почему не удалось получить запрошенный фон
    pub background_error: Option<BackgroundError>,
    /// Результат проверки сканирования, если она включена
    pub scan: Option<ScannedCode>,
}

/// Конвейер генерации
pub struct ArtQrPipeline {
    compositor: Compositor,
    resolver: BackgroundResolver,
    provider: Option<Arc<dyn ImageProvider>>,
    sink: Arc<dyn EventSink>,
    verifier: Option<ScanVerifier>,
}

impl ArtQrPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, QrArtError> {
        config.decoration.validate()?;
        let resolver = BackgroundResolver::new(config.decoration.canvas_size, config.fetch)
            .map_err(|e| QrArtError::Config(e.to_string()))?;

        Ok(Self {
            compositor: Compositor::new(config.decoration),
            resolver,
            provider: None,
            sink: Arc::new(LogSink),
            verifier: config.verify_scan.then(ScanVerifier::new),
        })
    }

    /// Провайдер AI-фона
    pub fn with_provider(mut self, provider: impl ImageProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Приёмник событий
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Полная генерация по запросу
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation, QrArtError> {
        let outcome = self.run(request).await;
        if let Err(e) = &outcome {
            self.sink.report(&PipelineEvent::Failed {
                kind: e.kind(),
                message: e.to_string(),
            });
        }
        outcome
    }

    async fn run(&self, request: &GenerationRequest) -> Result<Generation, QrArtError> {
        // 1. Валидация
        request.validate()?;

        // 2. Матрица (до любых сетевых запросов)
        if request.encoding.level != ErrorCorrectionLevel::H {
            log::info!(
                "Promoting error correction {:?} -> H for composited output",
                request.encoding.level
            );
        }
        let matrix = encode(&request.encoding.payload, ErrorCorrectionLevel::H)?;
        self.compositor.check_fit(&matrix)?;

        // 3. Фон
        let (background, background_error) = match self.resolve_background(&request.background).await {
            Ok(bg) => (bg, None),
            Err(e) => {
                if let BackgroundRequest::Ai { required: true, .. } = request.background {
                    return Err(e.into());
                }
                self.sink.report(&PipelineEvent::BackgroundFallback {
                    kind: ErrorKind::from(&e),
                    message: e.to_string(),
                });
                let fallback = Background::from_gradient(&Gradient::default(), self.resolver.size());
                (Some(fallback), Some(e))
            }
        };

        // 4. Композиция
        let result = self
            .compositor
            .compose(background.as_ref(), &matrix, (&request.encoding).into());
        self.sink.report(&PipelineEvent::Composed {
            width: result.width(),
            height: result.height(),
            version: matrix.version(),
        });

        // 5. Проверка
        let scan = match &self.verifier {
            Some(verifier) => {
                let scanned = verifier.verify(&result, &request.encoding.payload)?;
                self.sink.report(&PipelineEvent::Verified {
                    decoder: scanned.decoder.clone(),
                });
                Some(scanned)
            }
            None => None,
        };

        Ok(Generation {
            result,
            background_error,
            scan,
        })
    }

    async fn resolve_background(&self, request: &BackgroundRequest) -> Result<Option<Background>, BackgroundError> {
        match request {
            BackgroundRequest::None => Ok(None),
            BackgroundRequest::Source { source } => {
                let bg = self.resolver.resolve(source).await?;
                self.sink.report(&PipelineEvent::BackgroundResolved {
                    source: source_label(source).to_string(),
                });
                Ok(Some(bg))
            }
            BackgroundRequest::Ai { prompt, style, .. } => {
                let provider = self.provider.as_ref().ok_or(ProviderError::NotConfigured)?;
                self.sink.report(&PipelineEvent::ProviderRequested {
                    provider: provider.name().to_string(),
                });

                let full_prompt = style.prompt(prompt);
                let generated = provider.generate(&full_prompt).await?;
                let bg = self.resolver.resolve_generated(generated).await?;
                self.sink.report(&PipelineEvent::BackgroundResolved {
                    source: provider.name().to_string(),
                });
                Ok(Some(bg))
            }
        }
    }
}

fn source_label(source: &BackgroundSource) -> &'static str {
    match source {
        BackgroundSource::Gradient(_) => "gradient",
        BackgroundSource::ExternalImage { .. } => "external_image",
        BackgroundSource::None => "none",
    }
}
