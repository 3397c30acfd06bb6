//! События конвейера для UI / логов
//!
//! Ядро не форматирует сообщения для пользователя, а только сообщает,
//! что произошло и какого вида была ошибка.

use crate::ErrorKind;
use serde::{Deserialize, Serialize};

/// Событие конвейера
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Запрошена генерация AI-фона
    ProviderRequested { provider: String },
    /// Фон получен
    BackgroundResolved { source: String },
    /// Фон не получен, используется градиент по умолчанию
    BackgroundFallback { kind: ErrorKind, message: String },
    /// Изображение собрано
    Composed { width: u32, height: u32, version: u8 },
    /// Проверка сканирования прошла
    Verified { decoder: String },
    /// Запрос завершился ошибкой
    Failed { kind: ErrorKind, message: String },
}

/// Приёмник событий
pub trait EventSink: Send + Sync {
    fn report(&self, event: &PipelineEvent);
}

/// Приёмник, пишущий события в `log`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn report(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::BackgroundFallback { kind, message } => {
                log::warn!("Background unavailable ({:?}): {}, using default gradient", kind, message)
            }
            PipelineEvent::Failed { kind, message } => log::error!("Generation failed ({:?}): {}", kind, message),
            other => log::info!("{:?}", other),
        }
    }
}

/// Приёмник без действий
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn report(&self, _event: &PipelineEvent) {}
}
