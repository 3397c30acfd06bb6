//! Сессия генерации
//!
//! Не больше одной генерации одновременно. Последний успешный результат
//! хранится до следующего успеха: неудачный запрос его не затирает.

use crate::pipeline::{ArtQrPipeline, Generation, GenerationRequest};
use crate::QrArtError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub struct GenerationSession {
    pipeline: ArtQrPipeline,
    /// Занят, пока идёт генерация
    in_flight: AtomicBool,
    last: Mutex<Option<Generation>>,
}

/// Снимает флаг занятости при завершении или отмене генерации
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl GenerationSession {
    pub fn new(pipeline: ArtQrPipeline) -> Self {
        Self {
            pipeline,
            in_flight: AtomicBool::new(false),
            last: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &ArtQrPipeline {
        &self.pipeline
    }

    /// Генерация. Пока предыдущая не завершилась, возвращает `Busy`.
    /// Отмена: достаточно уронить future, результат при этом не меняется.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Generation, QrArtError> {
        let _guard = self.begin()?;

        let generation = self.pipeline.generate(request).await?;
        match self.last.lock() {
            Ok(mut last) => *last = Some(generation.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(generation.clone()),
        }
        Ok(generation)
    }

    /// Последний успешный результат
    pub fn last(&self) -> Option<Generation> {
        match self.last.lock() {
            Ok(last) => last.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Только читает флаг, параллельный `generate` не получит `Busy`
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<InFlight<'_>, QrArtError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| QrArtError::Busy)?;
        Ok(InFlight(&self.in_flight))
    }
}
