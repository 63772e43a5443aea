use anyhow::Context;
use bytes::{Bytes, BytesMut};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_MIME_TYPE: &str = r#"video/webm; codecs="vp8,opus""#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("recorder is already recording")]
    AlreadyRecording,
    #[error("recorder is not recording")]
    NotRecording,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub mime_type: String,
    pub audio_bits_per_second: u32,
    pub video_bits_per_second: u32,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_owned(),
            audio_bits_per_second: 128_000,
            video_bits_per_second: 2_500_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// Collects encoded media chunks of one captured stream.
#[derive(Debug)]
pub struct Recorder {
    options: RecorderOptions,
    state: RecorderState,
    chunks: Vec<Bytes>,
}

impl Recorder {
    pub fn new(options: RecorderOptions) -> Self {
        Self {
            options,
            state: RecorderState::Inactive,
            chunks: Vec::new(),
        }
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.state == RecorderState::Recording {
            return Err(RecorderError::AlreadyRecording);
        }
        info!("Recording started ({})", self.options.mime_type);
        self.chunks.clear();
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Appends a chunk; chunks outside a recording are dropped.
    pub fn push_chunk(&mut self, chunk: Bytes) {
        if self.state != RecorderState::Recording {
            debug!("Dropping {} byte chunk, not recording", chunk.len());
            return;
        }
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    pub fn stop(&mut self) -> Result<Recording, RecorderError> {
        if self.state != RecorderState::Recording {
            return Err(RecorderError::NotRecording);
        }
        self.state = RecorderState::Inactive;

        let chunks = std::mem::take(&mut self.chunks);
        let mut data = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            data.extend_from_slice(&chunk);
        }

        info!("Recording stopped, {} bytes", data.len());
        Ok(Recording {
            mime_type: self.options.mime_type.clone(),
            data: data.freeze(),
        })
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderOptions::default())
    }
}

/// A finished recording as one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub mime_type: String,
    pub data: Bytes,
}

impl Recording {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Writes the blob to `<dir>/<unix-millis>.webm`.
    pub async fn export(&self, dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before unix epoch")?
            .as_millis();
        let path = dir.as_ref().join(format!("{}.webm", millis));

        tokio::fs::write(&path, &self.data)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!("Recording exported to {}", path.display());
        Ok(path)
    }
}
