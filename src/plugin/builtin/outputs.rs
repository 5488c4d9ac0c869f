use crate::error::PluginError;
use crate::pipeline::{PackState, PipelineEvent};
use crate::plugin::registry::{parse_settings, PluginSettings};
use crate::plugin::{Output, OutputWrapper, PluginGlobal, PluginWrapper};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Emits each message as a tracing event
#[derive(Debug, Clone)]
pub struct LogOutput {
    name: String,
    payload_only: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogOutputSettings {
    #[serde(default)]
    payload_only: bool,
}

impl LogOutput {
    pub fn new(name: impl Into<String>, payload_only: bool) -> Self {
        Self {
            name: name.into(),
            payload_only,
        }
    }
}

#[async_trait]
impl Output for LogOutput {
    async fn deliver(&mut self, pack: &PackState) {
        let message = &pack.message;
        if self.payload_only {
            info!(output = %self.name, "{}", message.payload);
            return;
        }

        match serde_json::to_string(message) {
            Ok(json) => info!(output = %self.name, msg_type = %message.msg_type, "{}", json),
            Err(e) => error!(output = %self.name, "Failed to serialize message: {}", e),
        }
    }
}

/// Append-only JSON-lines file shared by every [`FileOutput`] instance
#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PluginError> {
        let path = path.as_ref().to_path_buf();
        let writer = Mutex::new(BufWriter::new(Self::open_append(&path)?));
        Ok(Self { path, writer })
    }

    fn open_append(path: &Path) -> Result<File, PluginError> {
        Ok(OpenOptions::new().create(true).append(true).open(path)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &[u8]) -> Result<(), PluginError> {
        let mut writer = self.lock()?;
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), PluginError> {
        Ok(self.lock()?.flush()?)
    }

    /// Flush and reopen, picking up a file moved away by log rotation
    fn reopen(&self) -> Result<(), PluginError> {
        let mut writer = self.lock()?;
        writer.flush()?;
        *writer = BufWriter::new(Self::open_append(&self.path)?);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BufWriter<File>>, PluginError> {
        self.writer.lock().map_err(|_| PluginError::Failed {
            name: self.path.display().to_string(),
            reason: "file writer lock poisoned".to_string(),
        })
    }

    fn event_error(&self, event: PipelineEvent, e: PluginError) -> PluginError {
        PluginError::Event {
            name: self.path.display().to_string(),
            event: event.to_string(),
            reason: e.to_string(),
        }
    }
}

impl PluginGlobal for FileWriter {
    fn event(&self, event: PipelineEvent) -> Result<(), PluginError> {
        let result = match event {
            PipelineEvent::Reload => self.reopen(),
            PipelineEvent::Stop => self.flush(),
        };
        result.map_err(|e| self.event_error(event, e))
    }
}

pub struct FileOutput {
    writer: Arc<FileWriter>,
    buffer: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct FileOutputSettings {
    path: PathBuf,
}

impl FileOutput {
    pub fn new(writer: Arc<FileWriter>) -> Self {
        Self {
            writer,
            buffer: Vec::new(),
        }
    }
}

#[async_trait]
impl Output for FileOutput {
    async fn deliver(&mut self, pack: &PackState) {
        self.buffer.clear();
        if let Err(e) = serde_json::to_writer(&mut self.buffer, &pack.message) {
            error!(path = %self.writer.path().display(), "Failed to serialize message: {}", e);
            return;
        }
        if let Err(e) = self.writer.write_line(&self.buffer) {
            error!(path = %self.writer.path().display(), "Failed to write message: {}", e);
        }
    }
}

pub(super) fn log_output(
    name: &str,
    settings: &PluginSettings,
) -> Result<OutputWrapper, PluginError> {
    let settings: LogOutputSettings = parse_settings(name, settings)?;
    let template = LogOutput::new(name, settings.payload_only);
    Ok(PluginWrapper::new(name, move || {
        Box::new(template.clone()) as Box<dyn Output>
    }))
}

pub(super) fn file_output(
    name: &str,
    settings: &PluginSettings,
) -> Result<OutputWrapper, PluginError> {
    let settings: FileOutputSettings = parse_settings(name, settings)?;
    let writer = Arc::new(FileWriter::open(&settings.path)?);
    Ok(PluginWrapper::with_global(name, writer, |writer| {
        Box::new(FileOutput::new(writer)) as Box<dyn Output>
    }))
}
