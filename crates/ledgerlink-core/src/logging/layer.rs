//! Tracing layer that writes JSON lines, and a builder for the global subscriber.

use std::fmt::Write as FmtWrite;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use super::entry::JsonLogEntry;
use crate::error::{LinkError, LinkResult};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// A tracing Layer that writes each event as one [`JsonLogEntry`] line.
pub struct JsonlLayer {
    service: String,
    writer: SharedWriter,
}

impl JsonlLayer {
    /// Layer writing to any writer.
    pub fn new(writer: impl Write + Send + 'static, service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Layer appending to a file, created if missing.
    pub fn to_file(path: impl AsRef<Path>, service: impl Into<String>) -> std::io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file, service))
    }

    /// Service name written into every entry.
    pub fn service(&self) -> &str {
        &self.service
    }

    fn write_entry(&self, entry: &JsonLogEntry) -> std::io::Result<()> {
        let line = entry.to_json_line()?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        writer.flush()
    }
}

impl<S> Layer<S> for JsonlLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = metadata.level().as_str().to_lowercase();

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut entry = JsonLogEntry::new(
            level,
            self.service.as_str(),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        );

        if !visitor.fields.is_empty() {
            entry = entry.with_fields(Value::Object(visitor.fields));
        }

        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                entry = entry.with_span(spans.join(" > "));
            }
        }

        // A failing log sink must never take the caller down
        let _ = self.write_entry(&entry);
    }
}

/// Splits an event into its message and the key-value fields library code
/// attaches (`run_id`, `step`, `channel`, `sequence` and so on).
///
/// `%`-formatted values such as a run id or channel id arrive through
/// `record_debug` and are stored as plain strings. Numbers and booleans keep
/// their JSON type so `jq` filters like `.fields.attempts > 3` work.
#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        match (field.name(), value) {
            ("message", Value::String(text)) => self.message = Some(text),
            (name, value) => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut text = String::new();
        let _ = write!(&mut text, "{:?}", value);
        self.insert(field, Value::String(text));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }

    // NaN and infinities have no JSON number form
    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.insert(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

/// Builder for the process-wide tracing subscriber.
///
/// ```ignore
/// use ledgerlink_core::logging::LoggingBuilder;
///
/// LoggingBuilder::new("ledgerlink")
///     .with_filter("ledgerlink_core=debug")
///     .with_jsonl_file("logs/ledgerlink.jsonl")
///     .init()?;
/// ```
pub struct LoggingBuilder {
    service: String,
    console_output: bool,
    env_filter: Option<String>,
    jsonl_path: Option<std::path::PathBuf>,
}

impl LoggingBuilder {
    /// Create a new logging builder.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            console_output: true,
            env_filter: None,
            jsonl_path: None,
        }
    }

    /// Disable console output.
    pub fn no_console(mut self) -> Self {
        self.console_output = false;
        self
    }

    /// Set the filter directive (e.g., "ledgerlink_core=debug"); defaults to `RUST_LOG`, then "info".
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Also append JSON lines to a file.
    pub fn with_jsonl_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.jsonl_path = Some(path.into());
        self
    }

    /// Build the JSONL layer alone, for manual composition.
    pub fn build_layer(&self) -> std::io::Result<Option<JsonlLayer>> {
        self.jsonl_path
            .as_ref()
            .map(|path| JsonlLayer::to_file(path, self.service.as_str()))
            .transpose()
    }

    fn filter(&self) -> LinkResult<EnvFilter> {
        match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|e| LinkError::InvalidInput(format!("Invalid log filter: {}", e))),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
        }
    }

    /// Install the subscriber globally.
    ///
    /// Fails if the filter is invalid, the log file cannot be opened, or a
    /// global subscriber is already set.
    pub fn init(self) -> LinkResult<()> {
        let filter = self.filter()?;
        let jsonl = self.build_layer()?;
        let console = self.console_output.then(tracing_subscriber::fmt::layer);

        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .with(jsonl)
            .try_init()
            .map_err(|e| LinkError::InvalidInput(format!("Logging already initialised: {}", e)))
    }
}
