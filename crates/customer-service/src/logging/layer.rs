//! `tracing` layer rendering every event as one JSON object per line

use super::redact::{mask_pii, REQUEST_BODY, RESPONSE_BODY};
use super::remote::{RemoteSink, SINK_TARGET};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets never forwarded to the remote sink, so its own traffic cannot
/// feed back into it.
const LOCAL_ONLY_TARGETS: [&str; 4] = [SINK_TARGET, "reqwest", "hyper", "h2"];

/// Fields recorded on a span, kept in the span's extensions
struct SpanFields(Map<String, Value>);

/// Collects `tracing` field values into a JSON map
struct JsonVisitor<'a>(&'a mut Map<String, Value>);

impl JsonVisitor<'_> {
    fn insert_text(&mut self, field: &Field, text: String) {
        // Bodies are logged as JSON text; restore the structure so they can be masked
        let value = if field.name() == REQUEST_BODY || field.name() == RESPONSE_BODY {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert_text(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert_text(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert_text(field, format!("{:?}", value));
    }
}

/// Renders events as JSON lines, masks PII, and fans them out to the
/// console writer and the optional remote sink.
///
/// Each line carries `event`, `logger`, `level`, `timestamp`, the fields of
/// every enclosing span (outermost first) and the event's own fields.
pub struct JsonLogLayer<W> {
    make_writer: W,
    remote: Option<RemoteSink>,
}

impl<W> JsonLogLayer<W>
where
    W: for<'a> MakeWriter<'a> + 'static,
{
    pub fn new(make_writer: W) -> Self {
        Self {
            make_writer,
            remote: None,
        }
    }

    /// Also export every event to a remote sink
    pub fn with_remote(mut self, remote: Option<RemoteSink>) -> Self {
        self.remote = remote;
        self
    }

    fn emit(&self, record: Map<String, Value>, target: &str) {
        if let Ok(mut line) = serde_json::to_vec(&record) {
            line.push(b'\n');
            // Console failures are not reportable anywhere useful
            let _ = self.make_writer.make_writer().write_all(&line);
        }

        if let Some(remote) = &self.remote {
            if !LOCAL_ONLY_TARGETS.iter().any(|t| target.starts_with(t)) {
                remote.send(record);
            }
        }
    }
}

impl<S, W> Layer<S> for JsonLogLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'a> MakeWriter<'a> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        // Declared but unrecorded fields render as null
        let mut fields: Map<String, Value> = attrs
            .metadata()
            .fields()
            .iter()
            .map(|field| (field.name().to_string(), Value::Null))
            .collect();
        attrs.record(&mut JsonVisitor(&mut fields));

        span.extensions_mut().insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut extensions = span.extensions_mut();
        if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
            values.record(&mut JsonVisitor(fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut fields = Map::new();
        event.record(&mut JsonVisitor(&mut fields));

        let mut record = Map::new();
        record.insert(
            "event".to_string(),
            fields.remove("message").unwrap_or(Value::Null),
        );
        record.insert("logger".to_string(), Value::from(metadata.target()));
        record.insert(
            "level".to_string(),
            Value::from(metadata.level().as_str().to_lowercase()),
        );
        record.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(SpanFields(span_fields)) = span.extensions().get::<SpanFields>() {
                    for (key, value) in span_fields {
                        record.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        // Event fields win over span fields of the same name
        record.extend(fields);

        mask_pii(&mut record);
        self.emit(record, metadata.target());
    }
}
