//! Logging set-up and the span interface used around invocations.
//!
//! Spans are only recorded in managed deployments. Everywhere else the
//! invoker talks to [`NoopTelemetry`], so the same code path runs in both
//! cases and telemetry never changes what an invocation returns.

#[cfg(feature = "otel")]
mod otel;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::field::{Empty, display};
use tracing::{Event, Span, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::Config;

/// The value of a span attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    /// A string attribute.
    String(String),
    /// An integer attribute.
    Int(i64),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        AttributeValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

/// A span that is open until it is dropped.
pub trait TelemetrySpan: Send + Sync {
    /// Attaches an attribute to the span.
    fn set_attribute(&self, key: &'static str, value: AttributeValue);

    /// Records an error on the span and marks the span as failed.
    fn record_exception(&self, err: &(dyn StdError + 'static));

    /// Starts a span nested under this one.
    fn child(&self, name: &'static str) -> Box<dyn TelemetrySpan>;

    /// The `tracing` span that work done under this span should be
    /// instrumented with.
    fn tracing_span(&self) -> Span {
        Span::none()
    }
}

/// A source of root spans.
pub trait Telemetry: Send + Sync {
    /// Starts a root span.
    fn start_span(&self, name: &'static str) -> Box<dyn TelemetrySpan>;
}

/// Telemetry that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTelemetry;

struct NoopSpan;

impl Telemetry for NoopTelemetry {
    fn start_span(&self, _name: &'static str) -> Box<dyn TelemetrySpan> {
        Box::new(NoopSpan)
    }
}

impl TelemetrySpan for NoopSpan {
    fn set_attribute(&self, _key: &'static str, _value: AttributeValue) {}

    fn record_exception(&self, _err: &(dyn StdError + 'static)) {}

    fn child(&self, _name: &'static str) -> Box<dyn TelemetrySpan> {
        Box::new(NoopSpan)
    }
}

/// Telemetry backed by `tracing` spans.
///
/// Each span pre-declares every `agent.*` attribute, because `tracing` only
/// records fields that are known when the span is created. `otel.name`
/// carries the span name to the OpenTelemetry layer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTelemetry;

struct TracingSpan {
    span: Span,
}

macro_rules! agent_span {
    ($name:expr $(, parent: $parent:expr)?) => {
        info_span!(
            $(parent: $parent,)?
            "agent",
            otel.name = $name,
            otel.status_code = Empty,
            agent.prompt_length = Empty,
            agent.prompt = Empty,
            agent.status = Empty,
            agent.response_length = Empty,
            agent.error_type = Empty,
            agent.error_message = Empty,
            agent.tools_count = Empty,
            agent.tools = Empty,
            agent.input = Empty,
            agent.output_length = Empty,
            exception.message = Empty,
        )
    };
}

impl Telemetry for TracingTelemetry {
    fn start_span(&self, name: &'static str) -> Box<dyn TelemetrySpan> {
        Box::new(TracingSpan {
            span: agent_span!(name),
        })
    }
}

impl TelemetrySpan for TracingSpan {
    fn set_attribute(&self, key: &'static str, value: AttributeValue) {
        match value {
            AttributeValue::String(s) => self.span.record(key, s.as_str()),
            AttributeValue::Int(n) => self.span.record(key, n),
        };
    }

    fn record_exception(&self, err: &(dyn StdError + 'static)) {
        self.span.record("otel.status_code", "ERROR");
        self.span.record("exception.message", display(err));
        error!(parent: &self.span, exception.message = %err, "exception");
    }

    fn child(&self, name: &'static str) -> Box<dyn TelemetrySpan> {
        Box::new(TracingSpan {
            span: agent_span!(name, parent: &self.span),
        })
    }

    fn tracing_span(&self) -> Span {
        self.span.clone()
    }
}

/// Picks the telemetry for the deployment described by `config`.
pub fn telemetry_for(config: &Config) -> Arc<dyn Telemetry> {
    if config.managed_deployment {
        Arc::new(TracingTelemetry)
    } else {
        Arc::new(NoopTelemetry)
    }
}

/// Failure to set up logging or trace export.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The OTLP exporter could not be created.
    #[error("failed to create the OTLP exporter: {0}")]
    Exporter(String),
    /// A global subscriber is already installed.
    #[error(transparent)]
    Init(#[from] TryInitError),
}

/// Keeps trace export alive. Pending spans are flushed when this is
/// dropped.
#[derive(Default)]
#[must_use]
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some(provider) = self.provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("failed to flush traces: {err}");
            }
        }
    }
}

/// Installs the global subscriber.
///
/// The level comes from `RUST_LOG` when set, and from
/// [`Config::log_level`] otherwise. With the `otel` feature, spans are
/// exported over OTLP in managed deployments.
pub fn init(config: &Config) -> Result<TelemetryGuard, TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_directive()));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(PipeFormat),
        );

    #[cfg(feature = "otel")]
    if config.managed_deployment {
        let provider = otel::tracer_provider(config)?;
        registry.with(otel::layer(&provider)).try_init()?;
        info!(
            "exporting traces to {} as `{}`",
            config.otlp_endpoint, config.service_name
        );
        return Ok(TelemetryGuard {
            provider: Some(provider),
        });
    }

    registry.try_init()?;
    Ok(TelemetryGuard::default())
}

/// Formats events as `LEVEL | target | message`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipeFormat;

impl<S, N> FormatEvent<S, N> for PipeFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        write!(writer, "{} | {} | ", meta.level(), meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_pipe_format() {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(PipeFormat)
            .with_writer(buffer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            info!("Received prompt: {}", "Hello!");
        });

        let output =
            String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            output,
            "INFO | tally_agent::telemetry::tests | Received prompt: Hello!\n"
        );
    }

    #[test]
    fn test_tracing_spans_accept_attributes() {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(PipeFormat)
            .with_writer(buffer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let root = TracingTelemetry.start_span("agent_invoke");
            root.set_attribute("agent.prompt_length", 6usize.into());
            root.set_attribute("agent.prompt", "Hello!".into());
            let child = root.child("agent_execution");
            assert!(!child.tracing_span().is_disabled());
            child.record_exception(&io::Error::other("boom"));
        });

        let output =
            String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.starts_with("ERROR | "), "{output}");
        assert!(output.contains("exception"));
    }

    #[test]
    fn test_noop_spans() {
        let root = NoopTelemetry.start_span("agent_invoke");
        root.set_attribute("agent.status", "success".into());
        let child = root.child("agent_creation");
        child.record_exception(&io::Error::other("ignored"));
        assert!(child.tracing_span().is_none());
    }
}
