use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tether_exec::executor::{
    EventSink, MetricsCollector, NoOpEventSink, StdoutEventSink, TracingEventSink,
};
use tether_exec::transport::{ShellTransport, ShellTransportConfig};
use tether_exec::Executor;

use super::config::{build_executor_config, build_providers, load_plan};
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{ConcurrencyArgs, ConfigArgs, OutputArgs};

pub async fn run_cmd(
    path: &Path,
    events: &str,
    output: OutputArgs,
    config: ConfigArgs,
    concurrency: ConcurrencyArgs,
) -> i32 {
    let exec_config = match build_executor_config(&concurrency) {
        Ok(c) => c,
        Err(e) => {
            print_error(output.format, output.quiet, &e);
            return exit_codes::RUNTIME_ERROR;
        }
    };

    let base_sink: Arc<dyn EventSink> = match events {
        "none" => Arc::new(NoOpEventSink),
        "stdout" => Arc::new(StdoutEventSink),
        "tracing" => Arc::new(TracingEventSink),
        _ => {
            print_error(
                output.format,
                output.quiet,
                &format!("unknown event sink: {events}"),
            );
            return exit_codes::RUNTIME_ERROR;
        }
    };

    let (doc, plan) = match load_plan(path, &config, &output) {
        Ok(v) => v,
        Err(code) => return code,
    };

    let command_timeout = Duration::from_secs(concurrency.command_timeout);
    let providers = build_providers(&doc, command_timeout);
    tracing::debug!(
        providers = ?providers.prefixes().collect::<Vec<_>>(),
        "resource providers registered"
    );
    let transport = ShellTransport::new(ShellTransportConfig {
        command_timeout,
        ..ShellTransportConfig::default()
    });
    let metrics = Arc::new(MetricsCollector::new(base_sink));

    let executor = Executor::new(
        exec_config,
        Arc::new(providers),
        Arc::new(transport),
        metrics.clone(),
    );
    let report = executor.run(&plan).await;

    let summary = metrics.get_metrics().await;
    tracing::debug!(metrics = %summary.to_json(), "run metrics");

    if !output.quiet {
        match output.format {
            OutputFormat::Json => print_result(output.format, false, &report),
            OutputFormat::Text | OutputFormat::Dot => print!("{}", report.render_text()),
        }
    }

    if report.is_success() {
        exit_codes::SUCCESS
    } else {
        exit_codes::RUN_FAILED
    }
}
