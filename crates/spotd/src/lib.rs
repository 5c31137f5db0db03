//! Wiring behind the `spotd` binary: configuration and request loading,
//! provider and model selection, one pipeline run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use serde_json::json;
use tracing::info;

use spotgrid_core::{EvaluationRequest, PipelineConfig, Signal};
use spotgrid_pipeline::{ExecutionSummary, Pipeline, actuator_from_config};
use spotgrid_providers::{CatalogDataset, MockProviders, ProviderFactory, SharedState};
use spotgrid_risk::model_from_config;

/// `--signal` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignalArg {
    None,
    Rebalance,
    Termination,
}

impl From<SignalArg> for Signal {
    fn from(arg: SignalArg) -> Self {
        match arg {
            SignalArg::None => Signal::None,
            SignalArg::Rebalance => Signal::Rebalance,
            SignalArg::Termination => Signal::Termination,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluateArgs {
    pub config: Option<PathBuf>,
    pub request: PathBuf,
    pub mock: Option<PathBuf>,
    pub signal: Option<SignalArg>,
}

pub struct EvaluateOutput {
    pub summary: ExecutionSummary,
    /// Summary plus candidates, recommendations and the stage trace.
    pub report: serde_json::Value,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

pub async fn load_request(path: &Path) -> anyhow::Result<EvaluationRequest> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading request {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing request {}", path.display()))
}

async fn mock_fixture(args: &EvaluateArgs) -> anyhow::Result<Option<MockProviders>> {
    let mut mock = match &args.mock {
        Some(path) => {
            let catalog = CatalogDataset::from_file(path)
                .await
                .with_context(|| format!("loading mock catalog {}", path.display()))?;
            Some(MockProviders::from_catalog(catalog))
        }
        None => None,
    };
    if let Some(signal) = args.signal {
        mock = Some(mock.unwrap_or_default().with_default_signal(signal.into()));
    }
    Ok(mock)
}

pub async fn evaluate(args: &EvaluateArgs) -> anyhow::Result<EvaluateOutput> {
    let config = load_config(args.config.as_deref())?.validate()?;
    let request = load_request(&args.request).await?;

    let mut factory = ProviderFactory::new(&config.providers, SharedState::new());
    if let Some(mock) = mock_fixture(args).await? {
        factory = factory.with_mock(mock);
    }
    let providers = factory.build()?;
    let model = model_from_config(&config.risk);
    let actuator = actuator_from_config(config.actuator.kind, None)?;
    info!(
        model = model.name(),
        actuator = actuator.name(),
        "pipeline dependencies ready"
    );

    let pipeline = Pipeline::from_config(Arc::new(config), providers, model, actuator)?;
    let ctx = pipeline.evaluate(request).await?;
    let summary = Pipeline::get_execution_summary(&ctx);
    let report = json!({
        "summary": summary,
        "candidates": ctx.candidates,
        "recommendations": ctx
            .recommendations
            .iter()
            .map(|&i| ctx.candidates[i].pool_key())
            .collect::<Vec<_>>(),
        "trace": ctx.trace,
        "actuation": ctx.actuation,
    });
    Ok(EvaluateOutput { summary, report })
}

/// Validate the file and render it back with every default spelled out.
pub fn check_config(path: &Path) -> anyhow::Result<String> {
    let config = load_config(Some(path))?.validate()?;
    Ok(config.into_inner().to_toml_string()?)
}
