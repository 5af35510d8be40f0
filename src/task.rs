use crate::error::{Result, StreamError};
use crate::helm;
use crate::image_reference::ImageReference;
use crate::runner::{CommandRunner, Toolchain};
use crate::state::TaskState;
use tracing::{debug, info};

/// A concrete, addressable container image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Image {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
    pub platform: Option<String>,
}

impl Image {
    pub fn reference(&self) -> ImageReference {
        ImageReference::new(&self.repository)
            .with_registry(self.registry.as_deref())
            .with_tag(self.tag.as_deref())
            .with_digest(self.digest.as_deref())
    }
}

/// Where to find each image field inside a chart's values document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HelmChartImageConfig {
    pub registry_path: Option<String>,
    pub repository_path: String,
    pub tag_path: String,
    pub digest_path: Option<String>,
    pub platform_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmChart {
    pub repository: String,
    pub chart: String,
    pub version: Option<String>,
    pub image_config: HelmChartImageConfig,
    /// Used when the values document does not name a platform.
    pub default_platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Image(Image),
    HelmChart(HelmChart),
}

/// Destination coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Delivery {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub platform: Option<String>,
}

impl Delivery {
    /// Destination reference for `source`. Without an explicit tag the source tag is kept.
    pub fn reference(&self, source: &Image) -> ImageReference {
        let tag = self
            .tag
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(source.tag.as_deref());
        ImageReference::new(&self.repository)
            .with_registry(self.registry.as_deref())
            .with_tag(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub source: Source,
    pub delivery: Delivery,
    pub state: TaskState,
}

impl Task {
    pub fn new(name: impl Into<String>, source: Source, delivery: Delivery) -> Self {
        Self {
            name: name.into(),
            source,
            delivery,
            state: TaskState::Pending,
        }
    }

    /// Turns the source into a concrete image, fetching and inspecting the chart if needed.
    /// The resolved image replaces the chart source.
    pub async fn resolve<R: CommandRunner>(
        &mut self,
        runner: &R,
        tools: &Toolchain,
    ) -> Result<Image> {
        let image = match &self.source {
            Source::Image(image) => image.clone(),
            Source::HelmChart(chart) => {
                info!(
                    "Resolving image from chart {} in {}",
                    chart.chart, chart.repository
                );
                let image = helm::resolve_image(chart, runner, &tools.helm).await?;
                info!("Resolved chart image {}", image.reference());
                image
            }
        };
        self.source = Source::Image(image.clone());
        self.state = TaskState::SourceResolved;
        Ok(image)
    }

    /// Resolve, pull, tag and push. Stops at the first failure and leaves the task `Failed`;
    /// steps that already ran are not undone.
    pub async fn deliver<R: CommandRunner>(&mut self, runner: &R, tools: &Toolchain) -> Result<()> {
        if self.state == TaskState::Delivered {
            debug!("Task {} already delivered", self.name);
            return Ok(());
        }
        let result = self.run_steps(runner, tools).await;
        if result.is_err() {
            self.state = TaskState::Failed;
        }
        result
    }

    async fn run_steps<R: CommandRunner>(&mut self, runner: &R, tools: &Toolchain) -> Result<()> {
        let image = self.resolve(runner, tools).await?;
        let source_ref = image.reference().to_string();
        let destination_ref = self.delivery.reference(&image).to_string();

        pull_image(runner, &tools.engine, &source_ref, image.platform.as_deref()).await?;
        self.state = TaskState::Pulled;

        tag_image(runner, &tools.engine, &source_ref, &destination_ref).await?;
        self.state = TaskState::Tagged;

        push_image(
            runner,
            &tools.engine,
            &source_ref,
            &destination_ref,
            self.delivery.platform.as_deref(),
        )
        .await?;
        self.state = TaskState::Delivered;
        Ok(())
    }
}

fn with_platform(mut args: Vec<String>, platform: Option<&str>) -> Vec<String> {
    if let Some(platform) = platform.filter(|p| !p.is_empty()) {
        args.push("--platform".to_string());
        args.push(platform.to_string());
    }
    args
}

async fn run_engine<R: CommandRunner>(
    runner: &R,
    engine: &str,
    operation: &'static str,
    reference: &str,
    args: Vec<String>,
) -> Result<()> {
    let exit_code = runner.run(engine, &args).await?;
    if exit_code != 0 {
        return Err(StreamError::ExternalCommand {
            operation,
            reference: reference.to_string(),
            exit_code,
        });
    }
    Ok(())
}

async fn pull_image<R: CommandRunner>(
    runner: &R,
    engine: &str,
    source: &str,
    platform: Option<&str>,
) -> Result<()> {
    info!("Pulling image {}", source);
    let args = with_platform(vec!["pull".to_string(), source.to_string()], platform);
    run_engine(runner, engine, "pull", source, args).await
}

async fn tag_image<R: CommandRunner>(
    runner: &R,
    engine: &str,
    source: &str,
    destination: &str,
) -> Result<()> {
    info!("Tagging image {} as {}", source, destination);
    let args = vec![
        "tag".to_string(),
        source.to_string(),
        destination.to_string(),
    ];
    run_engine(runner, engine, "tag", source, args).await
}

async fn push_image<R: CommandRunner>(
    runner: &R,
    engine: &str,
    source: &str,
    destination: &str,
    platform: Option<&str>,
) -> Result<()> {
    info!("Pushing image {} --> {}", source, destination);
    let args = with_platform(vec!["push".to_string(), destination.to_string()], platform);
    run_engine(runner, engine, "push", destination, args).await
}

/// Delivers tasks one after another in configured order, aborting on the first failure.
pub async fn deliver_all<R: CommandRunner>(
    tasks: &mut [Task],
    runner: &R,
    tools: &Toolchain,
) -> Result<()> {
    info!("Delivering {} tasks", tasks.len());
    for task in tasks.iter_mut() {
        info!("Delivering task: {}", task.name);
        task.deliver(runner, tools).await?;
        info!("Task {} {}", task.name, task.state);
    }
    Ok(())
}
