use crate::error::{Result, StreamError};
use crate::path_lookup::scalar_to_string;
use crate::runner::Toolchain;
use crate::task::{Delivery, HelmChart, HelmChartImageConfig, Image, Source, Task};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::{env, fs, path::Path};
use tracing::info;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "image-stream")]
    image_stream: Option<Config>,
}

/// The `image-stream` section: global defaults plus one entry per delivery task.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub global: GlobalConfig,
    pub engine: Option<String>,
    pub helm: Option<String>,
    #[serde(default)]
    pub images: Vec<TaskConfig>,
}

/// Defaults applied to task fields left unset. Read once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GlobalConfig {
    #[serde(default, deserialize_with = "scalar")]
    pub registry: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub repository: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub platform: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskConfig {
    #[serde(default, deserialize_with = "scalar")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub source: Option<String>,
    pub image: Option<ImageConfig>,
    pub helm: Option<HelmConfig>,
    pub delivery: Option<DeliveryConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageConfig {
    #[serde(default, deserialize_with = "scalar")]
    pub registry: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub repository: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub digest: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub platform: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HelmConfig {
    #[serde(default, deserialize_with = "scalar")]
    pub repository: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub chart: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub version: Option<String>,
    pub image: Option<HelmImagePaths>,
}

/// Path expressions into the chart's values document.
#[derive(Debug, Default, Deserialize)]
pub struct HelmImagePaths {
    #[serde(default, deserialize_with = "scalar")]
    pub registry: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub repository: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub digest: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub platform: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default, deserialize_with = "scalar")]
    pub registry: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub repository: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "scalar")]
    pub platform: Option<String>,
}

/// Accepts any YAML scalar as a string, so `tag: 1.0` and `tag: "1.0"` read the same.
fn scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml_ng::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

impl Config {
    pub fn toolchain(&self) -> Toolchain {
        let defaults = Toolchain::default();
        Toolchain {
            engine: self.engine.clone().unwrap_or(defaults.engine),
            helm: self.helm.clone().unwrap_or(defaults.helm),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    info!("Loading config from file {}", path.as_ref().display());
    let yaml_str = fs::read_to_string(&path).map_err(|source| StreamError::ReadConfig {
        path: path.as_ref().to_path_buf(),
        source,
    })?;

    parse_config(&yaml_str)
}

pub fn parse_config(yaml_str: &str) -> Result<Config> {
    let expanded = expand_env_vars(yaml_str)?;
    let file: ConfigFile = serde_yaml_ng::from_str(&expanded)?;
    file.image_stream.ok_or_else(|| {
        StreamError::Config("key 'image-stream' is required".to_string())
    })
}

/// Replaces `${VAR}` placeholders with environment variables values.
/// Returns an error naming the first variable that is not set.
fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)}")
        .map_err(|e| StreamError::Config(format!("invalid env var pattern: {}", e)))?;

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });

    match missing {
        Some(var_name) => Err(StreamError::MissingEnvVar(var_name)),
        None => Ok(result.into_owned()),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

fn or_default(value: &Option<String>, default: &Option<String>) -> Option<String> {
    non_empty(value).or_else(|| non_empty(default))
}

fn required(value: Option<String>, task: &str, key: &str) -> Result<String> {
    value.ok_or_else(|| StreamError::Config(format!("{}: key '{}' is required", task, key)))
}

/// Builds every task in configured order. `global` fills fields a task leaves unset.
pub fn build_tasks(task_configs: &[TaskConfig], global: &GlobalConfig) -> Result<Vec<Task>> {
    task_configs
        .iter()
        .map(|task_config| build_task(task_config, global))
        .collect()
}

fn build_task(task_config: &TaskConfig, global: &GlobalConfig) -> Result<Task> {
    let name = required(non_empty(&task_config.name), "task", "name")?;

    let source = match task_config.source.as_deref() {
        Some("image") => Source::Image(build_image(task_config, &name, global)?),
        Some("helm") => Source::HelmChart(build_helm_chart(task_config, &name, global)?),
        other => {
            return Err(StreamError::InvalidSource {
                task: name,
                source_type: other.unwrap_or_default().to_string(),
            });
        }
    };

    let delivery = task_config
        .delivery
        .as_ref()
        .ok_or_else(|| StreamError::Config(format!("{}: key 'delivery' is required", name)))?;
    let delivery = Delivery {
        registry: or_default(&delivery.registry, &global.registry),
        repository: required(
            or_default(&delivery.repository, &global.repository),
            &name,
            "delivery.repository",
        )?,
        tag: non_empty(&delivery.tag),
        platform: or_default(&delivery.platform, &global.platform),
    };

    Ok(Task::new(name, source, delivery))
}

fn build_image(task_config: &TaskConfig, name: &str, global: &GlobalConfig) -> Result<Image> {
    let image = task_config
        .image
        .as_ref()
        .ok_or_else(|| StreamError::Config(format!("{}: key 'image' is required", name)))?;

    Ok(Image {
        registry: or_default(&image.registry, &global.registry),
        repository: required(
            or_default(&image.repository, &global.repository),
            name,
            "image.repository",
        )?,
        tag: non_empty(&image.tag),
        digest: non_empty(&image.digest),
        platform: or_default(&image.platform, &global.platform),
    })
}

fn build_helm_chart(
    task_config: &TaskConfig,
    name: &str,
    global: &GlobalConfig,
) -> Result<HelmChart> {
    let helm = task_config
        .helm
        .as_ref()
        .ok_or_else(|| StreamError::Config(format!("{}: key 'helm' is required", name)))?;
    let paths = helm
        .image
        .as_ref()
        .ok_or_else(|| StreamError::Config(format!("{}: key 'helm.image' is required", name)))?;

    Ok(HelmChart {
        repository: required(non_empty(&helm.repository), name, "helm.repository")?,
        chart: required(non_empty(&helm.chart), name, "helm.chart")?,
        version: non_empty(&helm.version),
        image_config: HelmChartImageConfig {
            registry_path: non_empty(&paths.registry),
            repository_path: required(non_empty(&paths.repository), name, "helm.image.repository")?,
            tag_path: required(non_empty(&paths.tag), name, "helm.image.tag")?,
            digest_path: non_empty(&paths.digest),
            platform_path: non_empty(&paths.platform),
        },
        default_platform: non_empty(&global.platform),
    })
}
