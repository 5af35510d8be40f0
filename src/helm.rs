use crate::error::{Result, StreamError};
use crate::path_lookup::lookup;
use crate::runner::CommandRunner;
use crate::task::{HelmChart, HelmChartImageConfig, Image};
use serde_yaml_ng::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Fetches `chart` into a temporary directory and reads the image coordinates out of its
/// `values.yaml`. The directory is removed once the image has been resolved.
pub async fn resolve_image<R: CommandRunner>(
    chart: &HelmChart,
    runner: &R,
    helm: &str,
) -> Result<Image> {
    let chart_dir = tempfile::Builder::new()
        .prefix("image-stream-chart-")
        .tempdir()
        .map_err(StreamError::TempDir)?;

    fetch_chart(chart, runner, helm, chart_dir.path()).await?;

    let values_path = chart_dir.path().join(&chart.chart).join("values.yaml");
    if !values_path.is_file() {
        return Err(StreamError::MissingValuesFile { path: values_path });
    }
    debug!("Reading chart values from {}", values_path.display());
    let content = read_values(&values_path)?;
    let values: Value =
        serde_yaml_ng::from_str(&content).map_err(|source| StreamError::ParseValues {
            path: values_path,
            source,
        })?;

    resolve_from_values(&values, &chart.image_config, chart.default_platform.clone())
}

fn read_values(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| StreamError::ReadValues {
        path: path.to_path_buf(),
        source,
    })
}

async fn fetch_chart<R: CommandRunner>(
    chart: &HelmChart,
    runner: &R,
    helm: &str,
    destination: &Path,
) -> Result<()> {
    info!(
        "Pulling chart {} from {} into {}",
        chart.chart,
        chart.repository,
        destination.display()
    );
    let mut args = vec![
        "pull".to_string(),
        chart.chart.clone(),
        "--repo".to_string(),
        chart.repository.clone(),
        "--untar".to_string(),
        "--untardir".to_string(),
        destination.display().to_string(),
    ];
    if let Some(version) = chart.version.as_deref().filter(|v| !v.is_empty()) {
        args.push("--version".to_string());
        args.push(version.to_string());
    }

    let exit_code = runner.run(helm, &args).await?;
    if exit_code != 0 {
        return Err(StreamError::ChartFetch {
            chart: chart.chart.clone(),
            exit_code,
        });
    }
    Ok(())
}

fn field(values: &Value, path: Option<&str>, default: Option<String>) -> Option<String> {
    let value = match path.filter(|p| !p.is_empty()) {
        Some(path) => lookup(values, path, default),
        None => default,
    };
    value.filter(|v| !v.is_empty())
}

/// Builds an image from a parsed values document. `repository` and `tag` are required,
/// `platform` falls back to `default_platform`.
pub fn resolve_from_values(
    values: &Value,
    config: &HelmChartImageConfig,
    default_platform: Option<String>,
) -> Result<Image> {
    let registry = field(values, config.registry_path.as_deref(), None);
    let repository = field(values, Some(config.repository_path.as_str()), None)
        .ok_or(StreamError::MissingField { field: "repository" })?;
    let tag = field(values, Some(config.tag_path.as_str()), None)
        .ok_or(StreamError::MissingField { field: "tag" })?;
    let digest = field(values, config.digest_path.as_deref(), None);
    let platform = field(values, config.platform_path.as_deref(), default_platform);

    Ok(Image {
        registry,
        repository,
        tag: Some(tag),
        digest,
        platform,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;

    fn values(yaml: &str) -> Value {
        serde_yaml_ng::from_str(yaml).expect("valid yaml")
    }

    fn paths(repository: &str, tag: &str) -> HelmChartImageConfig {
        HelmChartImageConfig {
            repository_path: repository.to_string(),
            tag_path: tag.to_string(),
            ..Default::default()
        }
    }

    fn chart(version: Option<&str>) -> HelmChart {
        HelmChart {
            repository: "https://charts.example.com".to_string(),
            chart: "svc".to_string(),
            version: version.map(str::to_owned),
            image_config: paths("image.repository", "image.tag"),
            default_platform: None,
        }
    }

    #[test]
    fn test_resolve_from_values() {
        let tree = values("image:\n  repo: foo\n  tag: \"1.0\"\n");
        let image = resolve_from_values(&tree, &paths("image.repo", "image.tag"), None)
            .expect("should resolve");
        assert_eq!(
            image,
            Image {
                repository: "foo".to_string(),
                tag: Some("1.0".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_resolve_all_fields() {
        let tree = values(
            r#"
            global:
              registry: quay.io
            image:
              repository: org/svc
              tag: v3
              digest: sha256:abc
              platform: linux/arm64
            "#,
        );
        let config = HelmChartImageConfig {
            registry_path: Some("global.registry".to_string()),
            repository_path: "image.repository".to_string(),
            tag_path: "image.tag".to_string(),
            digest_path: Some("image.digest".to_string()),
            platform_path: Some("image.platform".to_string()),
        };
        let image = resolve_from_values(&tree, &config, Some("linux/amd64".to_string()))
            .expect("should resolve");
        assert_eq!(image.registry.as_deref(), Some("quay.io"));
        assert_eq!(image.digest.as_deref(), Some("sha256:abc"));
        assert_eq!(image.platform.as_deref(), Some("linux/arm64"));
        assert_eq!(
            image.reference().to_string(),
            "quay.io/org/svc:v3@sha256:abc"
        );
    }

    #[test]
    fn test_platform_defaults_when_path_unset_or_missing() {
        let tree = values("image:\n  repository: svc\n  tag: v1\n");
        let mut config = paths("image.repository", "image.tag");
        let image = resolve_from_values(&tree, &config, Some("linux/amd64".to_string()))
            .expect("should resolve");
        assert_eq!(image.platform.as_deref(), Some("linux/amd64"));

        config.platform_path = Some("image.platform".to_string());
        let image = resolve_from_values(&tree, &config, Some("linux/amd64".to_string()))
            .expect("should resolve");
        assert_eq!(image.platform.as_deref(), Some("linux/amd64"));
    }

    #[test]
    fn test_missing_repository() {
        let tree = values("image:\n  tag: v1\n");
        let err = resolve_from_values(&tree, &paths("image.repo", "image.tag"), None)
            .expect_err("repository is required");
        assert!(matches!(err, StreamError::MissingField { field: "repository" }));
    }

    #[test]
    fn test_empty_tag_is_missing() {
        let tree = values("image:\n  repository: svc\n  tag: \"\"\n");
        let err = resolve_from_values(&tree, &paths("image.repository", "image.tag"), None)
            .expect_err("tag is required");
        assert!(matches!(err, StreamError::MissingField { field: "tag" }));
    }

    #[tokio::test]
    async fn test_resolve_image_pulls_chart() {
        let runner =
            FakeRunner::new().with_chart_values("image:\n  repository: svc\n  tag: 2.3\n");
        let image = resolve_image(&chart(Some("1.0.0")), &runner, "helm")
            .await
            .expect("should resolve");

        assert_eq!(image.repository, "svc");
        assert_eq!(image.tag.as_deref(), Some("2.3"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with(
            "helm pull svc --repo https://charts.example.com --untar --untardir "
        ));
        assert!(calls[0].ends_with(" --version 1.0.0"));
    }

    #[tokio::test]
    async fn test_resolve_image_missing_values_file() {
        let runner = FakeRunner::new();
        let err = resolve_image(&chart(None), &runner, "helm")
            .await
            .expect_err("values.yaml is required");
        assert!(matches!(err, StreamError::MissingValuesFile { .. }));
        assert!(!runner.calls()[0].contains("--version"));
    }

    #[test]
    fn test_unreadable_values_keeps_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("values.yaml");
        fs::write(&path, [0xff, 0xfe, 0x00]).expect("write values.yaml");

        let err = read_values(&path).expect_err("invalid UTF-8 should fail");
        assert!(matches!(err, StreamError::ReadValues { .. }));
        assert!(err.to_string().starts_with("failed to read chart values file"));
        let source = std::error::Error::source(&err).expect("io error source");
        assert!(source.is::<std::io::Error>());
    }

    #[tokio::test]
    async fn test_resolve_image_fetch_failure() {
        let runner = FakeRunner::new().failing("helm pull", 1);
        let err = resolve_image(&chart(None), &runner, "helm")
            .await
            .expect_err("fetch should fail");
        assert_eq!(err.to_string(), "failed to fetch chart svc, exit code: 1");
    }
}
