use std::fmt;

/// A renderable container image reference: `[registry/]repository[:tag][@digest]`.
///
/// Empty optional parts are treated the same as absent ones. Nothing is validated
/// or normalized, callers make sure `repository` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            registry: None,
            repository: repository.into(),
            tag: None,
            digest: None,
        }
    }

    pub fn with_registry(mut self, registry: Option<&str>) -> Self {
        self.registry = registry.map(str::to_owned);
        self
    }

    pub fn with_tag(mut self, tag: Option<&str>) -> Self {
        self.tag = tag.map(str::to_owned);
        self
    }

    pub fn with_digest(mut self, digest: Option<&str>) -> Self {
        self.digest = digest.map(str::to_owned);
        self
    }
}

fn non_empty(part: &Option<String>) -> Option<&str> {
    part.as_deref().filter(|s| !s.is_empty())
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = non_empty(&self.registry) {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(tag) = non_empty(&self.tag) {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = non_empty(&self.digest) {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_repository_only() {
        assert_eq!(ImageReference::new("app").to_string(), "app");
    }

    #[test]
    fn test_full_reference() {
        let reference = ImageReference::new("team/app")
            .with_registry(Some("reg.example.com:5000"))
            .with_tag(Some("v1"))
            .with_digest(Some("sha256:abc"));
        assert_eq!(
            reference.to_string(),
            "reg.example.com:5000/team/app:v1@sha256:abc"
        );
    }

    #[test]
    fn test_digest_without_tag() {
        let reference = ImageReference::new("app").with_digest(Some("sha256:abc"));
        assert_eq!(reference.to_string(), "app@sha256:abc");
    }

    #[test]
    fn test_empty_parts_are_omitted() {
        let reference = ImageReference::new("app")
            .with_registry(Some(""))
            .with_tag(Some(""))
            .with_digest(Some(""));
        assert_eq!(reference.to_string(), "app");
    }

    fn part() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[a-z0-9.]{0,12}")
    }

    proptest! {
        #[test]
        fn test_segments_present_iff_non_empty(
            registry in part(),
            repository in "[a-z][a-z0-9/_-]{0,20}",
            tag in part(),
            digest in part(),
        ) {
            let reference = ImageReference {
                registry: registry.clone(),
                repository: repository.clone(),
                tag: tag.clone(),
                digest: digest.clone(),
            };
            let rendered = reference.to_string();

            let registry = registry.filter(|s| !s.is_empty());
            let tag = tag.filter(|s| !s.is_empty());
            let digest = digest.filter(|s| !s.is_empty());

            match &registry {
                Some(r) => {
                    let prefix = format!("{}/{}", r, repository);
                    prop_assert!(rendered.starts_with(&prefix));
                }
                None => prop_assert!(rendered.starts_with(&repository)),
            }
            prop_assert_eq!(rendered.contains(':'), tag.is_some());
            if let Some(t) = &tag {
                let tag_segment = format!(":{}", t);
                prop_assert!(rendered.contains(&tag_segment));
            }
            prop_assert_eq!(rendered.contains('@'), digest.is_some());
            if let Some(d) = &digest {
                let digest_segment = format!("@{}", d);
                prop_assert!(rendered.ends_with(&digest_segment));
            }
            if registry.is_none() && tag.is_none() && digest.is_none() {
                prop_assert_eq!(&rendered, &repository);
            }
            prop_assert_eq!(rendered, reference.to_string());
        }
    }
}
