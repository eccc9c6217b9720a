use std::fmt::Display;
use std::future::Future;
use tracing::warn;

/// Ordered node candidates: the primary node, then at most one fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCandidates {
    primary: String,
    fallback: Option<String>,
}

impl NodeCandidates {
    /// A fallback that is empty or equal to the primary is ignored
    pub fn new(primary: impl Into<String>, fallback: Option<String>) -> Self {
        let primary = primary.into().trim().to_string();
        let fallback = fallback
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty() && *url != primary);
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    /// Run `operation` against each candidate in order until one succeeds
    ///
    /// Returns the value together with the node that produced it. The error
    /// from the last candidate tried is returned when all fail.
    pub async fn try_each<T, E, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> Result<(T, String), E>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let primary_error = match operation(self.primary.clone()).await {
            Ok(value) => return Ok((value, self.primary.clone())),
            Err(error) => error,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_error);
        };

        warn!(
            operation = label,
            node = %self.primary,
            fallback = %fallback,
            error = %primary_error,
            "Node request failed, retrying against fallback node"
        );
        operation(fallback.clone())
            .await
            .map(|value| (value, fallback.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_fallback_equal_to_primary_ignored() {
        let nodes = NodeCandidates::new("http://a", Some(" http://a ".to_string()));
        assert_eq!(nodes.fallback(), None);

        let nodes = NodeCandidates::new("http://a", Some(String::new()));
        assert_eq!(nodes.fallback(), None);
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let nodes = NodeCandidates::new("http://a", Some("http://b".to_string()));
        let seen = Mutex::new(Vec::new());

        let (value, node) = nodes
            .try_each("test", |node| {
                seen.lock().unwrap().push(node.clone());
                async move { Ok::<_, String>(node.len()) }
            })
            .await
            .unwrap();

        assert_eq!(value, 8);
        assert_eq!(node, "http://a");
        assert_eq!(*seen.lock().unwrap(), vec!["http://a".to_string()]);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback_once() {
        let nodes = NodeCandidates::new("http://a", Some("http://b".to_string()));
        let seen = Mutex::new(Vec::new());

        let (_, node) = nodes
            .try_each("test", |node| {
                seen.lock().unwrap().push(node.clone());
                async move {
                    if node == "http://a" {
                        Err("primary down".to_string())
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(node, "http://b");
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_failure_propagates() {
        let nodes = NodeCandidates::new("http://a", Some("http://b".to_string()));

        let err = nodes
            .try_each("test", |node| async move { Err::<(), _>(format!("{node} down")) })
            .await
            .unwrap_err();

        assert_eq!(err, "http://b down");
    }

    #[tokio::test]
    async fn test_no_fallback_propagates_primary_error() {
        let nodes = NodeCandidates::new("http://a", None);
        let err = nodes
            .try_each("test", |_| async { Err::<(), _>("down") })
            .await
            .unwrap_err();
        assert_eq!(err, "down");
    }
}
