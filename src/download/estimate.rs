//! Batch size estimation from a sample of HEAD probes.

use tracing::{debug, instrument};

use super::client::HttpClient;

/// Extrapolated size of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeEstimate {
    /// Links probed.
    pub sampled: usize,
    /// Probes that reported a length.
    pub known: usize,
    /// Mean length of the known probes.
    pub average_bytes: u64,
    /// `average_bytes` times the number of links in the batch.
    pub estimated_total_bytes: u64,
}

/// Sample size used by the interactive download flow.
///
/// Up to 50 links: 5 (or fewer). Above that: a tenth, capped at 10.
#[must_use]
pub fn default_sample_size(batch_len: usize) -> usize {
    if batch_len <= 50 {
        batch_len.min(5)
    } else {
        (batch_len / 10).min(10)
    }
}

impl HttpClient {
    /// HEADs the first `sample` links and extrapolates to all of `links`.
    ///
    /// Links whose length is unknown are left out of the average. Returns
    /// `None` when no probe reported a length.
    #[instrument(level = "debug", skip(self, links), fields(links = links.len()))]
    pub async fn estimate_total_size(
        &self,
        links: &[String],
        sample: usize,
    ) -> Option<SizeEstimate> {
        let sample = sample.min(links.len());
        let mut sizes = Vec::with_capacity(sample);
        for link in &links[..sample] {
            if let Some(len) = self.head_content_length(link).await {
                debug!(url = %link, len, "sampled size");
                sizes.push(len);
            }
        }
        if sizes.is_empty() {
            return None;
        }

        let known = sizes.len();
        let average_bytes = sizes.iter().sum::<u64>() / known as u64;
        Some(SizeEstimate {
            sampled: sample,
            known,
            average_bytes,
            estimated_total_bytes: average_bytes.saturating_mul(links.len() as u64),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_sample_size() {
        assert_eq!(default_sample_size(0), 0);
        assert_eq!(default_sample_size(3), 3);
        assert_eq!(default_sample_size(50), 5);
        assert_eq!(default_sample_size(80), 8);
        assert_eq!(default_sample_size(500), 10);
    }

    #[tokio::test]
    async fn test_estimate_extrapolates_from_known_sizes() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/a.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 100]))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/b.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 300]))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/c.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let links: Vec<String> = ["a.zip", "b.zip", "c.zip", "d.zip"]
            .iter()
            .map(|p| format!("{}/{p}", server.uri()))
            .collect();
        let client = HttpClient::new().unwrap();
        let estimate = client.estimate_total_size(&links, 3).await.unwrap();

        assert_eq!(estimate.sampled, 3);
        assert_eq!(estimate.known, 2);
        assert_eq!(estimate.average_bytes, 200);
        assert_eq!(estimate.estimated_total_bytes, 800);
    }

    #[tokio::test]
    async fn test_estimate_none_when_nothing_known() {
        let client = HttpClient::new().unwrap();
        assert!(client.estimate_total_size(&[], 5).await.is_none());
    }
}
