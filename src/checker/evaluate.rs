// src/checker/evaluate.rs
// =============================================================================
// This module checks a whole batch of URLs.
//
// How it works:
// 1. Drop duplicate candidates
// 2. Round 1: fetch + classify every candidate concurrently
// 3. Round 2: fetch + classify the redirect targets round 1 discovered,
//    exactly once, without looking for further redirects
// 4. Split the terminal results into broken and working, sorted by the
//    order the URLs appeared in the email
//
// Each task returns its own Classification and the results are merged after
// the round settles, so there is no shared list being pushed to from
// several tasks.
// =============================================================================

use crate::checker::candidate::{dedup_candidates, CandidateUrl};
use crate::checker::classify::{classify, Classification, LinkCheckResult, LinkStatus, PassOnCodes};
use crate::checker::fetch::Fetcher;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default cap on simultaneous outbound requests.
pub const DEFAULT_CONCURRENCY: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub broken_urls: Vec<LinkCheckResult>,
    pub working_urls: Vec<LinkCheckResult>,
}

impl EvaluationResult {
    fn from_outcomes(outcomes: Vec<LinkCheckResult>) -> Self {
        let (mut working_urls, mut broken_urls): (Vec<_>, Vec<_>) = outcomes
            .into_iter()
            .partition(|outcome| outcome.status == LinkStatus::Working);
        sort_by_order(&mut broken_urls);
        sort_by_order(&mut working_urls);

        Self {
            broken_urls,
            working_urls,
        }
    }

    // Drops results whose URL matches the predicate from both lists
    pub fn exclude<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.broken_urls.retain(|r| !predicate(&r.url));
        self.working_urls.retain(|r| !predicate(&r.url));
    }

    // Broken and working together, in email order
    pub fn all_sorted(&self) -> Vec<LinkCheckResult> {
        let mut all: Vec<_> = self
            .broken_urls
            .iter()
            .chain(self.working_urls.iter())
            .cloned()
            .collect();
        sort_by_order(&mut all);
        all
    }

    pub fn has_broken(&self) -> bool {
        !self.broken_urls.is_empty()
    }
}

fn sort_by_order(results: &mut [LinkCheckResult]) {
    results.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.url.cmp(&b.url))
            .then_with(|| a.url_type.cmp(&b.url_type))
    });
}

// Runs the two-round link check over a Fetcher
#[derive(Clone)]
pub struct Evaluator {
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
}

impl Evaluator {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Checks every candidate and returns the broken and working URLs.
    ///
    /// `pass_on_codes` is a comma-separated list of status codes to treat
    /// as working, e.g. `"403,429"`. This never fails as a whole: a URL that
    /// cannot be checked is reported as broken.
    pub async fn evaluate(
        &self,
        candidates: Vec<CandidateUrl>,
        pass_on_codes: Option<&str>,
    ) -> EvaluationResult {
        let codes = PassOnCodes::parse(pass_on_codes.unwrap_or_default());
        let candidates = dedup_candidates(candidates);
        info!(count = candidates.len(), "checking links");

        let mut outcomes = Vec::new();
        let mut redirects = Vec::new();
        for classification in self.run_round(candidates, &codes, true).await {
            outcomes.extend(classification.outcome);
            redirects.extend(classification.redirect);
        }

        let redirects = dedup_candidates(redirects);
        if !redirects.is_empty() {
            info!(count = redirects.len(), "following script redirects");
            let second = self.run_round(redirects, &codes, false).await;
            outcomes.extend(second.into_iter().filter_map(|c| c.outcome));
        }

        let result = EvaluationResult::from_outcomes(outcomes);
        info!(
            broken = result.broken_urls.len(),
            working = result.working_urls.len(),
            "link check finished"
        );
        result
    }

    // One fan-out over the candidates, at most `concurrency` in flight
    async fn run_round(
        &self,
        candidates: Vec<CandidateUrl>,
        codes: &PassOnCodes,
        extract_redirects: bool,
    ) -> Vec<Classification> {
        let futures = candidates.into_iter().map(|candidate| {
            let fetcher = Arc::clone(&self.fetcher);
            async move {
                let checked = AssertUnwindSafe(async {
                    let result = fetcher.fetch(&candidate.url).await;
                    if let Err(e) = &result {
                        debug!(url = %candidate.url, error = %e, "link check failed");
                    }
                    classify(&candidate, &result, codes, extract_redirects)
                })
                .catch_unwind()
                .await;

                match checked {
                    Ok(classification) => classification,
                    Err(_) => {
                        warn!(url = %candidate.url, "link check panicked; reporting as broken");
                        Classification {
                            outcome: Some(LinkCheckResult::no_response(&candidate)),
                            redirect: None,
                        }
                    }
                }
            }
        });

        stream::iter(futures)
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::candidate::UrlType;
    use crate::checker::classify::NO_RESPONSE;
    use crate::checker::testing::StaticFetcher;

    fn script(target: &str) -> String {
        format!(
            "var redirecturl = '{}';\nfunction redirect() {{ window.self.location = redirecturl; }}",
            target
        )
    }

    fn html(url: &str, order: usize) -> CandidateUrl {
        CandidateUrl::new(url, UrlType::Html, order)
    }

    fn evaluator(fetcher: StaticFetcher) -> (Evaluator, Arc<StaticFetcher>) {
        let fetcher = Arc::new(fetcher);
        (Evaluator::new(fetcher.clone()), fetcher)
    }

    #[tokio::test]
    async fn test_plain_200_yields_one_working() {
        let (evaluator, _) =
            evaluator(StaticFetcher::default().with_body("https://a.test/", 200, "ok"));
        let result = evaluator.evaluate(vec![html("https://a.test/", 1)], None).await;

        assert_eq!(result.working_urls.len(), 1);
        assert!(result.broken_urls.is_empty());
        assert_eq!(result.working_urls[0].status_code, "200");
    }

    #[tokio::test]
    async fn test_200_with_script_adds_second_round_outcome() {
        let stub = StaticFetcher::default()
            .with_body("https://track.test/", 200, &script("https://landing.test/"))
            .with("https://landing.test/", 404);
        let (evaluator, fetcher) = evaluator(stub);

        let result = evaluator.evaluate(vec![html("https://track.test/", 1)], None).await;

        assert_eq!(result.working_urls.len(), 1);
        assert_eq!(result.working_urls[0].url, "https://track.test/");
        assert_eq!(result.broken_urls.len(), 1);
        assert_eq!(result.broken_urls[0].url, "https://landing.test/");
        assert_eq!(result.broken_urls[0].url_type, UrlType::Html);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_redirects_stop_after_one_extra_round() {
        // Each hop points at another; only the first hop is followed
        let stub = StaticFetcher::default()
            .with_body("https://one.test/", 200, &script("https://two.test/"))
            .with_body("https://two.test/", 200, &script("https://three.test/"))
            .with_body("https://three.test/", 200, "never fetched");
        let (evaluator, fetcher) = evaluator(stub);

        let result = evaluator.evaluate(vec![html("https://one.test/", 1)], None).await;

        let urls: Vec<_> = result.working_urls.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://one.test/", "https://two.test/"]);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_302_script_is_replaced_by_its_target() {
        let stub = StaticFetcher::default()
            .with_body("https://mkto.test/", 302, &script("https://landing.test/"))
            .with_body("https://landing.test/", 200, "ok");
        let (evaluator, _) = evaluator(stub);

        let result = evaluator.evaluate(vec![html("https://mkto.test/", 3)], None).await;

        assert!(result.broken_urls.is_empty());
        assert_eq!(result.working_urls.len(), 1);
        assert_eq!(result.working_urls[0].url, "https://landing.test/");
        assert_eq!(result.working_urls[0].order, 3);
    }

    #[tokio::test]
    async fn test_empty_redirect_is_broken_404() {
        let stub = StaticFetcher::default().with_body(
            "https://r.test/",
            302,
            "404 Not Found: The redirect url is empty",
        );
        let (evaluator, _) = evaluator(stub);

        let result = evaluator.evaluate(vec![html("https://r.test/", 1)], None).await;

        assert_eq!(result.broken_urls.len(), 1);
        assert_eq!(result.broken_urls[0].status_code, "404");
        assert_eq!(result.broken_urls[0].message, "The redirect url is empty");
    }

    #[tokio::test]
    async fn test_pass_on_codes_and_999() {
        let stub = StaticFetcher::default()
            .with("https://forbidden.test/", 403)
            .with("https://linkedin.test/", 999)
            .with("https://limited.test/", 429);
        let (evaluator, _) = evaluator(stub);

        let result = evaluator
            .evaluate(
                vec![
                    html("https://forbidden.test/", 1),
                    html("https://linkedin.test/", 2),
                    html("https://limited.test/", 3),
                ],
                Some("403"),
            )
            .await;

        let codes: Vec<_> = result.working_urls.iter().map(|r| r.status_code.as_str()).collect();
        assert_eq!(codes, vec!["403", "999"]);
        assert_eq!(result.broken_urls.len(), 1);
        assert_eq!(result.broken_urls[0].status_code, "429");
    }

    #[tokio::test]
    async fn test_every_candidate_terminates_once() {
        let stub = StaticFetcher::default()
            .with("https://a.test/", 200)
            .with("https://b.test/", 500)
            .with_body("https://c.test/", 200, &script("https://d.test/"))
            .with("https://d.test/", 200)
            .with_body("https://e.test/", 302, &script("https://f.test/"));
        let (evaluator, _) = evaluator(stub);

        let candidates = vec![
            html("https://a.test/", 1),
            html("https://b.test/", 2),
            html("https://c.test/", 3),
            html("https://e.test/", 4),
            html("https://unreachable.test/", 5),
        ];
        let result = evaluator.evaluate(candidates, None).await;

        // 4 round-1 terminals (e.test is superseded) + 2 redirect targets
        assert_eq!(result.working_urls.len() + result.broken_urls.len(), 6);
        let f = result.broken_urls.iter().find(|r| r.url == "https://f.test/").unwrap();
        assert_eq!(f.status_code, NO_RESPONSE);
    }

    #[tokio::test]
    async fn test_panicking_fetch_only_breaks_its_own_url() {
        let stub = StaticFetcher::default()
            .with("https://fine.test/", 200)
            .panicking("https://panic.test/");
        let (evaluator, _) = evaluator(stub);

        let result = evaluator
            .evaluate(
                vec![html("https://panic.test/", 1), html("https://fine.test/", 2)],
                None,
            )
            .await;

        assert_eq!(result.working_urls.len(), 1);
        assert_eq!(result.broken_urls.len(), 1);
        assert_eq!(result.broken_urls[0].url, "https://panic.test/");
        assert_eq!(result.broken_urls[0].message, NO_RESPONSE);
    }

    #[tokio::test]
    async fn test_duplicates_are_fetched_once() {
        let (evaluator, fetcher) =
            evaluator(StaticFetcher::default().with("https://a.test/", 200));

        let result = evaluator
            .evaluate(vec![html("https://a.test/", 1), html("https://a.test/", 2)], None)
            .await;

        assert_eq!(result.working_urls.len(), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_results_are_sorted_and_repeatable() {
        let mut stub = StaticFetcher::default();
        for i in 1..=20 {
            let status = if i % 3 == 0 { 404 } else { 200 };
            stub = stub.with(&format!("https://site.test/{i}"), status);
        }
        let (evaluator, _) = evaluator(stub);
        let evaluator = evaluator.with_concurrency(4);

        let candidates: Vec<_> = (1..=20)
            .rev()
            .map(|i| html(&format!("https://site.test/{i}"), i))
            .collect();

        let first = evaluator.evaluate(candidates.clone(), None).await;
        let second = evaluator.evaluate(candidates, None).await;
        assert_eq!(first, second);

        let orders: Vec<_> = first.all_sorted().iter().map(|r| r.order).collect();
        assert_eq!(orders, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_exclude_filters_both_lists() {
        let working = LinkCheckResult {
            url: "tel:+15551234".to_string(),
            final_url: "tel:+15551234".to_string(),
            status_code: "200".to_string(),
            message: "Status code: 200".to_string(),
            url_type: UrlType::Html,
            order: 1,
            status: LinkStatus::Working,
        };
        let broken = LinkCheckResult {
            url: "https://x.test/track?mktoTestLink=1".to_string(),
            status: LinkStatus::Broken,
            ..working.clone()
        };
        let mut result = EvaluationResult {
            broken_urls: vec![broken],
            working_urls: vec![working],
        };

        result.exclude(|url| url.starts_with("tel:") || url.contains("/track?mktoTestLink"));
        assert!(!result.has_broken());
        assert!(result.working_urls.is_empty());
    }
}
