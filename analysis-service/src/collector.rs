use crate::task_group::run_isolated;
use std::collections::VecDeque;
use std::sync::Arc;
use stocksense_core::{
    AnalysisError, CollectedPost, CollectorSettings, PostSource, RawComment, RawPost,
    SearchRequest, TimeFilter,
};
use tracing::{debug, info};

/// Search text for a ticker: `"<SYMBOL> stock"`.
pub fn search_query(symbol: &str) -> String {
    format!("{} stock", symbol.trim().to_uppercase())
}

/// Flattens a comment forest breadth-first, keeping at most `cap` comments.
pub fn flatten_comments(forest: Vec<RawComment>, cap: usize) -> Vec<RawComment> {
    let mut queue: VecDeque<RawComment> = forest.into();
    let mut flat = Vec::with_capacity(cap.min(queue.len()));

    while flat.len() < cap {
        let Some(mut comment) = queue.pop_front() else {
            break;
        };
        queue.extend(std::mem::take(&mut comment.replies));
        flat.push(comment);
    }

    flat
}

#[derive(Clone)]
pub struct PostCollector {
    source: Arc<dyn PostSource>,
    forums: Vec<String>,
    max_concurrency: usize,
}

impl PostCollector {
    pub fn new(source: Arc<dyn PostSource>, settings: &CollectorSettings) -> Self {
        Self {
            source,
            forums: settings.forums.clone(),
            max_concurrency: settings.max_concurrency,
        }
    }

    pub fn forums(&self) -> &[String] {
        &self.forums
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn search(
        &self,
        symbol: &str,
        time_filter: TimeFilter,
        limit: usize,
    ) -> Result<Vec<RawPost>, AnalysisError> {
        let request = SearchRequest {
            query: search_query(symbol),
            forums: self.forums.clone(),
            time_filter,
            limit,
        };

        let posts = self
            .source
            .search_posts(&request)
            .await
            .map_err(|e| AnalysisError::DataSource {
                reason: e.to_string(),
            })?;

        info!(
            "Search '{}' over {} forums returned {} posts",
            request.query,
            self.forums.len(),
            posts.len()
        );
        Ok(posts)
    }

    /// Loads one post's comments. Failure here only costs this post.
    pub async fn collect_thread(
        &self,
        post: RawPost,
        max_comments: usize,
    ) -> Result<CollectedPost, AnalysisError> {
        let thread = self
            .source
            .fetch_thread(&post, max_comments)
            .await
            .map_err(|e| AnalysisError::ItemProcessing {
                item: format!("post {}", post.id),
                reason: e.to_string(),
            })?;

        let comments = flatten_comments(thread.comments, max_comments);
        debug!("Collected {} comments for post {}", comments.len(), post.id);

        Ok(CollectedPost { post, comments })
    }

    /// Fetches every thread concurrently and runs `process` on each, keeping
    /// search order. Posts whose fetch or processing fails are dropped.
    pub async fn collect_threads<R, F>(
        &self,
        posts: Vec<RawPost>,
        max_comments: usize,
        process: F,
    ) -> Vec<R>
    where
        R: Send + 'static,
        F: Fn(CollectedPost) -> Result<R, AnalysisError> + Send + Sync + 'static,
    {
        let collector = self.clone();
        let process = Arc::new(process);
        run_isolated(posts, self.max_concurrency, move |post| {
            let collector = collector.clone();
            let process = process.clone();
            async move {
                collector
                    .collect_thread(post, max_comments)
                    .await
                    .and_then(|collected| process(collected))
            }
        })
        .await
    }
}

impl std::fmt::Debug for PostCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostCollector")
            .field("forums", &self.forums)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}
