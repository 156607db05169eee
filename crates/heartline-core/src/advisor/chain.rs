//! Ordered advisor chain with nested continuations.
//!
//! The chain owns an immutable, order-sorted list of advisors behind an
//! `Arc`. Each advisor receives a continuation (`CallNext` / `StreamNext`)
//! pointing at the next index; the continuation past the last advisor is
//! the terminal model call. Every continuation of one invocation shares the
//! same [`PendingCommits`].

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::debug;

use heartline_types::error::ChatError;

use super::box_advisor::BoxAdvisor;
use super::context::{AdvisedRequest, AdvisedResponse, PendingCommits};
use super::model::ModelCall;
use super::{AdvisedStream, Advisor};

struct ChainInner {
    advisors: Vec<BoxAdvisor>,
    model: ModelCall,
}

/// Continuation for the synchronous path.
#[derive(Clone)]
pub struct CallNext {
    inner: Arc<ChainInner>,
    index: usize,
    commits: PendingCommits,
}

impl CallNext {
    /// Commits collector of the current invocation.
    pub fn commits(&self) -> PendingCommits {
        self.commits.clone()
    }

    /// Run the rest of the chain (remaining advisors, then the model).
    pub async fn call(self, request: AdvisedRequest) -> Result<AdvisedResponse, ChatError> {
        match self.inner.advisors.get(self.index) {
            Some(advisor) => {
                debug!(advisor = advisor.name(), order = advisor.order(), "Entering advisor");
                let next = CallNext {
                    inner: Arc::clone(&self.inner),
                    index: self.index + 1,
                    commits: self.commits.clone(),
                };
                advisor.around_call(request, next).await
            }
            None => self.inner.model.call(request).await,
        }
    }
}

/// Continuation for the streaming path.
#[derive(Clone)]
pub struct StreamNext {
    inner: Arc<ChainInner>,
    index: usize,
    commits: PendingCommits,
}

impl StreamNext {
    /// Commits collector of the current invocation.
    pub fn commits(&self) -> PendingCommits {
        self.commits.clone()
    }

    /// Open the stream of the rest of the chain.
    pub fn stream(self, request: AdvisedRequest) -> AdvisedStream {
        match self.inner.advisors.get(self.index) {
            Some(advisor) => {
                debug!(advisor = advisor.name(), order = advisor.order(), "Entering stream advisor");
                let next = StreamNext {
                    inner: Arc::clone(&self.inner),
                    index: self.index + 1,
                    commits: self.commits.clone(),
                };
                advisor.around_stream(request, next)
            }
            None => self.inner.model.stream(request),
        }
    }
}

/// Immutable, cheaply cloneable advisor chain.
#[derive(Clone)]
pub struct AdvisorChain {
    inner: Arc<ChainInner>,
}

impl AdvisorChain {
    pub fn builder() -> AdvisorChainBuilder {
        AdvisorChainBuilder::default()
    }

    /// Advisor names, outermost first.
    pub fn advisor_names(&self) -> Vec<String> {
        self.inner
            .advisors
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.advisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.advisors.is_empty()
    }

    /// Run the request through every advisor and the model, then apply the
    /// commits registered along the way.
    pub async fn call(&self, request: AdvisedRequest) -> Result<AdvisedResponse, ChatError> {
        let commits = PendingCommits::new();
        let entry = CallNext {
            inner: Arc::clone(&self.inner),
            index: 0,
            commits: commits.clone(),
        };
        let response = entry.call(request).await?;
        commits.apply().await?;
        Ok(response)
    }

    /// Streaming variant of [`AdvisorChain::call`].
    ///
    /// Fragments are forwarded in produced order. Commits are applied once
    /// the outermost stream is exhausted; dropping the stream early applies
    /// none of them.
    pub fn stream(&self, request: AdvisedRequest) -> AdvisedStream {
        let commits = PendingCommits::new();
        let entry = StreamNext {
            inner: Arc::clone(&self.inner),
            index: 0,
            commits: commits.clone(),
        };
        let upstream = entry.stream(request);

        Box::pin(async_stream::try_stream! {
            let mut upstream = upstream;
            while let Some(fragment) = upstream.next().await {
                yield fragment?;
            }
            commits.apply().await?;
        })
    }
}

/// Collects advisors in registration order; `build` sorts them by order.
#[derive(Default)]
pub struct AdvisorChainBuilder {
    advisors: Vec<BoxAdvisor>,
}

impl AdvisorChainBuilder {
    pub fn advisor<A: Advisor + 'static>(self, advisor: A) -> Self {
        self.boxed(BoxAdvisor::new(advisor))
    }

    pub fn boxed(mut self, advisor: BoxAdvisor) -> Self {
        self.advisors.push(advisor);
        self
    }

    /// Finish the chain with the terminal model call.
    ///
    /// The sort is stable: advisors with equal order keep registration order.
    pub fn build(self, model: ModelCall) -> AdvisorChain {
        let mut advisors = self.advisors;
        advisors.sort_by_key(BoxAdvisor::order);
        AdvisorChain {
            inner: Arc::new(ChainInner { advisors, model }),
        }
    }
}
