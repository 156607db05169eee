//! BoxAdvisor -- object-safe dynamic dispatch wrapper for Advisor.
//!
//! Same blanket-impl pattern as `BoxLlmProvider`: `AdvisorDyn` boxes the
//! `around_call` future so heterogeneous advisors can share one chain.

use std::future::Future;
use std::pin::Pin;

use heartline_types::error::ChatError;

use super::chain::{CallNext, StreamNext};
use super::context::{AdvisedRequest, AdvisedResponse};
use super::{AdvisedStream, Advisor};

/// Object-safe version of [`Advisor`] with boxed futures.
pub trait AdvisorDyn: Send + Sync {
    fn name(&self) -> &str;

    fn order(&self) -> i32;

    fn around_call_boxed<'a>(
        &'a self,
        request: AdvisedRequest,
        next: CallNext,
    ) -> Pin<Box<dyn Future<Output = Result<AdvisedResponse, ChatError>> + Send + 'a>>;

    fn around_stream_boxed(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream;
}

impl<T: Advisor> AdvisorDyn for T {
    fn name(&self) -> &str {
        Advisor::name(self)
    }

    fn order(&self) -> i32 {
        Advisor::order(self)
    }

    fn around_call_boxed<'a>(
        &'a self,
        request: AdvisedRequest,
        next: CallNext,
    ) -> Pin<Box<dyn Future<Output = Result<AdvisedResponse, ChatError>> + Send + 'a>> {
        Box::pin(self.around_call(request, next))
    }

    fn around_stream_boxed(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream {
        self.around_stream(request, next)
    }
}

/// Type-erased advisor stored in an [`AdvisorChain`](super::AdvisorChain).
pub struct BoxAdvisor {
    inner: Box<dyn AdvisorDyn + Send + Sync>,
}

impl BoxAdvisor {
    pub fn new<T: Advisor + 'static>(advisor: T) -> Self {
        Self {
            inner: Box::new(advisor),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn order(&self) -> i32 {
        self.inner.order()
    }

    pub async fn around_call(
        &self,
        request: AdvisedRequest,
        next: CallNext,
    ) -> Result<AdvisedResponse, ChatError> {
        self.inner.around_call_boxed(request, next).await
    }

    pub fn around_stream(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream {
        self.inner.around_stream_boxed(request, next)
    }
}

impl std::fmt::Debug for BoxAdvisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxAdvisor")
            .field("name", &self.name())
            .field("order", &self.order())
            .finish()
    }
}
