//! Advisor pipeline for chat requests.
//!
//! An advisor wraps the model call: it may inspect or rewrite the request on
//! the way in, short-circuit with its own response, and inspect or replace
//! the response on the way out. Advisors are composed into an
//! [`AdvisorChain`] ordered by ascending [`Advisor::order`]; the lowest order
//! is outermost (sees the request first and the response last).

pub mod box_advisor;
pub mod chain;
pub mod content_filter;
pub mod context;
pub mod logging;
pub mod memory;
pub mod model;
pub mod retrieval;

use std::pin::Pin;

use futures_util::Stream;

use heartline_types::error::ChatError;

pub use box_advisor::BoxAdvisor;
pub use chain::{AdvisorChain, AdvisorChainBuilder, CallNext, StreamNext};
pub use content_filter::ContentFilterAdvisor;
pub use context::{
    AdvisedRequest, AdvisedResponse, CONTENT_VIOLATION_KEY, DeferredCommit, PendingCommits,
};
pub use logging::LoggingAdvisor;
pub use memory::{CHAT_MEMORY_RETRIEVE_SIZE_KEY, MemoryAdvisor};
pub use model::{ModelCall, ModelOptions};
pub use retrieval::{RETRIEVED_DOCUMENTS_KEY, RetrievalAdvisor};

/// Outermost possible position.
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// Stream of response fragments flowing outward through the chain.
pub type AdvisedStream =
    Pin<Box<dyn Stream<Item = Result<AdvisedResponse, ChatError>> + Send + 'static>>;

/// A stage in the chat pipeline.
///
/// Uses native async fn in traits (RPITIT) for the synchronous path; the
/// streaming path returns a boxed stream so it can outlive the borrow of
/// the advisor. `BoxAdvisor` provides the dynamic-dispatch form.
pub trait Advisor: Send + Sync {
    /// Stable identifier used in logs.
    fn name(&self) -> &str;

    /// Position in the chain; lower runs outermost.
    fn order(&self) -> i32;

    /// Handle a request/response exchange. Call `next.call(request)` to
    /// continue inward, or return without calling it to short-circuit.
    fn around_call(
        &self,
        request: AdvisedRequest,
        next: CallNext,
    ) -> impl std::future::Future<Output = Result<AdvisedResponse, ChatError>> + Send;

    /// Streaming counterpart of [`Advisor::around_call`].
    fn around_stream(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream;
}
