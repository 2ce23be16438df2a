//! Upstream provider adapters for chatgate
//!
//! Each adapter shapes the upstream request, sends it through the shared
//! [`HttpCaller`] and normalizes the answer into a [`ProviderResult`]. The
//! [`ModelRouter`] maps public model ids to adapters and the [`Dispatcher`]
//! applies the quota fallback on top of it.
//!
//! [`ProviderResult`]: chatgate_core::ProviderResult

pub mod classify;
pub mod dispatch;
pub mod gemini;
pub mod http_client;
pub mod huggingface;
pub mod openai_compat;
pub mod provider;
pub mod router;
pub mod settings;
pub mod workers_ai;

pub use classify::classify;
pub use dispatch::{Dispatch, Dispatcher, DEFAULT_FALLBACK_MODEL};
pub use gemini::Gemini;
pub use http_client::{HttpCaller, UpstreamReply};
pub use huggingface::HuggingFaceImage;
pub use openai_compat::OpenAiCompatible;
pub use provider::{OutputKind, Provider, Tier};
pub use router::{ModelRouter, Route};
pub use settings::{Credentials, Endpoints, ProviderSettings};
pub use workers_ai::{EdgeBinding, WorkersAi};
