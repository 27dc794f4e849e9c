//! # pagegenie-client
//!
//! Execution machinery for pagegenie: the on-device bridge, the backend
//! gateway with its credential lifecycle, the response normalizer and the
//! router that chooses between them.
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagegenie_client::{
//!     link, BackendApi, BridgeClient, BridgeClientConfig, BridgeHost, Coordinator, Gateway,
//!     OllamaPromptModel, Router,
//! };
//! use pagegenie_core::{Mode, Operation, SettingsStore};
//!
//! # async fn example() -> pagegenie_core::Result<()> {
//! let settings = Arc::new(SettingsStore::open(SettingsStore::default_path())?);
//! let (handle, _task) = Coordinator::new(Gateway::new(settings)?).start();
//!
//! let (content, page) = link(64);
//! let _host = BridgeHost::new()
//!     .with_prompt_model(Arc::new(OllamaPromptModel::from_env()))
//!     .spawn(page);
//! let local = BridgeClient::new(content, BridgeClientConfig::from_env());
//!
//! let router = Router::new(Arc::new(local), Arc::new(BackendApi::new(Arc::new(handle))));
//! let result = router.run(Operation::Summarize, "some page text", "en", Mode::Auto).await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod bridge;
pub mod coordinator;
pub mod credentials;
pub mod gateway;
pub mod mock;
pub mod normalize;
pub mod ollama;
pub mod prompts;
pub mod router;

pub use api::BackendApi;
pub use bridge::{link, BridgeClient, BridgeClientConfig, BridgeEnd, BridgeHost, BridgeMessage};
pub use coordinator::{Coordinator, CoordinatorHandle};
pub use credentials::{AuthClient, CredentialStore};
pub use gateway::{Gateway, GatewayConfig};
pub use ollama::OllamaPromptModel;
pub use router::{RouteRequest, Router};
