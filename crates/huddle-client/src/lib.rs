//! # huddle-client
//!
//! Session, chat view and application plumbing for the Huddle admin client.
//!
//! - **App** - Terminal event loop for the `huddle` binary
//! - **Session** - STOMP connection state machine over any transport
//! - **View** - Mounted chat screen: presence, subscription, transcript, composer
//! - **Render** - Terminal rendering of the grouped transcript
//! - **Services** - REST collaborators (update feed, user roster, push registry)
//! - **Config** / **Metrics** - Ambient plumbing for the `huddle` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use huddle_client::{ChatView, Session, SessionConfig, ViewUpdate};
//! use huddle_core::Presence;
//! use huddle_transport::MemoryBus;
//! use std::sync::Arc;
//!
//! let bus = MemoryBus::new();
//! let session = Session::new(Arc::new(bus.transport()), SessionConfig::default());
//! let mut view = ChatView::new(session, Presence::default());
//!
//! view.mount();
//! loop {
//!     if let ViewUpdate::Ended(_) = view.step().await {
//!         break;
//!     }
//! }
//! ```

pub mod app;
pub mod config;
pub mod input;
pub mod metrics;
pub mod render;
pub mod services;
pub mod session;
pub mod view;

pub use config::Config;
pub use input::Input;
pub use render::Renderer;
pub use services::{HttpServices, PushRegistry, ServiceError, UpdateFeed, UserRoster};
pub use session::{
    ConnectionError, Session, SessionConfig, SessionError, SessionEvent, SessionState,
};
pub use view::{ChatView, ViewUpdate};
