//! # canvas-lms - Canvas LMS REST API client for Rust
//!
//! A blocking client for the Canvas LMS REST API. It attaches credentials to
//! every call, refreshes expired OAuth tokens, walks `Link` header pagination,
//! maps failures to typed errors and serializes request payloads the way
//! Canvas expects them.
//!
//! ## Features
//!
//! - Two authentication methods:
//!   - static API keys (personal access tokens)
//!   - OAuth2 token pairs with automatic, single-flight refresh
//! - Lazy iteration over paginated collections
//! - Typed errors carrying the API's structured field errors
//! - Request payloads as JSON bodies or Canvas-style multipart fields
//! - File uploads
//!
//! ## Basic Usage
//!
//! ```no_run
//! use canvas_lms::{CanvasClient, Config};
//! use canvas_lms::resources::Course;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new("https://canvas.example.edu").with_per_page(50);
//!     let client = CanvasClient::with_api_key(config, "1234~abcd")?;
//!
//!     let course = Course::fetch(&client, 101)?;
//!     println!("Course: {:?}", course.name);
//!
//!     for course in Course::list(&client, &["term"])? {
//!         println!("{}", course?.id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## OAuth2
//!
//! ```no_run
//! use canvas_lms::{CanvasClient, Config, OAuthClientConfig, OAuthToken};
//!
//! let config = Config::new("https://canvas.example.edu")
//!     .with_oauth_client(OAuthClientConfig::new("10000000000001", "client-secret"));
//! let token = OAuthToken::new("access", "refresh", None);
//!
//! let client = CanvasClient::with_oauth_token(config, token)?;
//! let me: serde_json::Value = client.get("users/self")?;
//! # Ok::<(), canvas_lms::CanvasError>(())
//! ```

pub mod apikey;
pub mod client;
pub mod credential;
pub mod dto;
pub mod error;
pub mod pagination;
pub mod refresh;
pub mod resources;
pub mod response;
pub mod rest;
pub mod time;
pub mod token;
pub mod upload;

// Re-export main types for convenience
pub use apikey::ApiKey;
pub use client::{Config, OAuthClientConfig};
pub use credential::{AuthMode, Credential, CredentialStore};
pub use dto::{ApiDto, Body, FormField, Param};
pub use error::{ApiErrorEntry, CanvasError, Result};
pub use pagination::{PageLinks, Paginator};
pub use refresh::TokenRefresher;
pub use response::Response;
pub use rest::{CanvasClient, RequestDescriptor};
pub use time::Time;
pub use token::OAuthToken;
pub use upload::{upload, FileUploadDto, UploadProgressFn};

// Re-export serde_json for convenience
pub use serde_json::json;
