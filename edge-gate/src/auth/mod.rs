// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Authentication Module
//!
//! ## Components
//!
//! - **cookies**: cookie parsing and environment-scoped token resolution
//! - **claims**: verified platform claims vs. the unverified provider hint
//! - **jwt**: RS256 verification and unverified provider sniffing
//! - **oidc**: discovery document, JWKS and code exchange with the enterprise directory
//! - **session**: locally issued session tokens
//! - **login**: enterprise directory login state machine

pub mod claims;
pub mod cookies;
pub mod jwt;
pub mod login;
pub mod oidc;
pub mod session;

// Re-exports for convenience
pub use claims::{IdTokenClaims, PlatformClaims, Provider, ProviderHint};
pub use cookies::{token_from_request, CookieJar};
pub use jwt::{sniff_provider, verify_rs256, JwtError};
pub use login::{EnterpriseLogin, LoginConfigCache, LoginDecision, LoginState};
pub use oidc::{HttpIdentityProvider, IdentityProviderApi, OidcError};
pub use session::{SessionClaims, SessionKeys};
