//! Third-party integrations: alert sinks, log sinks and SAML identity providers.

pub mod saml;
pub mod slack;
pub mod splunk;
