//! Identity keys: the fields that decide whether two records describe the same
//! real-world entity. Derivation normalizes input; an entity with no usable
//! identity yields `None` and is never treated as a duplicate.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    Job,
    Contact,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Company, Self::Job, Self::Contact];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Job => "job",
            Self::Contact => "contact",
        }
    }

    /// Prefix shared by every seen-marker key of this kind.
    pub fn cache_prefix(&self) -> String {
        format!("seen:{}:", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized identity of a company, job posting, or contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityKey {
    Company { domain: String },
    Job { source: String, external_id: String },
    Contact { email: String },
}

impl IdentityKey {
    /// Accepts a bare hostname or a full website URL.
    pub fn company(domain_or_url: &str) -> Option<Self> {
        normalize_domain(domain_or_url).map(|domain| Self::Company { domain })
    }

    pub fn job(source: &str, external_id: &str) -> Option<Self> {
        let source = source.trim();
        let external_id = external_id.trim();
        if source.is_empty() || external_id.is_empty() {
            return None;
        }
        Some(Self::Job {
            source: source.to_string(),
            external_id: external_id.to_string(),
        })
    }

    pub fn contact(email: &str) -> Option<Self> {
        normalize_email(email).map(|email| Self::Contact { email })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Company { .. } => EntityKind::Company,
            Self::Job { .. } => EntityKind::Job,
            Self::Contact { .. } => EntityKind::Contact,
        }
    }

    /// Fast-cache key: `seen:{kind}:{identity}`.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Company { domain } => format!("seen:company:{domain}"),
            Self::Job {
                source,
                external_id,
            } => format!("seen:job:{source}:{external_id}"),
            Self::Contact { email } => format!("seen:contact:{email}"),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Company { domain } => write!(f, "company {domain}"),
            Self::Job {
                source,
                external_id,
            } => write!(f, "job {source}/{external_id}"),
            Self::Contact { email } => write!(f, "contact {email}"),
        }
    }
}

/// Lower-cased hostname with scheme, credentials, port, path and leading
/// `www.` removed. Returns `None` for blank input.
pub fn normalize_domain(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let host = if trimmed.contains("://") {
        url::Url::parse(trimmed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    } else {
        // Bare "example.com/careers" or "example.com:8080"
        trimmed
            .split(['/', '?', '#'])
            .next()
            .map(|h| h.rsplit('@').next().unwrap_or(h))
            .map(|h| h.split(':').next().unwrap_or(h).to_string())
    }?;

    let host = host.trim().trim_end_matches('.').to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

pub fn normalize_email(input: &str) -> Option<String> {
    let email = input.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_strips_www_and_case() {
        assert_eq!(normalize_domain("WWW.Acme.com").as_deref(), Some("acme.com"));
    }

    #[test]
    fn domain_from_full_url() {
        assert_eq!(
            normalize_domain("https://www.acme.com:443/careers?x=1").as_deref(),
            Some("acme.com")
        );
    }

    #[test]
    fn domain_from_bare_host_with_path_and_port() {
        assert_eq!(normalize_domain("acme.com:8080/jobs").as_deref(), Some("acme.com"));
    }

    #[test]
    fn blank_domain_has_no_identity() {
        assert_eq!(normalize_domain("   "), None);
        assert_eq!(IdentityKey::company(""), None);
    }

    #[test]
    fn only_leading_www_is_stripped() {
        assert_eq!(normalize_domain("mywww.example.com").as_deref(), Some("mywww.example.com"));
    }

    #[test]
    fn email_is_lowercased_and_trimmed() {
        let key = IdentityKey::contact("  Jane.Doe@Acme.COM ").unwrap();
        assert_eq!(key.cache_key(), "seen:contact:jane.doe@acme.com");
    }

    #[test]
    fn job_requires_source_and_external_id() {
        assert_eq!(IdentityKey::job("indeed", ""), None);
        assert_eq!(IdentityKey::job("", "abc"), None);
        let key = IdentityKey::job(" indeed ", "abc123").unwrap();
        assert_eq!(key.cache_key(), "seen:job:indeed:abc123");
        assert_eq!(key.kind(), EntityKind::Job);
    }

    #[test]
    fn cache_keys_share_kind_prefix() {
        let key = IdentityKey::company("acme.com").unwrap();
        assert!(key.cache_key().starts_with(&EntityKind::Company.cache_prefix()));
    }
}
