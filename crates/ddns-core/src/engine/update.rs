//! Single-target record update
//!
//! Reads the remote record, checks that its name is the one this target is
//! meant to own, and replaces it with the resolved address. The read and
//! the write are two separate requests; nothing guards against a change
//! made remotely in between.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::record::UpdateTarget;
use crate::traits::{DnsRecord, ProviderMessage, ProviderResponse, RecordUpdateRequest};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

/// Result of an update attempt that reached the provider
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateResult {
    /// The record was replaced; carries the provider's echo
    Updated(DnsRecord),
    /// The record already matched; no write was issued
    Unchanged(DnsRecord),
    /// The provider answered with an error list
    Rejected(Vec<ProviderMessage>),
}

/// Comment stamped onto every written record
pub fn update_comment(server_name: &str) -> String {
    format!(
        "[{} auto updated, on {}]",
        server_name,
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Update of one target to one address
pub struct RecordUpdateTask<'a> {
    target: &'a UpdateTarget,
    content: Address,
    comment: String,
    force: bool,
}

impl<'a> RecordUpdateTask<'a> {
    pub fn new(target: &'a UpdateTarget, content: Address, server_name: &str) -> Self {
        Self {
            target,
            content,
            comment: update_comment(server_name),
            force: false,
        }
    }

    /// Write even when the remote record already matches
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Run the read, guard and write steps
    ///
    /// # Errors
    ///
    /// - [`Error::UnexpectedNameChange`] when the remote name differs from
    ///   the expected one, or no name is expected, and renaming is not
    ///   allowed; no write is issued
    /// - transport errors from the provider
    pub async fn execute(&self) -> Result<UpdateResult> {
        let target = self.target;
        let provider = target.provider();

        debug!(
            zone_id = target.zone_id(),
            record_id = target.record_id(),
            "fetching current record"
        );
        let current = match provider
            .get_record(target.zone_id(), target.record_id())
            .await?
        {
            ProviderResponse::Success(record) => record,
            ProviderResponse::Failure(errors) => return Ok(UpdateResult::Rejected(errors)),
        };

        let name = match target.expected_name() {
            Some(expected) if !same_name(expected, &current.name) => {
                if !target.allow_name_change() {
                    return Err(Error::UnexpectedNameChange {
                        current: current.name,
                        expected: expected.to_string(),
                    });
                }
                warn!(
                    "renaming record {} from '{}' to '{}'",
                    target.record_id(),
                    current.name,
                    expected
                );
                expected.to_string()
            }
            Some(expected) => expected.to_string(),
            // no expected name: only a target allowed to rename may write
            None if !target.allow_name_change() => {
                return Err(Error::UnexpectedNameChange {
                    current: current.name,
                    expected: String::new(),
                });
            }
            None => current.name.clone(),
        };

        let request = RecordUpdateRequest {
            name,
            record_type: self.content.family().record_type().to_string(),
            content: self.content.to_string(),
            proxied: target.proxied(),
            ttl: target.ttl(),
            comment: self.comment.clone(),
        };

        if !self.force && is_up_to_date(&current, &request) {
            debug!(record = %current.name, "record already up to date");
            return Ok(UpdateResult::Unchanged(current));
        }

        match provider
            .put_record(target.zone_id(), target.record_id(), &request)
            .await?
        {
            ProviderResponse::Success(record) => Ok(UpdateResult::Updated(record)),
            ProviderResponse::Failure(errors) => Ok(UpdateResult::Rejected(errors)),
        }
    }
}

// DNS names compare case-insensitively
fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn is_up_to_date(current: &DnsRecord, desired: &RecordUpdateRequest) -> bool {
    let same_content = match current.content.parse::<Address>() {
        Ok(address) => address.to_string() == desired.content,
        Err(_) => current.content == desired.content,
    };
    same_content
        && same_name(&current.name, &desired.name)
        && current.record_type == desired.record_type
        && current.ttl == desired.ttl
        && current.proxied == desired.proxied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> DnsRecord {
        DnsRecord {
            id: "rec".to_string(),
            name: "host.example.com".to_string(),
            record_type: "AAAA".to_string(),
            content: content.to_string(),
            proxied: false,
            ttl: 60,
            comment: None,
            zone_name: None,
        }
    }

    fn request(content: &str) -> RecordUpdateRequest {
        RecordUpdateRequest {
            name: "host.example.com".to_string(),
            record_type: "AAAA".to_string(),
            content: content.to_string(),
            proxied: false,
            ttl: 60,
            comment: "[x]".to_string(),
        }
    }

    #[test]
    fn comment_carries_server_name_and_utc_timestamp() {
        let comment = update_comment("edge-01");
        assert!(comment.starts_with("[edge-01 auto updated, on "));
        assert!(comment.ends_with("Z]"), "{comment}");
    }

    #[test]
    fn equivalent_address_text_counts_as_up_to_date() {
        assert!(is_up_to_date(
            &record("2001:0db8:0000::0001"),
            &request("2001:db8::1")
        ));
        assert!(!is_up_to_date(&record("2001:db8::2"), &request("2001:db8::1")));
    }

    #[test]
    fn ttl_or_proxy_drift_needs_an_update() {
        let mut desired = request("2001:db8::1");
        desired.ttl = 300;
        assert!(!is_up_to_date(&record("2001:db8::1"), &desired));

        let mut desired = request("2001:db8::1");
        desired.proxied = true;
        assert!(!is_up_to_date(&record("2001:db8::1"), &desired));
    }

    #[test]
    fn comment_difference_alone_is_not_drift() {
        let mut current = record("2001:db8::1");
        current.comment = Some("[old]".to_string());
        assert!(is_up_to_date(&current, &request("2001:db8::1")));
    }

    #[test]
    fn names_compare_case_insensitively() {
        assert!(same_name("Host.Example.com", "host.example.com"));
        assert!(!same_name("a.example.com", "b.example.com"));
    }
}
