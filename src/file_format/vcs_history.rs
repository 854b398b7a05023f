//! This file defines the JSON records the test manager's changelog endpoint
//! (`vcs/changelog/{repository}/{first}/{count}`) hands back.  The field names
//! follow the test manager's Hungarian-ish conventions (`i` for integers, `s`
//! for strings, `ts` for timestamps, `ao` for arrays of objects) so we rename
//! them on the way in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp::{parse_iso_timestamp, TimestampError};

/// Placeholder in `changeset_url_format` replaced by the repository name.
pub const REPOSITORY_PLACEHOLDER: &str = "%(sRepository)s";
/// Placeholder in `changeset_url_format` replaced by the revision number.
pub const REVISION_PLACEHOLDER: &str = "%(iRevision)s";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CommitEntry {
    #[serde(rename = "iRevision")]
    pub revision: u64,
    #[serde(rename = "sAuthor")]
    pub author: String,
    #[serde(rename = "sMessage")]
    pub message: String,
    /// Creation timestamp in the loose ISO 8601 dialect handled by
    /// `crate::timestamp`.  We keep the string as received and parse it when
    /// rendering so that one bad timestamp doesn't cost us the whole window.
    #[serde(rename = "tsCreated")]
    pub created: String,
    #[serde(rename = "sRepository")]
    pub repository: String,
}

impl CommitEntry {
    pub fn created_at(&self) -> Result<DateTime<Utc>, TimestampError> {
        parse_iso_timestamp(&self.created)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// The commits in the requested window, in the order the server wants them
    /// displayed (newest first in practice).
    #[serde(rename = "aoCommits", default)]
    pub commits: Vec<CommitEntry>,

    /// Format string for linking a revision to the changeset viewer.  Contains
    /// `REPOSITORY_PLACEHOLDER` and `REVISION_PLACEHOLDER`.
    #[serde(rename = "sTracChangesetUrlFmt", default)]
    pub changeset_url_format: String,
}

impl HistoryResponse {
    /// Expand `changeset_url_format` for a commit.  The repository name is
    /// percent-encoded since it lands in a URL.
    pub fn changeset_url(&self, entry: &CommitEntry) -> String {
        self.changeset_url_format
            .replace(
                REPOSITORY_PLACEHOLDER,
                &urlencoding::encode(&entry.repository),
            )
            .replace(REVISION_PLACEHOLDER, &entry.revision.to_string())
    }
}
