use serde::{Deserialize, Serialize};

use crate::identifiers::ItemId;

pub const DEFAULT_USERNAME_SCOPE: &str = "@me";
pub const DEFAULT_FETCH_LIMIT: u32 = 100;

pub const ALL_SYNC_TYPES: [SyncType; 4] = [
    SyncType::PrReviews,
    SyncType::PrsCreated,
    SyncType::IssuesAssigned,
    SyncType::IssuesCreated,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemCategory {
    /// PR where review is requested of the user.
    PrReview,
    /// PR authored by the user.
    PrCreated,
    /// Issue assigned to the user.
    IssueAssigned,
    /// Issue authored by the user.
    IssueCreated,
}

impl ItemCategory {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::PrReview => "pr-review",
            Self::PrCreated => "pr-created",
            Self::IssueAssigned => "issue-assigned",
            Self::IssueCreated => "issue-created",
        }
    }

    pub const fn bucket(self) -> ItemBucket {
        match self {
            Self::PrReview | Self::PrCreated => ItemBucket::Pr,
            Self::IssueAssigned | Self::IssueCreated => ItemBucket::Issue,
        }
    }

    pub fn is_pull_request(self) -> bool {
        self.bucket() == ItemBucket::Pr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemBucket {
    Pr,
    Issue,
}

impl ItemBucket {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pr => "pr",
            Self::Issue => "issue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    #[default]
    Open,
    Closed,
}

/// A PR or issue currently matching the sync filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: ItemId,
    pub category: ItemCategory,
    pub title: String,
    pub url: String,
    /// `owner/name`.
    pub repo: String,
    pub number: u64,
    #[serde(default)]
    pub state: ItemState,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Configuration-side selector for which categories get synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncType {
    PrReviews,
    PrsCreated,
    IssuesAssigned,
    IssuesCreated,
}

impl SyncType {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::PrReviews => "pr-reviews",
            Self::PrsCreated => "prs-created",
            Self::IssuesAssigned => "issues-assigned",
            Self::IssuesCreated => "issues-created",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        ALL_SYNC_TYPES
            .into_iter()
            .find(|sync_type| sync_type.as_key() == value.trim())
    }

    pub const fn category(self) -> ItemCategory {
        match self {
            Self::PrReviews => ItemCategory::PrReview,
            Self::PrsCreated => ItemCategory::PrCreated,
            Self::IssuesAssigned => ItemCategory::IssueAssigned,
            Self::IssuesCreated => ItemCategory::IssueCreated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoFilterMode {
    #[default]
    All,
    Selected,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepoFilter {
    #[serde(default)]
    pub mode: RepoFilterMode,
    #[serde(default)]
    pub repos: Vec<String>,
}

impl RepoFilter {
    pub fn selected(repos: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode: RepoFilterMode::Selected,
            repos: repos.into_iter().map(Into::into).collect(),
        }
    }

    pub fn admits(&self, repo: &str) -> bool {
        match self.mode {
            RepoFilterMode::All => true,
            RepoFilterMode::Selected => self
                .repos
                .iter()
                .any(|selected| selected.eq_ignore_ascii_case(repo)),
        }
    }
}

/// Parameters handed to the remote item source for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub username: String,
    pub sync_types: Vec<SyncType>,
    pub repo_filter: RepoFilter,
    pub fetch_limit: u32,
}

impl Default for ItemQuery {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME_SCOPE.to_owned(),
            sync_types: ALL_SYNC_TYPES.to_vec(),
            repo_filter: RepoFilter::default(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }
}

impl ItemQuery {
    pub fn includes(&self, sync_type: SyncType) -> bool {
        self.sync_types.contains(&sync_type)
    }
}
