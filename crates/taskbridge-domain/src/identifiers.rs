use serde::{Deserialize, Serialize};

use crate::items::RemoteItem;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ItemId);
string_id!(TaskId);
string_id!(ReconciliationKey);

impl ReconciliationKey {
    /// Key under which an item is tracked: `pr:<id>` or `issue:<id>`.
    ///
    /// Both PR categories share the `pr` bucket, so a PR matched as authored
    /// and as review-requested maps to a single key.
    pub fn for_item(item: &RemoteItem) -> Self {
        Self(format!("{}:{}", item.category.bucket().as_str(), item.id.as_str()))
    }
}
