//! Role-gated navigation structure.
//!
//! The tree is static configuration. [`NavigationTree::visible_to`] is the
//! only operation over it and always builds a fresh tree.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RoleLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    /// Translation key of the label.
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<RoleLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavGroup {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<RoleLevel>,
    #[serde(default)]
    pub items: Vec<NavItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationTree {
    pub groups: Vec<NavGroup>,
}

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("failed to read navigation config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid navigation config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Unrestricted entries are always visible; restricted ones need a level
/// at least as privileged as the requirement.
fn permits(requirement: Option<RoleLevel>, level: Option<RoleLevel>) -> bool {
    match (requirement, level) {
        (None, _) => true,
        (Some(required), Some(level)) => level.satisfies(required),
        (Some(_), None) => false,
    }
}

impl NavigationTree {
    pub fn new(groups: Vec<NavGroup>) -> Self {
        Self { groups }
    }

    /// Load a tree from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NavigationError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Built-in dashboard sidebar.
    pub fn sidebar() -> Self {
        let item = |title: &str, url: &str| NavItem {
            title: format!("navigation.sidebar.finance.{title}"),
            url: url.to_string(),
            min_level: None,
        };

        Self::new(vec![NavGroup {
            title: "navigation.sidebar.finance.title".to_string(),
            icon: Some("CircleDollarSign".to_string()),
            is_active: true,
            min_level: None,
            items: vec![
                item("categories", "/dashboard/finance/categories"),
                item("income_transactions", "/dashboard/finance/transactions/income"),
                item("expense_transactions", "/dashboard/finance/transactions/expense"),
            ],
        }])
    }

    /// The subset of the tree a session at `level` may see.
    ///
    /// Groups left without any visible item are dropped.
    pub fn visible_to(&self, level: Option<RoleLevel>) -> NavigationTree {
        let groups = self
            .groups
            .iter()
            .filter(|group| permits(group.min_level, level))
            .filter_map(|group| {
                let items: Vec<NavItem> = group
                    .items
                    .iter()
                    .filter(|item| permits(item.min_level, level))
                    .cloned()
                    .collect();

                (!items.is_empty()).then(|| NavGroup {
                    items,
                    ..group.clone()
                })
            })
            .collect();

        NavigationTree { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Free-function form of [`NavigationTree::visible_to`].
pub fn filter(tree: &NavigationTree, level: Option<RoleLevel>) -> NavigationTree {
    tree.visible_to(level)
}

/// Top-bar link to a sibling site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLink {
    pub href: String,
    pub label: String,
    pub translation_key: String,
}

/// Links to the public site and the finance site for a deployment domain.
///
/// `base_url` may carry a scheme and a trailing slash; both are stripped.
pub fn site_links(base_url: &str) -> Vec<SiteLink> {
    let domain = base_url
        .strip_prefix("https://")
        .or_else(|| base_url.strip_prefix("http://"))
        .unwrap_or(base_url);
    let domain = domain.strip_suffix('/').unwrap_or(domain);

    vec![
        SiteLink {
            href: format!("https://{domain}"),
            label: "Home".to_string(),
            translation_key: "home".to_string(),
        },
        SiteLink {
            href: format!("https://kas.{domain}"),
            label: "Finance".to_string(),
            translation_key: "finance".to_string(),
        },
    ]
}
