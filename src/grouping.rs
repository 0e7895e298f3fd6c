use crate::error::{ReconcilerError, Result};
use crate::schema::{Category, GroupMembership, Link, SourceSystem};
use crate::similarity::LinkSuggestion;
use crate::store::Table;
use log::info;
use std::collections::BTreeMap;

fn membership_key(source: SourceSystem, item_identity: &str) -> String {
    format!("membership/{}/{}", source, item_identity)
}

fn link_key(erp_group: &str) -> String {
    format!("link/{}", erp_group)
}

/// Persists item-to-group memberships for one table. An item belongs to at
/// most one group per source system; reassigning moves it.
pub struct GroupingStore<T: Table> {
    table: T,
}

impl<T: Table> GroupingStore<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// Assigns every selected item to `group_name`, replacing any previous
    /// membership. Group names are stored uppercased.
    pub fn assign(
        &mut self,
        items: &[(String, Category)],
        group_name: &str,
        source: SourceSystem,
    ) -> Result<usize> {
        let name = group_name.trim().to_uppercase();
        if name.is_empty() {
            return Err(ReconcilerError::InvalidGroupName(
                "group name cannot be empty".to_string(),
            ));
        }
        if items.is_empty() {
            return Err(ReconcilerError::EmptySelection(
                "no items to assign".to_string(),
            ));
        }
        for (item, category) in items {
            let membership = GroupMembership {
                item_identity: item.clone(),
                source,
                group_name: name.clone(),
                category: *category,
            };
            let value = serde_json::to_string(&membership)?;
            self.table.upsert(&membership_key(source, item), &value)?;
        }
        info!("assigned {} item(s) to group '{}' ({})", items.len(), name, source);
        Ok(items.len())
    }

    /// Maps item identity to group name for one source system.
    pub fn lookup_all(&self, source: SourceSystem) -> Result<BTreeMap<String, String>> {
        let prefix = format!("membership/{}/", source);
        let mut out = BTreeMap::new();
        for (_, value) in self.table.scan(&prefix)? {
            let membership: GroupMembership = serde_json::from_str(&value)?;
            out.insert(membership.item_identity, membership.group_name);
        }
        Ok(out)
    }

    pub fn memberships(&self, source: SourceSystem) -> Result<Vec<GroupMembership>> {
        let prefix = format!("membership/{}/", source);
        self.table
            .scan(&prefix)?
            .into_iter()
            .map(|(_, value)| serde_json::from_str(&value).map_err(Into::into))
            .collect()
    }

    /// Removes every membership of `group_name` in `source`, returning how
    /// many items were released.
    pub fn delete_group(&mut self, group_name: &str, source: SourceSystem) -> Result<usize> {
        let name = group_name.trim().to_uppercase();
        let prefix = format!("membership/{}/", source);
        let removed = self.table.delete_where(&|key, value| {
            if !key.starts_with(&prefix) {
                return false;
            }
            serde_json::from_str::<GroupMembership>(value)
                .map(|m| m.group_name == name)
                .unwrap_or(false)
        })?;
        info!("deleted group '{}' ({}): {} membership(s) removed", name, source, removed);
        Ok(removed)
    }

    /// Dominant category per group: the most frequent member category, with
    /// ties broken by which category was seen first. Groups whose members
    /// carry no clear category fall back to `Other`.
    pub fn categories_by_group(&self, source: SourceSystem) -> Result<BTreeMap<String, Category>> {
        let mut counts: BTreeMap<String, Vec<(Category, usize, usize)>> = BTreeMap::new();
        for (seen, membership) in self.memberships(source)?.into_iter().enumerate() {
            let entry = counts.entry(membership.group_name).or_default();
            match entry.iter_mut().find(|(c, _, _)| *c == membership.category) {
                Some((_, count, _)) => *count += 1,
                None => entry.push((membership.category, 1, seen)),
            }
        }
        Ok(counts
            .into_iter()
            .map(|(group, tallies)| {
                let winner = tallies
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
                    .map(|(c, _, _)| c)
                    .unwrap_or(Category::Other);
                (group, winner)
            })
            .collect())
    }
}

/// Persists links between ERP groups and regulatory groups. An ERP group
/// links to at most one regulatory group.
pub struct LinkStore<T: Table> {
    table: T,
}

impl<T: Table> LinkStore<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// Creates or replaces the link for `erp_group`.
    pub fn link(&mut self, erp_group: &str, regulatory_group: &str) -> Result<()> {
        let link = Link {
            erp_group: erp_group.trim().to_uppercase(),
            regulatory_group: regulatory_group.trim().to_uppercase(),
        };
        if link.erp_group.is_empty() || link.regulatory_group.is_empty() {
            return Err(ReconcilerError::InvalidGroupName(
                "linked group names cannot be empty".to_string(),
            ));
        }
        let value = serde_json::to_string(&link)?;
        self.table.upsert(&link_key(&link.erp_group), &value)?;
        Ok(())
    }

    /// Confirms a batch of suggestions from the similarity sweep, creating or
    /// replacing one link per suggestion.
    pub fn confirm(&mut self, suggestions: &[LinkSuggestion]) -> Result<usize> {
        for suggestion in suggestions {
            self.link(&suggestion.erp_group, &suggestion.regulatory_group)?;
        }
        Ok(suggestions.len())
    }

    pub fn unlink(&mut self, erp_group: &str) -> Result<usize> {
        let key = link_key(&erp_group.trim().to_uppercase());
        self.table.delete_where(&|k, _| k == key)
    }

    /// Maps ERP group name to its linked regulatory group name.
    pub fn all_links(&self) -> Result<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for (_, value) in self.table.scan("link/")? {
            let link: Link = serde_json::from_str(&value)?;
            out.insert(link.erp_group, link.regulatory_group);
        }
        Ok(out)
    }
}
