//! List-relation manager: positions of associations and cleanup of referenced
//! items nobody points to anymore.

use crate::criteria::{Criteria, Direction, Operator, Search, UNBOUNDED};
use crate::error::MShopError;
use crate::item::{ListItem, ListRefs, Record, RefItem};
use crate::service::{Manager, ManagerFactory};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Deref;
use std::sync::Arc;

/// What [`ListManager::cleanup_orphans`] removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub list_ids: Vec<i64>,
    /// Deleted referenced items by domain.
    pub ref_ids: BTreeMap<String, Vec<i64>>,
}

pub struct ListManager<'a> {
    factory: &'a ManagerFactory,
    items: Arc<Manager<ListItem>>,
}

impl Deref for ListManager<'_> {
    type Target = Manager<ListItem>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<'a> ListManager<'a> {
    pub fn new(factory: &'a ManagerFactory, items: Arc<Manager<ListItem>>) -> Self {
        ListManager { factory, items }
    }

    /// Saves a list item. With `affects_list_order` the siblings (same parent
    /// and domain) are renumbered 0..n-1 with the item at its requested position.
    pub async fn save(&self, item: ListItem, affects_list_order: bool) -> Result<ListItem, MShopError> {
        if !affects_list_order {
            return self.items.save(item).await;
        }
        let parent_id = item.parent_id.ok_or_else(|| {
            MShopError::Validation(format!("{} is required", self.items.code("parentid")))
        })?;
        self.context()
            .db()
            .atomically(|| async move {
                let siblings: Vec<ListItem> = self
                    .siblings(parent_id, &item.domain)
                    .await?
                    .into_iter()
                    .filter(|s| item.common.id.map_or(true, |id| s.common.id != Some(id)))
                    .collect();
                let at = usize::try_from(item.position).unwrap_or(0).min(siblings.len());
                let mut item = item;
                item.position = at as i64;
                let saved = self.items.save(item).await?;
                for (idx, mut sibling) in siblings.into_iter().enumerate() {
                    let pos = (if idx < at { idx } else { idx + 1 }) as i64;
                    if sibling.position != pos {
                        sibling.position = pos;
                        self.items.save(sibling).await?;
                    }
                }
                Ok(saved)
            })
            .await
    }

    /// Saves `items` with positions 0..n-1 in the given order, without touching siblings.
    pub async fn rewrite(&self, items: Vec<ListItem>) -> Result<Vec<ListItem>, MShopError> {
        self.context()
            .db()
            .atomically(|| async move {
                let mut out = Vec::with_capacity(items.len());
                for (idx, mut item) in items.into_iter().enumerate() {
                    item.position = idx as i64;
                    out.push(self.items.save(item).await?);
                }
                Ok(out)
            })
            .await
    }

    /// List items of one parent and domain ordered by position.
    pub async fn siblings(&self, parent_id: i64, domain: &str) -> Result<Vec<ListItem>, MShopError> {
        let criteria = Criteria::and(vec![
            Criteria::compare(Operator::Equal, self.items.code("parentid"), parent_id),
            Criteria::compare(Operator::Equal, self.items.code("domain"), domain),
        ])?;
        let search = Search::new()
            .with_criteria(criteria)
            .sort(Direction::Asc, self.items.code("position"))
            .sort(Direction::Asc, self.items.code("id"))
            .slice(0, UNBOUNDED);
        Ok(self.items.search(&search).await?.0)
    }

    /// List items of the given parents (and domains, all when empty) ordered by
    /// parent and position, each with its referenced item attached when it exists.
    pub async fn for_parents(&self, parent_ids: &[i64], domains: &[&str]) -> Result<Vec<ListItem>, MShopError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conds = vec![Criteria::compare(
            Operator::OneOf,
            self.items.code("parentid"),
            parent_ids.to_vec(),
        )];
        if !domains.is_empty() {
            conds.push(Criteria::compare(
                Operator::OneOf,
                self.items.code("domain"),
                domains.to_vec(),
            ));
        }
        let search = Search::new()
            .with_criteria(Criteria::and(conds)?)
            .sort(Direction::Asc, self.items.code("parentid"))
            .sort(Direction::Asc, self.items.code("position"))
            .sort(Direction::Asc, self.items.code("id"))
            .slice(0, UNBOUNDED);
        let (mut items, _) = self.items.search(&search).await?;

        let mut wanted: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for li in &items {
            let ids = wanted.entry(li.domain.clone()).or_default();
            if !ids.contains(&li.ref_id) {
                ids.push(li.ref_id.clone());
            }
        }
        let mut refs: HashMap<(String, String), RefItem> = HashMap::new();
        for (domain, ids) in &wanted {
            for r in self.factory.domain(domain)?.search_refs(ids).await? {
                if let Some(id) = r.id() {
                    refs.insert((domain.clone(), id.to_string()), r);
                }
            }
        }
        for li in &mut items {
            li.ref_item = refs
                .get(&(li.domain.clone(), li.ref_id.clone()))
                .cloned()
                .map(Box::new);
        }
        Ok(items)
    }

    /// Number of list items (of all parents) pointing to each of `ref_ids` in `domain`.
    /// Ids nobody points to are absent from the result.
    pub async fn count_references(&self, domain: &str, ref_ids: &[String]) -> Result<BTreeMap<String, u64>, MShopError> {
        if ref_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let criteria = Criteria::and(vec![
            Criteria::compare(Operator::Equal, self.items.code("domain"), domain),
            Criteria::compare(Operator::OneOf, self.items.code("refid"), ref_ids.to_vec()),
        ])?;
        let search = Search::new().with_criteria(criteria).slice(0, UNBOUNDED);
        self.items.aggregate(&search, &self.items.code("refid")).await
    }

    /// Deletes the stored list items of `list_items` whose id is not in
    /// `keep_ids`, then the referenced items that only the deleted rows used.
    ///
    /// A referenced item goes only when exactly one list item pointed to it
    /// before the deletion; the counts are taken before any row is removed.
    pub async fn cleanup_orphans(
        &self,
        list_items: &[ListItem],
        keep_ids: &HashSet<i64>,
    ) -> Result<CleanupReport, MShopError> {
        let removed: Vec<&ListItem> = list_items
            .iter()
            .filter(|li| li.common.id.map_or(false, |id| !keep_ids.contains(&id)))
            .collect();
        if removed.is_empty() {
            return Ok(CleanupReport::default());
        }
        let mut by_domain: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for li in &removed {
            let ids = by_domain.entry(li.domain.clone()).or_default();
            if !ids.contains(&li.ref_id) {
                ids.push(li.ref_id.clone());
            }
        }
        let list_ids: Vec<i64> = removed.iter().filter_map(|li| li.common.id).collect();

        self.context()
            .db()
            .atomically(|| async move {
                let mut orphans: BTreeMap<String, Vec<i64>> = BTreeMap::new();
                for (domain, ids) in &by_domain {
                    let counts = self.count_references(domain, ids).await?;
                    let dead: Vec<i64> = ids
                        .iter()
                        .filter(|id| counts.get(id.as_str()) == Some(&1))
                        .filter_map(|id| id.parse().ok())
                        .collect();
                    if !dead.is_empty() {
                        orphans.insert(domain.clone(), dead);
                    }
                }

                self.items.delete(&list_ids).await?;
                for (domain, ids) in &orphans {
                    self.factory.domain(domain)?.delete(ids).await?;
                }
                tracing::debug!(lists = list_ids.len(), refs = ?orphans, "removed list items");
                Ok(CleanupReport {
                    list_ids,
                    ref_ids: orphans,
                })
            })
            .await
    }

    /// Stores the parent's attached list items: unsaved ref items are saved
    /// first, list items get the parent id and are saved in their current
    /// order, and previously stored list items no longer attached are removed
    /// together with orphaned ref items.
    pub async fn store_lists<P>(&self, parent: &mut P) -> Result<CleanupReport, MShopError>
    where
        P: Record + ListRefs,
    {
        let parent_id = parent
            .id()
            .ok_or_else(|| MShopError::Validation("parent item must be saved before its lists".into()))?;
        let attached = std::mem::take(parent.lists_mut());
        let pending = &attached;

        let result = self
            .context()
            .db()
            .atomically(|| async move {
                let stored = self.for_parents(&[parent_id], &[]).await?;
                let mut saved = Vec::with_capacity(pending.len());
                let mut per_domain: HashMap<String, i64> = HashMap::new();
                for mut li in pending.iter().cloned() {
                    if let Some(r) = li.ref_item.take() {
                        let r = self.factory.domain(r.domain())?.save_ref(*r).await?;
                        if let Some(id) = r.id() {
                            li.ref_id = id.to_string();
                        }
                        li.ref_item = Some(Box::new(r));
                    }
                    li.parent_id = Some(parent_id);
                    let next = per_domain.entry(li.domain.clone()).or_insert(0);
                    li.position = *next;
                    *next += 1;
                    saved.push(self.items.save(li).await?);
                }
                let keep: HashSet<i64> = saved.iter().filter_map(|li| li.common.id).collect();
                let report = self.cleanup_orphans(&stored, &keep).await?;
                Ok((saved, report))
            })
            .await;

        match result {
            Ok((saved, report)) => {
                *parent.lists_mut() = saved;
                Ok(report)
            }
            Err(err) => {
                *parent.lists_mut() = attached;
                Err(err)
            }
        }
    }
}
