//! Filtered queries over nodes, groups, and apps.
//!
//! Filters compose conjunctively and are always applied in the order
//! `groupId`, `imageName`, `appId`, `nodeId`. A filter naming an id that
//! does not exist simply matches nothing.

use std::collections::HashSet;

use pharos_state::*;

use crate::error::{InventoryError, InventoryResult};
use crate::inventory::Inventory;

/// Search criteria parsed from a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub group_id: Option<GroupId>,
    pub image_name: Option<String>,
    pub app_id: Option<AppId>,
    pub node_id: Option<NodeId>,
}

impl SearchFilter {
    /// Accepted query keys.
    pub const KEYS: [&'static str; 4] = ["groupId", "imageName", "appId", "nodeId"];

    /// Build a filter from query pairs; unknown keys are rejected.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> InventoryResult<Self> {
        let mut filter = Self::default();
        for (key, value) in pairs {
            let slot = match key {
                "groupId" => &mut filter.group_id,
                "imageName" => &mut filter.image_name,
                "appId" => &mut filter.app_id,
                "nodeId" => &mut filter.node_id,
                other => return Err(InventoryError::UnsupportedFilter(other.to_string())),
            };
            *slot = Some(value.to_string());
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Inventory {
    pub fn search_groups(&self, filter: &SearchFilter) -> InventoryResult<Vec<Group>> {
        let mut groups = match &filter.group_id {
            Some(id) => self.lookup::<Group>(id)?.into_iter().collect(),
            None => self.state.list::<Group>()?,
        };

        if let Some(image) = &filter.image_name {
            let nodes = self.nodes_with_image(image)?;
            groups.retain(|g| g.members.iter().any(|m| nodes.contains(m)));
        }
        if let Some(app_id) = &filter.app_id {
            let nodes = self.node_ids_running(app_id)?;
            groups.retain(|g| g.members.iter().any(|m| nodes.contains(m)));
        }
        if let Some(node_id) = &filter.node_id {
            groups.retain(|g| g.members.contains(node_id));
        }
        Ok(groups)
    }

    pub fn search_nodes(&self, filter: &SearchFilter) -> InventoryResult<Vec<Node>> {
        let mut nodes = match &filter.group_id {
            Some(id) => match self.lookup::<Group>(id)? {
                Some(group) => self.members(&group)?,
                None => Vec::new(),
            },
            None => self.state.list::<Node>()?,
        };

        if let Some(image) = &filter.image_name {
            let apps: HashSet<AppId> = self
                .apps_by_image(image)?
                .into_iter()
                .map(|app| app.id)
                .collect();
            nodes.retain(|n| n.apps.iter().any(|a| apps.contains(a)));
        }
        if let Some(app_id) = &filter.app_id {
            nodes.retain(|n| n.apps.contains(app_id));
        }
        if let Some(node_id) = &filter.node_id {
            nodes.retain(|n| &n.id == node_id);
        }
        Ok(nodes)
    }

    pub fn search_apps(&self, filter: &SearchFilter) -> InventoryResult<Vec<App>> {
        let mut apps = match &filter.group_id {
            Some(id) => match self.lookup::<Group>(id)? {
                Some(group) => self.apps_on(&self.members(&group)?)?,
                None => Vec::new(),
            },
            None => self.state.list::<App>()?,
        };

        if let Some(image) = &filter.image_name {
            apps.retain(|a| a.images.contains(image));
        }
        if let Some(app_id) = &filter.app_id {
            apps.retain(|a| &a.id == app_id);
        }
        if let Some(node_id) = &filter.node_id {
            let deployed: HashSet<AppId> = self
                .lookup::<Node>(node_id)?
                .map(|n| n.apps.into_iter().collect())
                .unwrap_or_default();
            apps.retain(|a| deployed.contains(&a.id));
        }
        Ok(apps)
    }

    /// Fetch a document, treating a missing or malformed id as absent.
    fn lookup<D: Document>(&self, id: &str) -> InventoryResult<Option<D>> {
        match self.state.get::<D>(id) {
            Ok(doc) => Ok(Some(doc)),
            Err(StateError::NotFound { .. } | StateError::InvalidId(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn node_ids_running(&self, app_id: &str) -> InventoryResult<HashSet<NodeId>> {
        Ok(self
            .nodes_running(app_id)?
            .into_iter()
            .map(|n| n.id)
            .collect())
    }

    fn nodes_with_image(&self, image: &str) -> InventoryResult<HashSet<NodeId>> {
        let mut nodes = HashSet::new();
        for app in self.apps_by_image(image)? {
            nodes.extend(self.node_ids_running(&app.id)?);
        }
        Ok(nodes)
    }

    /// Distinct apps deployed on any of `nodes`, in first-seen order.
    fn apps_on(&self, nodes: &[Node]) -> InventoryResult<Vec<App>> {
        let mut seen = HashSet::new();
        let mut apps = Vec::new();
        for app_id in nodes.iter().flat_map(|n| &n.apps) {
            if seen.insert(app_id.as_str()) {
                if let Some(app) = self.lookup::<App>(app_id)? {
                    apps.push(app);
                }
            }
        }
        Ok(apps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::fixtures::{Harness, harness};

    fn app(h: &Harness, id: &str, image: &str, nodes: &[&Node]) -> App {
        let app = h
            .state()
            .insert(App {
                id: id.to_string(),
                images: vec![image.to_string()],
                services: vec!["web".to_string()],
                refcnt: nodes.len() as u64,
            })
            .unwrap();
        for node in nodes {
            h.state()
                .update::<Node>(&node.id, &[Patch::add_to_set("apps", id)])
                .unwrap();
        }
        app
    }

    fn filter(pairs: &[(&str, &str)]) -> SearchFilter {
        SearchFilter::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = SearchFilter::from_pairs([("color", "red")]).unwrap_err();
        assert!(matches!(err, InventoryError::UnsupportedFilter(k) if k == "color"));
        assert!(filter(&[]).is_empty());
    }

    #[test]
    fn groups_by_group_and_app() {
        let h = harness();
        let n1 = h.add_node("10.0.0.1");
        let g1 = h.add_group("g1", &[&n1]);
        let a1 = app(&h, "aaaaaaaaaaaaaaaaaaaaaaaa", "host/one", &[&n1]);

        let found = h
            .inventory
            .search_groups(&filter(&[("groupId", g1.id.as_str()), ("appId", a1.id.as_str())]))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, g1.id);

        let found = h
            .inventory
            .search_groups(&filter(&[("groupId", g1.id.as_str()), ("appId", "bbbbbbbbbbbbbbbbbbbbbbbb")]))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn groups_by_image_and_node() {
        let h = harness();
        let n1 = h.add_node("10.0.0.1");
        let n2 = h.add_node("10.0.0.2");
        let g1 = h.add_group("g1", &[&n1]);
        let g2 = h.add_group("g2", &[&n2]);
        app(&h, "aaaaaaaaaaaaaaaaaaaaaaaa", "host/one", &[&n2]);

        let by_image = h
            .inventory
            .search_groups(&filter(&[("imageName", "host/one")]))
            .unwrap();
        assert_eq!(by_image, vec![g2.clone()]);

        let by_node = h
            .inventory
            .search_groups(&filter(&[("nodeId", n1.id.as_str())]))
            .unwrap();
        assert_eq!(by_node, vec![g1]);

        assert_eq!(h.inventory.search_groups(&filter(&[])).unwrap().len(), 2);
    }

    #[test]
    fn missing_group_matches_nothing() {
        let h = harness();
        h.add_group("g1", &[]);
        for id in ["0123456789abcdef01234567", "not-an-id"] {
            assert!(h.inventory.search_groups(&filter(&[("groupId", id)])).unwrap().is_empty());
            assert!(h.inventory.search_nodes(&filter(&[("groupId", id)])).unwrap().is_empty());
        }
    }

    #[test]
    fn nodes_by_group_and_image() {
        let h = harness();
        let n1 = h.add_node("10.0.0.1");
        let n2 = h.add_node("10.0.0.2");
        let n3 = h.add_node("10.0.0.3");
        let group = h.add_group("g", &[&n1, &n2]);
        app(&h, "aaaaaaaaaaaaaaaaaaaaaaaa", "host/one", &[&n2, &n3]);

        let found = h
            .inventory
            .search_nodes(&filter(&[("groupId", group.id.as_str()), ("imageName", "host/one")]))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, n2.id);
    }

    #[test]
    fn apps_by_group_and_node() {
        let h = harness();
        let n1 = h.add_node("10.0.0.1");
        let n2 = h.add_node("10.0.0.2");
        let group = h.add_group("g", &[&n1, &n2]);
        let a1 = app(&h, "aaaaaaaaaaaaaaaaaaaaaaaa", "host/one", &[&n1, &n2]);
        let a2 = app(&h, "bbbbbbbbbbbbbbbbbbbbbbbb", "host/two", &[&n2]);
        app(&h, "cccccccccccccccccccccccc", "host/three", &[]);

        let in_group = h
            .inventory
            .search_apps(&filter(&[("groupId", group.id.as_str())]))
            .unwrap();
        let ids: Vec<&str> = in_group.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec![a1.id.as_str(), a2.id.as_str()]);

        let on_n1 = h
            .inventory
            .search_apps(&filter(&[("nodeId", n1.id.as_str())]))
            .unwrap();
        assert_eq!(on_n1.len(), 1);
        assert_eq!(on_n1[0].id, a1.id);

        assert_eq!(h.inventory.search_apps(&filter(&[])).unwrap().len(), 3);
    }
}
