//! Component tree navigation
//!
//! Pages through the descendants of a base component, sorted and filtered,
//! resolving the referenced component of every copy on the page.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::permissions::{roles, UserSession, SYSTEM_ADMIN};
use crate::domain::{
    ComponentDto, ComponentTreeQuery, DbSession, Repository, ResourceTypeTree, SnapshotDto,
    TreeSortField,
};
use crate::{Result, StorageError};

pub const MAX_PAGE_SIZE: u32 = 500;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeStrategy {
    /// Direct children of the base component
    Children,
    /// Every descendant, base excluded
    All,
    /// Descendants that cannot have children
    Leaves,
}

impl TreeStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "children" => Some(TreeStrategy::Children),
            "all" => Some(TreeStrategy::All),
            "leaves" => Some(TreeStrategy::Leaves),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRequest {
    /// Base component uuid; exactly one of uuid and key must be set
    pub base_component_id: Option<String>,
    pub base_component_key: Option<String>,
    pub strategy: TreeStrategy,
    /// Name substring or exact key
    pub query: Option<String>,
    pub qualifiers: Option<Vec<String>>,
    pub sort: Vec<TreeSortField>,
    pub asc: bool,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
}

impl Default for TreeRequest {
    fn default() -> Self {
        Self {
            base_component_id: None,
            base_component_key: None,
            strategy: TreeStrategy::All,
            query: None,
            qualifiers: None,
            sort: vec![TreeSortField::Name],
            asc: true,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TreeRequest {
    pub fn for_key(key: impl Into<String>) -> Self {
        Self {
            base_component_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn for_uuid(uuid: impl Into<String>) -> Self {
        Self {
            base_component_id: Some(uuid.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_component_id.is_some() == self.base_component_key.is_some() {
            return Err(StorageError::validation(
                "Either 'baseComponentId' or 'baseComponentKey' must be provided, not both",
            ));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(StorageError::validation(format!(
                "The 'ps' parameter must be less than {}",
                MAX_PAGE_SIZE
            )));
        }
        if self.page_size == 0 {
            return Err(StorageError::validation("The 'ps' parameter must be at least 1"));
        }
        if self.page == 0 {
            return Err(StorageError::validation("The 'p' parameter must be at least 1"));
        }
        if self.sort.is_empty() {
            return Err(StorageError::validation("At least one sort field is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeComponent {
    /// Component uuid
    pub id: String,
    pub key: String,
    pub name: String,
    pub qualifier: String,
    pub path: Option<String>,
    pub description: Option<String>,
    /// Uuid of the referenced component, for copies
    pub ref_id: Option<String>,
    pub ref_key: Option<String>,
}

impl TreeComponent {
    fn from_dto(dto: &ComponentDto, references: &HashMap<i64, ComponentDto>) -> Self {
        let reference = dto.copy_component_id.and_then(|id| references.get(&id));
        Self {
            id: dto.uuid.clone(),
            key: dto.key.clone(),
            name: dto.name.clone(),
            qualifier: dto.qualifier.clone(),
            path: dto.path.clone(),
            description: dto.description.clone(),
            ref_id: reference.map(|r| r.uuid.clone()),
            ref_key: reference.map(|r| r.key.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paging {
    pub page_index: u32,
    pub page_size: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeResponse {
    pub paging: Paging,
    pub base_component: TreeComponent,
    pub components: Vec<TreeComponent>,
}

pub struct ComponentTreeService {
    repository: Arc<dyn Repository>,
    resource_types: ResourceTypeTree,
}

impl ComponentTreeService {
    pub fn new(repository: Arc<dyn Repository>, resource_types: ResourceTypeTree) -> Self {
        Self {
            repository,
            resource_types,
        }
    }

    /// One page of the tree below the requested base component
    ///
    /// The request is validated before the repository is touched. A base
    /// component that was never analysed yields an empty page.
    pub fn tree(&self, user: &dyn UserSession, request: &TreeRequest) -> Result<TreeResponse> {
        request.validate()?;

        let mut session = self.repository.open_session()?;
        let base = find_base_component(session.as_mut(), request)?;
        check_permissions(user, &base)?;

        let Some(base_snapshot) = session.select_last_snapshot_by_component_id(base.id)? else {
            debug!(component = %base.key, "no snapshot for base component");
            return Ok(empty_response(&base, request));
        };

        let query = self.to_query(request, base_snapshot);
        let (components, total) = match request.strategy {
            TreeStrategy::Children => (
                session.select_direct_children(&query)?,
                session.count_direct_children(&query)?,
            ),
            TreeStrategy::All | TreeStrategy::Leaves => (
                session.select_all_children(&query)?,
                session.count_all_children(&query)?,
            ),
        };

        let reference_ids: Vec<i64> = components
            .iter()
            .filter_map(|c| c.component.copy_component_id)
            .collect();
        let references: HashMap<i64, ComponentDto> = if reference_ids.is_empty() {
            HashMap::new()
        } else {
            session
                .select_by_ids(&reference_ids)?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        Ok(TreeResponse {
            paging: Paging {
                page_index: query.page,
                page_size: query.page_size,
                total,
            },
            base_component: TreeComponent::from_dto(&base, &references),
            components: components
                .iter()
                .map(|c| TreeComponent::from_dto(&c.component, &references))
                .collect(),
        })
    }

    fn to_query(&self, request: &TreeRequest, base_snapshot: SnapshotDto) -> ComponentTreeQuery {
        let qualifiers = self.children_qualifiers(request, &base_snapshot.qualifier);
        ComponentTreeQuery {
            base_snapshot,
            name_or_key_query: request.query.clone().filter(|q| !q.is_empty()),
            qualifiers,
            sort_fields: request.sort.clone(),
            asc: request.asc,
            page: request.page,
            page_size: request.page_size,
        }
    }

    /// Requested qualifiers, intersected with the leaf qualifiers below the
    /// base for the `leaves` strategy
    fn children_qualifiers(&self, request: &TreeRequest, base_qualifier: &str) -> Option<Vec<String>> {
        let leaves = (request.strategy == TreeStrategy::Leaves)
            .then(|| self.resource_types.leaves_qualifiers(base_qualifier));

        match (leaves, &request.qualifiers) {
            (None, requested) => requested.clone(),
            (Some(leaves), None) => Some(leaves),
            (Some(mut leaves), Some(requested)) => {
                leaves.retain(|q| requested.contains(q));
                Some(leaves)
            }
        }
    }
}

fn find_base_component(session: &mut dyn DbSession, request: &TreeRequest) -> Result<ComponentDto> {
    match (&request.base_component_id, &request.base_component_key) {
        (Some(uuid), _) => session
            .select_component_by_uuid(uuid)?
            .ok_or_else(|| StorageError::component_not_found(format!("id '{}'", uuid))),
        (None, Some(key)) => session
            .select_component_by_key(key)?
            .ok_or_else(|| StorageError::component_not_found(format!("key '{}'", key))),
        (None, None) => Err(StorageError::validation(
            "Either 'baseComponentId' or 'baseComponentKey' must be provided",
        )),
    }
}

fn check_permissions(user: &dyn UserSession, base: &ComponentDto) -> Result<()> {
    let project_uuid = base.project_uuid();
    if user.has_permission(SYSTEM_ADMIN)
        || user.has_component_uuid_permission(roles::ADMIN, project_uuid)
        || user.has_component_uuid_permission(roles::USER, project_uuid)
    {
        Ok(())
    } else {
        Err(StorageError::insufficient_privileges())
    }
}

fn empty_response(base: &ComponentDto, request: &TreeRequest) -> TreeResponse {
    TreeResponse {
        paging: Paging {
            page_index: request.page,
            page_size: request.page_size,
            total: 0,
        },
        base_component: TreeComponent::from_dto(base, &HashMap::new()),
        components: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::qualifiers::*;

    fn service() -> ComponentTreeService {
        struct Unreachable;
        impl Repository for Unreachable {
            fn open_session(&self) -> Result<Box<dyn DbSession + '_>> {
                Err(StorageError::database("repository must not be reached"))
            }
        }
        ComponentTreeService::new(Arc::new(Unreachable), ResourceTypeTree::default())
    }

    #[test]
    fn test_both_uuid_and_key_rejected() {
        let request = TreeRequest {
            base_component_id: Some("uuid".to_string()),
            ..TreeRequest::for_key("foo")
        };
        assert!(request.validate().unwrap_err().is_validation());
        assert!(TreeRequest::default().validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_page_bounds() {
        let mut request = TreeRequest::for_key("foo");
        request.page_size = MAX_PAGE_SIZE;
        assert!(request.validate().is_ok());
        request.page_size = MAX_PAGE_SIZE + 1;
        assert!(request.validate().is_err());
        request.page_size = 10;
        request.page = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_leaves_intersect_requested_qualifiers() {
        let request = TreeRequest {
            strategy: TreeStrategy::Leaves,
            qualifiers: Some(vec![DIRECTORY.to_string(), UNIT_TEST_FILE.to_string()]),
            ..TreeRequest::for_key("foo")
        };
        assert_eq!(
            service().children_qualifiers(&request, PROJECT),
            Some(vec![UNIT_TEST_FILE.to_string()])
        );
    }

    #[test]
    fn test_leaves_without_requested_qualifiers() {
        let request = TreeRequest {
            strategy: TreeStrategy::Leaves,
            ..TreeRequest::for_key("foo")
        };
        assert_eq!(
            service().children_qualifiers(&request, DIRECTORY),
            Some(vec![FILE.to_string(), UNIT_TEST_FILE.to_string()])
        );
    }

    #[test]
    fn test_other_strategies_keep_requested_qualifiers() {
        let request = TreeRequest {
            strategy: TreeStrategy::Children,
            qualifiers: Some(vec![DIRECTORY.to_string()]),
            ..TreeRequest::for_key("foo")
        };
        assert_eq!(
            service().children_qualifiers(&request, PROJECT),
            Some(vec![DIRECTORY.to_string()])
        );
        assert_eq!(
            service().children_qualifiers(&TreeRequest::for_key("foo"), PROJECT),
            None
        );
    }
}
