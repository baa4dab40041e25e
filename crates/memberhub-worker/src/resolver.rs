//! Re-fetching entity references when a task runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use memberhub_core::error::AppError;
use memberhub_core::result::AppResult;
use memberhub_core::types::id::NodeId;
use memberhub_core::types::tenant::TenantContext;
use memberhub_database::NodeStore;
use memberhub_entity::task::{EntityRef, TaskArg, TaskArgs};

use crate::context::ResolvedArg;

/// Loads the current state of one kind of entity.
#[async_trait]
pub trait EntityResolver: Send + Sync + std::fmt::Debug {
    /// Type tag this resolver handles.
    fn kind(&self) -> &str;

    /// Fetch the entity. A missing entity is `NotFound`.
    async fn resolve(&self, tenant: Option<&TenantContext>, id: Uuid) -> AppResult<Value>;
}

/// Document nodes, resolved inside the task's tenant.
#[derive(Debug, Clone)]
pub struct NodeResolver {
    nodes: Arc<dyn NodeStore>,
}

impl NodeResolver {
    /// Type tag of node references.
    pub const KIND: &'static str = "documents.node";

    pub fn new(nodes: Arc<dyn NodeStore>) -> Self {
        Self { nodes }
    }

    /// Reference to a node, for passing it as a task argument.
    pub fn reference(id: NodeId) -> EntityRef {
        EntityRef::new(Self::KIND, id)
    }
}

#[async_trait]
impl EntityResolver for NodeResolver {
    fn kind(&self) -> &str {
        Self::KIND
    }

    async fn resolve(&self, tenant: Option<&TenantContext>, id: Uuid) -> AppResult<Value> {
        let tenant = tenant.ok_or_else(|| {
            AppError::validation("Document nodes can only be resolved inside a tenant")
        })?;
        let node = self
            .nodes
            .get(tenant, NodeId::from(id))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))?;
        Ok(serde_json::to_value(node)?)
    }
}

/// Resolvers by type tag.
#[derive(Debug, Default, Clone)]
pub struct ResolverSet {
    resolvers: HashMap<String, Arc<dyn EntityResolver>>,
}

impl ResolverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resolver, replacing any previous one for the same kind.
    pub fn with(mut self, resolver: Arc<dyn EntityResolver>) -> Self {
        self.resolvers.insert(resolver.kind().to_string(), resolver);
        self
    }

    /// Resolve every entity reference in a decoded argument list.
    pub async fn resolve_all(
        &self,
        tenant: Option<&TenantContext>,
        args: TaskArgs,
    ) -> AppResult<(Vec<ResolvedArg>, BTreeMap<String, ResolvedArg>)> {
        let mut positional = Vec::with_capacity(args.positional.len());
        for arg in args.positional {
            positional.push(self.resolve_one(tenant, arg).await?);
        }

        let mut keyword = BTreeMap::new();
        for (key, arg) in args.keyword {
            keyword.insert(key, self.resolve_one(tenant, arg).await?);
        }
        Ok((positional, keyword))
    }

    async fn resolve_one(&self, tenant: Option<&TenantContext>, arg: TaskArg) -> AppResult<ResolvedArg> {
        match arg {
            TaskArg::Value(value) => Ok(ResolvedArg::Value(value)),
            TaskArg::Entity(reference) => {
                let resolver = self.resolvers.get(&reference.kind).ok_or_else(|| {
                    AppError::validation(format!("No resolver for entity kind '{}'", reference.kind))
                })?;
                let current = resolver.resolve(tenant, reference.id).await?;
                Ok(ResolvedArg::Entity { reference, current })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memberhub_core::error::ErrorKind;
    use memberhub_core::types::id::TenantId;
    use memberhub_core::types::tenant::SchemaName;
    use memberhub_database::store::memory::MemoryNodeStore;
    use memberhub_entity::node::FileNode;
    use serde_json::json;

    fn tenant() -> TenantContext {
        TenantContext::new(TenantId::new(), SchemaName::parse("zuid").unwrap())
    }

    #[tokio::test]
    async fn test_resolves_current_state() {
        let nodes = Arc::new(MemoryNodeStore::new());
        let tenant = tenant();
        let mut node = FileNode::directory("Agenda", None);
        nodes.insert(&tenant, &node).await.unwrap();

        let args = TaskArgs::new()
            .entity(NodeResolver::reference(node.id))
            .kwarg("note", "keep")
            .unwrap();
        node.name = "Agenda 2025".into();
        nodes.save(&tenant, &node).await.unwrap();

        let set = ResolverSet::new().with(Arc::new(NodeResolver::new(nodes)));
        let (positional, keyword) = set.resolve_all(Some(&tenant), args).await.unwrap();
        assert_eq!(positional[0].value()["name"], json!("Agenda 2025"));
        assert_eq!(positional[0].reference().map(|r| r.kind.as_str()), Some(NodeResolver::KIND));
        assert_eq!(keyword["note"], ResolvedArg::Value(json!("keep")));
    }

    #[tokio::test]
    async fn test_missing_entity_and_unknown_kind() {
        let nodes = Arc::new(MemoryNodeStore::new());
        let set = ResolverSet::new().with(Arc::new(NodeResolver::new(nodes)));
        let tenant = tenant();

        let gone = TaskArgs::new().entity(NodeResolver::reference(NodeId::new()));
        let err = set.resolve_all(Some(&tenant), gone).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let unknown = TaskArgs::new().entity(EntityRef::new("billing.invoice", Uuid::new_v4()));
        let err = set.resolve_all(Some(&tenant), unknown).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
