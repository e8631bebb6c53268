//! Queried tables and the join graph between them.

use std::ops::{Index, IndexMut};

use super::{Arena, Cardinality, Expr, JoinType, PropertyRef, SortDirection, TableId};
use crate::error::{QueryError, QueryResult};

/// An entry of a table's select list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpression {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpression {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpression {
    pub expr: Expr,
    pub direction: SortDirection,
}

/// Equality join between a property of each side.
///
/// Stored on its left table.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: TableId,
    pub right: TableId,
    pub kind: JoinType,
    pub cardinality: Cardinality,
    pub left_property: String,
    pub right_property: String,
}

impl Join {
    /// `left.left_property = right.right_property`
    pub fn condition(&self) -> Expr {
        super::builders::eq(
            super::builders::prop(self.left, &self.left_property),
            super::builders::prop(self.right, &self.right_property),
        )
    }

    pub fn is_foreign_key(&self) -> bool {
        self.cardinality == Cardinality::OneToOne
    }
}

/// A queried table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryItem {
    /// Item type name; `None` for tables produced by a property whose
    /// related type comes from metadata.
    pub type_name: Option<String>,
    pub alias: Option<String>,
    pub id: Option<String>,
    pub id_list: Vec<String>,
    pub type_id: Option<String>,
    pub fetch: Option<u64>,
    pub offset: Option<u64>,
    pub filter: Option<Expr>,
    pub select: Vec<SelectExpression>,
    pub order_by: Vec<OrderByExpression>,
    pub joins: Vec<Join>,
    /// Property that implicitly produced this table.
    pub type_provider: Option<PropertyRef>,
}

impl QueryItem {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    /// AND a criterion into the filter.
    pub fn add_filter(&mut self, criterion: Expr) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(criterion),
            None => criterion,
        });
    }
}

/// A declared query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDef {
    pub name: String,
    pub default: Option<String>,
}

/// A query: tables in an arena, one of them the root.
#[derive(Debug, Clone)]
pub struct Query {
    tables: Arena<QueryItem>,
    root: TableId,
    pub parameters: Vec<ParameterDef>,
}

impl Query {
    /// Query whose root table has the given item type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self::with_root(QueryItem::new(type_name))
    }

    pub fn with_root(item: QueryItem) -> Self {
        let mut tables = Arena::new();
        let root = tables.insert(item);
        Self {
            tables,
            root,
            parameters: Vec::new(),
        }
    }

    pub fn root(&self) -> TableId {
        self.root
    }

    pub fn set_root(&mut self, id: TableId) -> QueryResult<()> {
        if !self.tables.contains(id) {
            return Err(QueryError::ambiguous(format!("unknown table {}", id)));
        }
        self.root = id;
        Ok(())
    }

    pub fn add_table(&mut self, item: QueryItem) -> TableId {
        self.tables.insert(item)
    }

    /// Remove a table together with every join pointing at it.
    pub fn remove_table(&mut self, id: TableId) -> Option<QueryItem> {
        let item = self.tables.remove(id)?;
        for other in self.tables.ids() {
            if let Some(t) = self.tables.get_mut(other) {
                t.joins.retain(|j| j.right != id);
            }
        }
        Some(item)
    }

    pub fn get(&self, id: TableId) -> Option<&QueryItem> {
        self.tables.get(id)
    }

    pub fn get_mut(&mut self, id: TableId) -> Option<&mut QueryItem> {
        self.tables.get_mut(id)
    }

    pub fn contains(&self, id: TableId) -> bool {
        self.tables.contains(id)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// All tables in slot order.
    pub fn tables(&self) -> impl Iterator<Item = (TableId, &QueryItem)> {
        self.tables.iter()
    }

    /// The join through which `id` was reached, if any.
    pub fn parent_join(&self, id: TableId) -> Option<&Join> {
        self.tables
            .iter()
            .flat_map(|(_, t)| t.joins.iter())
            .find(|j| j.right == id)
    }

    /// Whether `ancestor` is `id` or lies on its path to the root.
    pub fn is_ancestor(&self, ancestor: TableId, id: TableId) -> bool {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(t) = current {
            if t == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.tables.len() {
                return false;
            }
            current = self.parent_join(t).map(|j| j.left);
        }
        false
    }

    /// Add a join. Both tables must exist, the right table must not already
    /// be joined, and the join must not close a cycle.
    pub fn add_join(&mut self, join: Join) -> QueryResult<()> {
        if !self.contains(join.left) || !self.contains(join.right) {
            return Err(QueryError::ambiguous("join refers to an unknown table"));
        }
        if self.is_ancestor(join.right, join.left) {
            return Err(QueryError::unsupported(format!(
                "join from {} to {} would form a cycle",
                join.left, join.right
            )));
        }
        if self.parent_join(join.right).is_some() {
            return Err(QueryError::ambiguous(format!(
                "table {} is already joined",
                join.right
            )));
        }
        tracing::trace!(
            "Join {}.{} -> {}.{}",
            join.left,
            join.left_property,
            join.right,
            join.right_property
        );
        self[join.left].joins.push(join);
        Ok(())
    }

    /// Table reached from `table` through foreign key `property`, created on
    /// first use and cached per (table, property).
    ///
    /// A left outer request downgrades a cached inner join.
    pub fn join_property(&mut self, table: TableId, property: &str, kind: JoinType) -> TableId {
        if let Some(existing) = self.get_mut(table).and_then(|t| {
            t.joins
                .iter_mut()
                .find(|j| j.left_property == property && j.right_property == "id")
        }) {
            if kind == JoinType::LeftOuter {
                existing.kind = JoinType::LeftOuter;
            }
            return existing.right;
        }
        let right = self.add_table(QueryItem {
            type_provider: Some(PropertyRef::new(table, property)),
            ..QueryItem::default()
        });
        tracing::debug!("Created join table {} for property '{}'", right, property);
        if let Some(t) = self.get_mut(table) {
            t.joins.push(Join {
                left: table,
                right,
                kind,
                cardinality: Cardinality::OneToOne,
                left_property: property.to_string(),
                right_property: "id".to_string(),
            });
        }
        right
    }

    /// Add a relationship table of `type_name` below `source`
    /// (`source.id = relationship.source_id`). Never cached.
    pub fn add_relationship(&mut self, source: TableId, type_name: impl Into<String>) -> TableId {
        let right = self.add_table(QueryItem::new(type_name));
        if let Some(t) = self.get_mut(source) {
            t.joins.push(Join {
                left: source,
                right,
                kind: JoinType::Inner,
                cardinality: Cardinality::OneToMany,
                left_property: "id".to_string(),
                right_property: "source_id".to_string(),
            });
        }
        right
    }

    /// Resolve a `/`-separated property path; every segment but the last
    /// follows a foreign key.
    pub fn property_path(&mut self, table: TableId, path: &str, kind: JoinType) -> PropertyRef {
        let mut segments: Vec<&str> = path.split('/').collect();
        let name = segments.pop().unwrap_or_default();
        let mut current = table;
        for segment in segments {
            current = self.join_property(current, segment, kind);
        }
        PropertyRef::new(current, name)
    }

    /// Tables reachable from the root, depth first, parents before children.
    pub fn walk(&self) -> Vec<TableId> {
        let mut out = Vec::new();
        self.walk_from(self.root, &mut out);
        out
    }

    fn walk_from(&self, id: TableId, out: &mut Vec<TableId>) {
        if out.contains(&id) {
            return;
        }
        out.push(id);
        if let Some(t) = self.get(id) {
            for join in &t.joins {
                self.walk_from(join.right, out);
            }
        }
    }

    /// First table below `ancestor` on the path to `id`.
    pub fn child_towards(&self, ancestor: TableId, id: TableId) -> Option<&Join> {
        let mut current = id;
        loop {
            let join = self.parent_join(current)?;
            if join.left == ancestor {
                return Some(join);
            }
            current = join.left;
        }
    }
}

/// # Panics
///
/// Panics when `id` does not name a live table of this query. Use
/// [`Query::get`] for handles that may have been removed.
impl Index<TableId> for Query {
    type Output = QueryItem;

    fn index(&self, id: TableId) -> &QueryItem {
        match self.tables.get(id) {
            Some(t) => t,
            None => panic!("stale table handle {}", id),
        }
    }
}

/// # Panics
///
/// Panics when `id` does not name a live table of this query. Use
/// [`Query::get_mut`] for handles that may have been removed.
impl IndexMut<TableId> for Query {
    fn index_mut(&mut self, id: TableId) -> &mut QueryItem {
        match self.tables.get_mut(id) {
            Some(t) => t,
            None => panic!("stale table handle {}", id),
        }
    }
}
