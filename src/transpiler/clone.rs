//! Deep copy of queries and table subtrees between arenas.

use std::collections::HashMap;

use crate::ast::{Expr, Join, OrderByExpression, PropertyRef, Query, QueryItem, SelectExpression, TableId};
use crate::error::{QueryError, QueryResult};

/// Copies tables from one query into another.
///
/// Handles are remapped through an identity map owned by the cloner, so
/// expressions that reference tables copied earlier by the same cloner
/// point at the copies. Handles not yet copied are kept as they are.
#[derive(Debug, Default)]
pub struct QueryCloner {
    map: HashMap<TableId, TableId>,
}

impl QueryCloner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep copy of a whole query into a fresh arena.
    pub fn clone_query(source: &Query) -> QueryResult<Query> {
        let mut cloner = Self::new();
        let root = source.root();
        let mut target = Query::with_root(QueryItem::default());
        cloner.map.insert(root, target.root());
        cloner.copy_subtree(source, root, &mut target)?;
        target.parameters = source.parameters.clone();
        Ok(target)
    }

    /// Copy `table` and everything joined below it into `target`, returning
    /// the handle of the copy. The copy is not joined to anything in
    /// `target`.
    pub fn clone_table_into(
        &mut self,
        source: &Query,
        table: TableId,
        target: &mut Query,
    ) -> QueryResult<TableId> {
        if source.get(table).is_none() {
            return Err(QueryError::ambiguous(format!("unknown table {}", table)));
        }
        let copy = target.add_table(QueryItem::default());
        self.map.insert(table, copy);
        self.copy_subtree(source, table, target)?;
        Ok(copy)
    }

    /// Handle of the copy of `table`, if it was copied.
    pub fn mapped(&self, table: TableId) -> Option<TableId> {
        self.map.get(&table).copied()
    }

    /// Remap every table handle in an expression.
    pub fn remap(&self, expr: &Expr) -> Expr {
        expr.clone().map_tables(&|t| self.mapped(t).unwrap_or(t))
    }

    fn remap_property(&self, property: &PropertyRef) -> PropertyRef {
        PropertyRef::new(self.mapped(property.table).unwrap_or(property.table), &property.name)
    }

    /// Allocate copies for every table below `table`, then fill in all
    /// contents once the map is complete.
    fn copy_subtree(&mut self, source: &Query, table: TableId, target: &mut Query) -> QueryResult<()> {
        let mut order = vec![table];
        let mut i = 0;
        while i < order.len() {
            for join in &source[order[i]].joins {
                let copy = target.add_table(QueryItem::default());
                self.map.insert(join.right, copy);
                order.push(join.right);
            }
            i += 1;
        }
        tracing::trace!("Cloning {} table(s) from {}", order.len(), table);

        for &original in &order {
            let item = &source[original];
            let copy = QueryItem {
                type_name: item.type_name.clone(),
                alias: item.alias.clone(),
                id: item.id.clone(),
                id_list: item.id_list.clone(),
                type_id: item.type_id.clone(),
                fetch: item.fetch,
                offset: item.offset,
                filter: item.filter.as_ref().map(|f| self.remap(f)),
                select: item
                    .select
                    .iter()
                    .map(|s| SelectExpression {
                        expr: self.remap(&s.expr),
                        alias: s.alias.clone(),
                    })
                    .collect(),
                order_by: item
                    .order_by
                    .iter()
                    .map(|o| OrderByExpression {
                        expr: self.remap(&o.expr),
                        direction: o.direction,
                    })
                    .collect(),
                joins: Vec::new(),
                type_provider: item.type_provider.as_ref().map(|p| self.remap_property(p)),
            };
            let id = self.mapped(original).unwrap_or(original);
            target[id] = copy;
        }

        for &original in &order {
            for join in &source[original].joins {
                target.add_join(Join {
                    left: self.mapped(join.left).unwrap_or(join.left),
                    right: self.mapped(join.right).unwrap_or(join.right),
                    ..join.clone()
                })?;
            }
        }
        Ok(())
    }
}
