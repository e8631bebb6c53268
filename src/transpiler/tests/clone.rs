use pretty_assertions::assert_eq;

use crate::ast::builders::*;
use crate::ast::Query;
use crate::config::QueryContext;
use crate::parser::parse_aml;
use crate::transpiler::{QueryCloner, ToSql};

#[test]
fn test_clone_query_is_deep() {
    let query = parse_aml(
        "<Item type='Part' action='get' select='name'>\
         <state>Released</state>\
         <Relationships><Item type='Part BOM' action='get'><quantity condition='gt'>1</quantity></Item></Relationships>\
         </Item>",
    )
    .unwrap();
    let mut copy = QueryCloner::clone_query(&query).unwrap();
    let ctx = QueryContext::default();
    assert_eq!(copy.table_count(), query.table_count());
    assert_eq!(copy.to_sql(&ctx).unwrap(), query.to_sql(&ctx).unwrap());

    let root = copy.root();
    copy[root].filter = None;
    assert!(query[query.root()].filter.is_some());
}

#[test]
fn test_clone_table_into_remaps_handles() {
    let mut source = Query::new("Part");
    let part = source.root();
    let bom = source.add_relationship(part, "Part BOM");
    source[bom].filter = Some(gt(prop(bom, "quantity"), int(1)));
    let child = source.add_relationship(bom, "Part BOM Substitute");
    source[child].filter = Some(eq(prop(child, "state"), text("Released")));

    let mut target = Query::new("Document");
    target.add_relationship(target.root(), "Document File");
    let mut cloner = QueryCloner::new();
    let copy = cloner.clone_table_into(&source, bom, &mut target).unwrap();

    assert_eq!(target.table_count(), 4);
    assert_eq!(target[copy].type_name.as_deref(), Some("Part BOM"));
    let filter = target[copy].filter.as_ref().unwrap();
    assert_eq!(filter.tables().into_iter().collect::<Vec<_>>(), vec![copy]);

    let nested = cloner.mapped(child).unwrap();
    assert_eq!(target[copy].joins[0].right, nested);
    assert_eq!(target.parent_join(nested).map(|j| j.left), Some(copy));
    assert_eq!(
        target[nested].filter.as_ref().unwrap().tables().into_iter().collect::<Vec<_>>(),
        vec![nested]
    );
}

#[test]
fn test_unknown_table_is_rejected() {
    let mut source = Query::new("Part");
    let stale = source.add_relationship(source.root(), "Part BOM");
    source.remove_table(stale);
    let mut target = Query::new("Part");
    assert!(
        QueryCloner::new()
            .clone_table_into(&source, stale, &mut target)
            .is_err()
    );
}
