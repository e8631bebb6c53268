use pretty_assertions::assert_eq;

use crate::ast::builders::*;
use crate::ast::{ArithmeticOp, Query};
use crate::config::QueryContext;
use crate::error::QueryError;
use crate::parser::parse_aml;
use crate::pattern::{LikeShape, PatternList};
use crate::transpiler::ToAml;

fn aml(query: &Query) -> String {
    query.to_aml(&QueryContext::default()).unwrap()
}

#[test]
fn test_flat_criteria() {
    let mut query = Query::new("Part");
    let p = query.root();
    query[p].filter = Some(and(
        eq(prop(p, "state"), text("New")),
        gt(prop(p, "cost"), int(10)),
    ));
    assert_eq!(
        aml(&query),
        r#"<Item type="Part" action="get"><state>New</state><cost condition="gt">10</cost></Item>"#
    );
}

#[test]
fn test_logical_wrappers() {
    let mut query = Query::new("Part");
    let p = query.root();
    query[p].filter = Some(and(
        or(
            eq(prop(p, "state"), text("New")),
            eq(prop(p, "state"), text("Released")),
        ),
        not(eq(prop(p, "name"), text("X"))),
    ));
    assert_eq!(
        aml(&query),
        "<Item type=\"Part\" action=\"get\">\
         <or><state>New</state><state>Released</state></or>\
         <not><name>X</name></not>\
         </Item>"
    );
}

#[test]
fn test_conditions() {
    let mut query = Query::new("Part");
    let p = query.root();
    query[p].filter = Some(and(
        and(
            like(prop(p, "name"), PatternList::from_shape(LikeShape::StartsWith, "A")),
            in_list(prop(p, "cost"), vec![int(1), int(2)]),
        ),
        and(is_null(prop(p, "owned_by_id")), boolean(false)),
    ));
    assert_eq!(
        aml(&query),
        "<Item type=\"Part\" action=\"get\">\
         <name condition=\"like\">A%</name>\
         <cost condition=\"in\">1, 2</cost>\
         <owned_by_id condition=\"is null\"/>\
         <id condition=\"is null\"/>\
         </Item>"
    );
}

#[test]
fn test_nested_items_and_relationships() {
    let query = parse_aml(
        "<Item type='Part' action='get'>\
         <created_by_id><Item type='User' action='get'><login_name>admin</login_name></Item></created_by_id>\
         <Relationships><Item type='Part BOM' action='get'><quantity condition='gt'>1</quantity></Item></Relationships>\
         </Item>",
    )
    .unwrap();
    assert_eq!(
        aml(&query),
        "<Item type=\"Part\" action=\"get\">\
         <created_by_id><Item type=\"User\" action=\"get\"><login_name>admin</login_name></Item></created_by_id>\
         <Relationships><Item type=\"Part BOM\" action=\"get\"><quantity condition=\"gt\">1</quantity></Item></Relationships>\
         </Item>"
    );
}

#[test]
fn test_item_attributes() {
    let query = parse_aml(
        "<Item type='Part' action='get' select='item_number,created_by_id(keyed_name)' \
         orderBy='name DESC,id' page='3' pagesize='10'/>",
    )
    .unwrap();
    assert_eq!(
        aml(&query),
        "<Item type=\"Part\" action=\"get\" select=\"item_number,created_by_id(keyed_name)\" \
         orderBy=\"name DESC,id\" page=\"3\" pagesize=\"10\"/>"
    );

    let query = parse_aml("<Item type='Part' action='get' maxRecords='5'/>").unwrap();
    assert_eq!(aml(&query), r#"<Item type="Part" action="get" maxRecords="5"/>"#);
}

#[test]
fn test_unsupported_constructs() {
    let mut query = Query::new("Part");
    let p = query.root();
    query[p].offset = Some(5);
    query[p].fetch = Some(10);
    let err = query.to_aml(&QueryContext::default()).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));

    let mut query = Query::new("Part");
    let p = query.root();
    query[p].filter = Some(gt(
        arith(ArithmeticOp::Add, prop(p, "cost"), int(1)),
        int(5),
    ));
    let err = query.to_aml(&QueryContext::default()).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}

#[test]
fn test_rendered_aml_parses_back() {
    let xml = "<Item type='Part' action='get' orderBy='name'>\
               <state condition='ne'>Obsolete</state>\
               <created_by_id><Item type='User' action='get'><login_name condition='like'>ad*</login_name></Item></created_by_id>\
               </Item>";
    let ctx = QueryContext::default();
    let first = parse_aml(xml).unwrap();
    let second = parse_aml(&first.to_aml(&ctx).unwrap()).unwrap();
    assert_eq!(
        second[second.root()].filter.as_ref().map(|f| f.to_string()),
        first[first.root()].filter.as_ref().map(|f| f.to_string())
    );
}
