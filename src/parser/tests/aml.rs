use pretty_assertions::assert_eq;

use crate::ast::{Cardinality, Expr, Function, JoinType, SortDirection};
use crate::error::QueryError;
use crate::parser::aml::{parse_aml, select_names};

fn filter(xml: &str) -> String {
    let query = parse_aml(xml).unwrap();
    let root = query.root();
    query[root]
        .filter
        .as_ref()
        .map(|f| f.to_string())
        .unwrap_or_default()
}

#[test]
fn test_simple_criteria() {
    assert_eq!(
        filter("<Item type='Part' action='get'><id>ABC</id></Item>"),
        "t0.id = 'ABC'"
    );
    assert_eq!(
        filter(
            "<AML><Item type='Part' action='get'>\
             <cost condition='gt'>10</cost>\
             <name condition='like'>A*</name>\
             <state condition='in'>'New', 'Released'</state>\
             </Item></AML>"
        ),
        "t0.cost > '10' and t0.name like /^A/ and t0.state in ('New', 'Released')"
    );
}

#[test]
fn test_null_and_between_conditions() {
    assert_eq!(
        filter(
            "<Item type='Part' action='get'>\
             <a condition='is null'/>\
             <b condition='is not defined'/>\
             <c condition='not between'>1 and 5</c>\
             </Item>"
        ),
        "t0.a is null and t0.b is not defined and t0.c not between 1 and 5"
    );
}

#[test]
fn test_logical_elements() {
    assert_eq!(
        filter(
            "<Item type='Part' action='get'>\
             <or><state>New</state><and><state>Released</state><cost condition='lt'>5</cost></and></or>\
             <not><name>X</name></not>\
             </Item>"
        ),
        "(t0.state = 'New' or t0.state = 'Released' and t0.cost < '5') and not t0.name = 'X'"
    );
}

#[test]
fn test_now_value() {
    let query = parse_aml(
        "<Item type='Part' action='get'><created_on condition='lt'>__now()</created_on></Item>",
    )
    .unwrap();
    let Some(Expr::Comparison { right, .. }) = query[query.root()].filter.clone() else {
        panic!("expected a comparison");
    };
    assert_eq!(
        *right,
        Expr::Function {
            func: Function::CurrentDateTime,
            args: Vec::new(),
        }
    );
}

#[test]
fn test_nested_item_is_foreign_key_join() {
    let query = parse_aml(
        "<Item type='Part' action='get'>\
         <created_by_id><Item type='User' action='get'><login_name>admin</login_name></Item></created_by_id>\
         <or><owned_by_id><Item type='Identity'><name>World</name></Item></owned_by_id><state>New</state></or>\
         </Item>",
    )
    .unwrap();
    let root = query.root();
    let joins = &query[root].joins;
    assert_eq!(joins.len(), 2);
    assert_eq!(joins[0].left_property, "created_by_id");
    assert_eq!(joins[0].kind, JoinType::Inner);
    assert_eq!(joins[0].cardinality, Cardinality::OneToOne);
    assert_eq!(joins[1].kind, JoinType::LeftOuter);
    assert_eq!(query[joins[0].right].type_name.as_deref(), Some("User"));
    assert_eq!(
        query[root].filter.as_ref().unwrap().to_string(),
        "t1.login_name = 'admin' and (t2.name = 'World' or t0.state = 'New')"
    );
}

#[test]
fn test_relationships() {
    let query = parse_aml(
        "<Item type='Part' action='get'>\
         <Relationships><Item type='Part BOM' action='get'><quantity condition='gt'>1</quantity></Item></Relationships>\
         </Item>",
    )
    .unwrap();
    let root = query.root();
    let join = &query[root].joins[0];
    assert_eq!(join.cardinality, Cardinality::OneToMany);
    assert_eq!(join.left_property, "id");
    assert_eq!(join.right_property, "source_id");
    assert_eq!(query[join.right].type_name.as_deref(), Some("Part BOM"));
    assert_eq!(
        query[join.right].filter.as_ref().unwrap().to_string(),
        "t1.quantity > '1'"
    );
    assert!(query[root].filter.is_none());
}

#[test]
fn test_item_attributes() {
    let query = parse_aml(
        "<Item type='Part' action='get' select='id,created_by_id(keyed_name)' orderBy='name DESC, id' \
         page='3' pagesize='10' where=\"[Part].cost &gt; 5\" idlist='A,B' language='en'/>",
    )
    .unwrap();
    let root = query.root();
    let item = &query[root];
    assert_eq!(item.fetch, Some(10));
    assert_eq!(item.offset, Some(20));
    assert_eq!(item.id_list, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(item.select.len(), 2);
    assert_eq!(item.order_by.len(), 2);
    assert_eq!(item.order_by[0].direction, SortDirection::Descending);
    assert_eq!(item.filter.as_ref().unwrap().to_string(), "t0.cost > 5");
    let join = &item.joins[0];
    assert_eq!(join.kind, JoinType::LeftOuter);
    assert_eq!(query[join.right].select.len(), 1);
}

#[test]
fn test_max_records() {
    let query = parse_aml("<Item type='Part' action='get' maxRecords='25'/>").unwrap();
    assert_eq!(query[query.root()].fetch, Some(25));
    assert_eq!(query[query.root()].offset, None);
}

#[test]
fn test_select_grammar() {
    assert_eq!(
        select_names(" id, created_by_id(keyed_name, id),name "),
        vec!["id", "created_by_id", "created_by_id/keyed_name", "created_by_id/id", "name"]
    );
}

#[test]
fn test_unsupported_constructs() {
    for xml in [
        "<Item type='Part' action='add'/>",
        "<Item type='Part' action='get' levels='2'/>",
        "<Item type='Part' action='get' where=\"a = 1; delete\"/>",
        "<Item type='Part' action='get'><or><Relationships/></or></Item>",
        "<AML><Relationships/></AML>",
        "<Item type='Part' action='get'><a condition='around'>1</a></Item>",
        "<Item action='get'/>",
    ] {
        let err = parse_aml(xml).unwrap_err();
        assert!(matches!(err, QueryError::Unsupported(_)), "{xml}: {err:?}");
    }
}
