use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use crate::ast::builders::*;
use crate::ast::{Function, Query};
use crate::config::{QueryContext, Settings};
use crate::error::QueryError;
use crate::parser::parse_aml;
use crate::pattern::{PatternList, WildcardSyntax};
use crate::transpiler::{to_odata_filter, to_odata_query};

fn filter(query: &Query) -> String {
    to_odata_filter(&QueryContext::default(), query)
        .unwrap()
        .unwrap_or_default()
}

#[test]
fn test_like_decomposes_to_string_functions() {
    let query = parse_aml(
        "<Item type='Part' action='get'><state>Released</state><name condition='like'>A*</name></Item>",
    )
    .unwrap();
    assert_eq!(filter(&query), "state eq 'Released' and startswith(name,'A')");
}

#[test]
fn test_paths_and_lambdas() {
    let query = parse_aml(
        "<Item type='Part' action='get'>\
         <created_by_id><Item type='User' action='get'><login_name>admin</login_name></Item></created_by_id>\
         <Relationships><Item type='Part BOM' action='get'><quantity condition='gt'>1</quantity></Item></Relationships>\
         </Item>",
    )
    .unwrap();
    assert_eq!(
        filter(&query),
        "created_by_id/login_name eq 'admin' and Part_BOM/any(r:r/quantity gt 1)"
    );
}

#[test]
fn test_query_options() {
    let query = parse_aml(
        "<Item type='Part' action='get' select='item_number,created_by_id(keyed_name)' \
         orderBy='name DESC' maxRecords='10'/>",
    )
    .unwrap();
    assert_eq!(
        to_odata_query(&QueryContext::default(), &query).unwrap(),
        "Part?$select=item_number,created_by_id&$orderby=name desc&$top=10\
         &$expand=created_by_id($select=keyed_name)"
    );
    assert_eq!(
        to_odata_query(&QueryContext::default(), &Query::new("Part")).unwrap(),
        "Part"
    );
}

#[test]
fn test_ranges_lists_and_time_zone() {
    let mut query = Query::new("Part");
    let p = query.root();
    let local = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    query[p].filter = Some(and(
        and(
            between(prop(p, "cost"), int(1), int(5)),
            in_list(prop(p, "state"), vec![text("New"), text("Released")]),
        ),
        ge(prop(p, "created_on"), datetime(local)),
    ));
    let ctx = QueryContext::default()
        .with_settings(Settings::builder().time_zone_offset_minutes(60).build());
    assert_eq!(
        to_odata_filter(&ctx, &query).unwrap().unwrap(),
        "(cost ge 1 and cost le 5) and (state eq 'New' or state eq 'Released') \
         and created_on ge 2024-03-01T09:00:00Z"
    );
}

#[test]
fn test_null_tests_and_negation() {
    let mut query = Query::new("Part");
    let p = query.root();
    query[p].filter = Some(and(
        is_null(prop(p, "owned_by_id")),
        not(eq(prop(p, "name"), text("X"))),
    ));
    assert_eq!(filter(&query), "owned_by_id eq null and not (name eq 'X')");
}

#[test]
fn test_unsupported_constructs() {
    let mut query = Query::new("Part");
    let p = query.root();
    let inner_wildcard = PatternList::parse_wildcard("A%B", &WildcardSyntax::SQL_SERVER).unwrap();
    query[p].filter = Some(like(prop(p, "name"), inner_wildcard));
    let err = to_odata_filter(&QueryContext::default(), &query).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));

    query[p].filter = Some(gt(
        call(Function::AddDays, vec![prop(p, "created_on"), int(1)]),
        call(Function::CurrentDateTime, Vec::new()),
    ));
    let err = to_odata_filter(&QueryContext::default(), &query).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}
