use pretty_assertions::assert_eq;

use crate::ast::builders::*;
use crate::ast::{Function, JoinType, Query};
use crate::config::{QueryContext, Settings};
use crate::metadata::{DataType, PropertyDescriptor, Schema};
use crate::parser::parse_aml;
use crate::transpiler::{SqlRenderOptions, SqlRenderer, ToSql};

fn sql(xml: &str) -> String {
    parse_aml(xml)
        .unwrap()
        .to_sql(&QueryContext::default())
        .unwrap()
}

fn part_schema() -> Schema {
    Schema::new().with_item_type(
        "Part",
        vec![
            PropertyDescriptor::new("cost", DataType::Decimal),
            PropertyDescriptor::new("name", DataType::String),
            PropertyDescriptor::new("created_on", DataType::Date),
            PropertyDescriptor::item("created_by_id", "User"),
        ],
    )
}

#[test]
fn test_id_criteria() {
    assert_eq!(
        sql("<Item type='Part' action='get'><id>ABC</id></Item>"),
        "select p.* from Part p where p.id = 'ABC'"
    );
    assert_eq!(
        sql("<Item type='Part' action='get' id='0A1B'/>"),
        "select p.* from Part p where p.id = '0A1B'"
    );
}

#[test]
fn test_precedence() {
    let query = Query::new("Part");
    let p = query.root();
    let ctx = QueryContext::default();
    let renderer = SqlRenderer::new(&ctx, &query);
    let a = eq(prop(p, "state"), text("New"));
    let b = gt(prop(p, "cost"), int(10));
    let c = eq(prop(p, "name"), text("X"));

    assert_eq!(
        renderer
            .render_expr(&or(a.clone(), and(b.clone(), c.clone())))
            .unwrap(),
        "p.state = 'New' or p.cost > 10 and p.name = 'X'"
    );
    assert_eq!(
        renderer.render_expr(&and(or(a, b), c)).unwrap(),
        "(p.state = 'New' or p.cost > 10) and p.name = 'X'"
    );
}

#[test]
fn test_arithmetic_parentheses() {
    let query = Query::new("Part");
    let p = query.root();
    let ctx = QueryContext::default();
    let renderer = SqlRenderer::new(&ctx, &query);
    let expr = gt(
        arith(
            crate::ast::ArithmeticOp::Sub,
            prop(p, "cost"),
            arith(crate::ast::ArithmeticOp::Sub, prop(p, "discount"), int(1)),
        ),
        int(0),
    );
    assert_eq!(
        renderer.render_expr(&expr).unwrap(),
        "p.cost - (p.discount - 1) > 0"
    );
}

#[test]
fn test_equalities_collapse_to_in_list() {
    let query = Query::new("Part");
    let p = query.root();
    let ctx = QueryContext::default();
    let renderer = SqlRenderer::new(&ctx, &query);
    let expr = or(
        or(
            eq(prop(p, "state"), text("New")),
            eq(prop(p, "state"), text("Released")),
        ),
        eq(prop(p, "state"), text("Obsolete")),
    );
    assert_eq!(
        renderer.render_expr(&expr).unwrap(),
        "p.state in ('New', 'Released', 'Obsolete')"
    );

    let mixed = or(
        or(
            eq(prop(p, "state"), text("New")),
            gt(prop(p, "cost"), int(5)),
        ),
        eq(prop(p, "state"), text("Released")),
    );
    assert_eq!(
        renderer.render_expr(&mixed).unwrap(),
        "p.state in ('New', 'Released') or p.cost > 5"
    );

    let nested = or(
        eq(prop(p, "state"), text("New")),
        or(
            gt(prop(p, "cost"), int(5)),
            or(
                eq(prop(p, "state"), text("Released")),
                eq(prop(p, "state"), text("Obsolete")),
            ),
        ),
    );
    assert_eq!(
        renderer.render_expr(&nested).unwrap(),
        "p.state in ('New', 'Released', 'Obsolete') or p.cost > 5"
    );

    let under_and = and(
        gt(prop(p, "cost"), int(1)),
        or(
            or(
                eq(prop(p, "state"), text("New")),
                eq(prop(p, "state"), text("Released")),
            ),
            eq(prop(p, "state"), text("Obsolete")),
        ),
    );
    assert_eq!(
        renderer.render_expr(&under_and).unwrap(),
        "p.cost > 1 and p.state in ('New', 'Released', 'Obsolete')"
    );
}

#[test]
fn test_three_way_or_from_aml() {
    assert_eq!(
        sql("<Item type='Part' action='get'><or>\
             <state>New</state><state>Released</state><state>Obsolete</state>\
             </or></Item>"),
        "select p.* from Part p where p.state in ('New', 'Released', 'Obsolete')"
    );
}

#[test]
fn test_single_or_filter_is_not_parenthesized() {
    assert_eq!(
        sql("<Item type='Part' action='get'><or><state>New</state><cost condition='gt'>5</cost></or></Item>"),
        "select p.* from Part p where p.state = 'New' or p.cost > 5"
    );
    assert_eq!(
        sql("<Item type='Part' action='get' id='ABC'><or><state>New</state><cost condition='gt'>5</cost></or></Item>"),
        "select p.* from Part p where p.id = 'ABC' and (p.state = 'New' or p.cost > 5)"
    );
    let query = parse_aml("<Item type='Part' action='get'><or><state>New</state><cost condition='gt'>5</cost></or></Item>").unwrap();
    let ctx = QueryContext::default();
    assert_eq!(
        SqlRenderer::new(&ctx, &query).render_where().unwrap(),
        Some("p.state = 'New' or p.cost > 5".to_string())
    );
}

#[test]
fn test_joins_and_exists() {
    assert_eq!(
        sql("<Item type='Part' action='get'>\
             <created_by_id><Item type='User' action='get'><login_name>admin</login_name></Item></created_by_id>\
             <Relationships><Item type='Part BOM' action='get'><quantity condition='gt'>1</quantity></Item></Relationships>\
             </Item>"),
        "select p.* from Part p inner join [User] u on p.created_by_id = u.id \
         where u.login_name = 'admin' \
         and exists (select null from Part_BOM pb where pb.source_id = p.id and pb.quantity > 1)"
    );
}

#[test]
fn test_select_order_and_paging() {
    assert_eq!(
        sql("<Item type='Part' action='get' select='item_number,name' orderBy='name DESC' page='2' pagesize='10'/>"),
        "select p.item_number, p.name from Part p order by p.name desc offset 10 rows fetch next 10 rows only"
    );
    assert_eq!(
        sql("<Item type='Part' action='get' maxRecords='5'/>"),
        "select p.* from Part p order by p.id offset 0 rows fetch next 5 rows only"
    );
}

#[test]
fn test_render_options() {
    let query = parse_aml("<Item type='Part' action='get' orderBy='name'><state>New</state></Item>").unwrap();
    let ctx = QueryContext::default();
    let where_only = SqlRenderer::new(&ctx, &query)
        .with_options(SqlRenderOptions::WHERE)
        .render()
        .unwrap();
    assert_eq!(where_only, "where p.state = 'New'");

    let no_order = SqlRenderer::new(&ctx, &query)
        .with_options(SqlRenderOptions::SELECT | SqlRenderOptions::FROM)
        .render()
        .unwrap();
    assert_eq!(no_order, "select p.* from Part p");

    assert_eq!(
        SqlRenderer::new(&ctx, &query).render_where().unwrap(),
        Some("p.state = 'New'".to_string())
    );
}

#[test]
fn test_metadata_coercion() {
    let schema = part_schema();
    let ctx = QueryContext::new(&schema);
    let query = parse_aml(
        "<Item type='Part' action='get'>\
         <cost condition='gt'>10</cost>\
         <created_on condition='ge'>2024-01-05</created_on>\
         <name>10</name>\
         </Item>",
    )
    .unwrap();
    assert_eq!(
        query.to_sql(&ctx).unwrap(),
        "select p.* from Part p where p.cost > 10 and p.created_on >= '2024-01-05T00:00:00' and p.name = '10'"
    );
}

#[test]
fn test_joined_table_type_from_metadata() {
    let xml = "<Item type='Part' action='get' select='created_by_id(keyed_name)'/>";
    let schema = part_schema();
    let query = parse_aml(xml).unwrap();
    assert_eq!(
        query.to_sql(&QueryContext::new(&schema)).unwrap(),
        "select p.created_by_id, u.keyed_name from Part p left join [User] u on p.created_by_id = u.id"
    );

}

#[test]
fn test_joined_table_without_metadata_uses_property_name() {
    let query = parse_aml("<Item type='Part' action='get' select='id,created_by_id(keyed_name)'/>").unwrap();
    assert_eq!(
        query.to_sql(&QueryContext::default()).unwrap(),
        "select p.id, p.created_by_id, cbi.keyed_name from Part p \
         left join created_by_id cbi on p.created_by_id = cbi.id"
    );
}

#[test]
fn test_like_functions_escape_literal_text() {
    let query = Query::new("Part");
    let p = query.root();
    let ctx = QueryContext::default();
    let renderer = SqlRenderer::new(&ctx, &query);
    assert_eq!(
        renderer
            .render_expr(&call(Function::StartsWith, vec![prop(p, "name"), text("50%")]))
            .unwrap(),
        "p.name like '50[%]%'"
    );
    assert_eq!(
        renderer
            .render_expr(&call(Function::Contains, vec![prop(p, "name"), prop(p, "code")]))
            .unwrap(),
        "p.name like '%' + p.code + '%'"
    );
}

#[test]
fn test_substring_start_is_one_based() {
    let query = Query::new("Part");
    let p = query.root();
    let ctx = QueryContext::default();
    let renderer = SqlRenderer::new(&ctx, &query);
    let expr = eq(
        call(Function::Substring, vec![prop(p, "name"), int(0), int(3)]),
        text("ABC"),
    );
    assert_eq!(
        renderer.render_expr(&expr).unwrap(),
        "substring(p.name, 1, 3) = 'ABC'"
    );
}

#[test]
fn test_parameters() {
    let query = Query::new("Part");
    let p = query.root();
    let expr = eq(prop(p, "state"), param("state"));

    let ctx = QueryContext::default();
    assert_eq!(
        SqlRenderer::new(&ctx, &query).render_expr(&expr).unwrap(),
        "p.state = @state"
    );

    let ctx = QueryContext::default().with_settings(
        Settings::builder()
            .parameter("state", "Released")
            .build(),
    );
    assert_eq!(
        SqlRenderer::new(&ctx, &query).render_expr(&expr).unwrap(),
        "p.state = 'Released'"
    );
}

#[test]
fn test_boolean_positions_and_empty_lists() {
    let query = Query::new("Part");
    let p = query.root();
    let ctx = QueryContext::default();
    let renderer = SqlRenderer::new(&ctx, &query);
    assert_eq!(
        renderer.render_expr(&prop(p, "is_current")).unwrap(),
        "p.is_current = 1"
    );
    assert_eq!(
        renderer
            .render_expr(&in_list(prop(p, "state"), Vec::new()))
            .unwrap(),
        "1 = 0"
    );
    assert_eq!(
        renderer
            .render_expr(&not(is_null(prop(p, "name"))))
            .unwrap(),
        "not p.name is null"
    );
}

#[test]
fn test_aliases_are_unique() {
    let mut query = Query::new("Part");
    let root = query.root();
    let parent = query.join_property(root, "parent_id", JoinType::Inner);
    query[parent].type_name = Some("Part".to_string());
    let owner = query.join_property(root, "owned_by_id", JoinType::LeftOuter);
    let ctx = QueryContext::default();
    let renderer = SqlRenderer::new(&ctx, &query);
    assert_eq!(renderer.alias(root), "p");
    assert_eq!(renderer.alias(parent), "p2");
    assert_eq!(renderer.alias(owner), "obi");
}
