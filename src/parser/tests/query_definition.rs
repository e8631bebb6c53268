use pretty_assertions::assert_eq;

use crate::ast::{Cardinality, JoinType, ParameterDef, Query, SortDirection};
use crate::error::QueryError;
use crate::parser::query_definition::{ConditionParser, parse_query_definition};

const DEFINITION: &str = r#"<Item type="qry_QueryDefinition">
  <name>Parts with owners</name>
  <Relationships>
    <Item type="qry_QueryItem">
      <ref_id>ROOT</ref_id>
      <alias>Part</alias>
      <item_type keyed_name="Part">4F1AC04A2B484F3ABA4E20DB63808A88</item_type>
      <filter_xml>&lt;condition&gt;&lt;and&gt;&lt;eq&gt;&lt;property name="state"/&gt;&lt;constant&gt;Released&lt;/constant&gt;&lt;/eq&gt;&lt;not&gt;&lt;eq&gt;&lt;property name="name"/&gt;&lt;null/&gt;&lt;/eq&gt;&lt;/not&gt;&lt;/and&gt;&lt;/condition&gt;</filter_xml>
      <offset_fetch_xml>&lt;configuration&gt;&lt;option&gt;&lt;offset&gt;20&lt;/offset&gt;&lt;fetch&gt;10&lt;/fetch&gt;&lt;/option&gt;&lt;/configuration&gt;</offset_fetch_xml>
      <Relationships>
        <Item type="qry_QueryItemSelectProperty"><property_name>item_number</property_name></Item>
        <Item type="qry_QueryItemSelectProperty"><property_name>name</property_name></Item>
        <Item type="qry_QueryItemSortProperty"><property_name>name</property_name><sort_order>256</sort_order></Item>
        <Item type="qry_QueryItemSortProperty"><property_name>created_on</property_name><sort_order>128</sort_order><sort_order_direction>desc</sort_order_direction></Item>
      </Relationships>
    </Item>
    <Item type="qry_QueryItem">
      <ref_id>OWNER</ref_id>
      <alias>Owner</alias>
      <item_type keyed_name="Identity">DBA5D86402BF43D5976854B8B48FCDD1</item_type>
      <filter_xml>&lt;condition&gt;&lt;like&gt;&lt;property name="name"/&gt;&lt;constant&gt;A%&lt;/constant&gt;&lt;/like&gt;&lt;/condition&gt;</filter_xml>
    </Item>
    <Item type="qry_QueryItem">
      <ref_id>BOM</ref_id>
      <item_type keyed_name="Part BOM">5E9C5A12CC58413A8670CF4003C57848</item_type>
    </Item>
    <Item type="qry_QueryReference">
      <parent_ref_id>ROOT</parent_ref_id>
      <child_ref_id>OWNER</child_ref_id>
      <filter_xml>&lt;condition&gt;&lt;eq&gt;&lt;property name="owned_by_id" query_items_xpath="parent::Item"/&gt;&lt;property name="id"/&gt;&lt;/eq&gt;&lt;/condition&gt;</filter_xml>
    </Item>
    <Item type="qry_QueryReference">
      <parent_ref_id>ROOT</parent_ref_id>
      <child_ref_id>BOM</child_ref_id>
      <filter_xml>&lt;condition&gt;&lt;and&gt;&lt;eq&gt;&lt;property name="id" query_items_xpath="parent::Item"/&gt;&lt;property name="source_id"/&gt;&lt;/eq&gt;&lt;gt&gt;&lt;property name="quantity"/&gt;&lt;parameter name="min_qty"/&gt;&lt;/gt&gt;&lt;/and&gt;&lt;/condition&gt;</filter_xml>
    </Item>
    <Item type="qry_QueryParameter">
      <name>min_qty</name>
      <value>1</value>
    </Item>
  </Relationships>
</Item>"#;

#[test]
fn test_items_and_root() {
    let query = parse_query_definition(DEFINITION).unwrap();
    let root = query.root();
    assert_eq!(query.table_count(), 3);
    assert_eq!(query[root].type_name.as_deref(), Some("Part"));
    assert_eq!(query[root].alias.as_deref(), Some("Part"));
    assert_eq!(query[root].offset, Some(20));
    assert_eq!(query[root].fetch, Some(10));
    assert_eq!(
        query.parameters,
        vec![ParameterDef {
            name: "min_qty".to_string(),
            default: Some("1".to_string()),
        }]
    );
}

#[test]
fn test_filters_are_normalized() {
    let query = parse_query_definition(DEFINITION).unwrap();
    let root = query.root();
    assert_eq!(
        query[root].filter.as_ref().unwrap().to_string(),
        "t0.state = 'Released' and t0.name is not null"
    );
}

#[test]
fn test_select_and_sort_properties() {
    let query = parse_query_definition(DEFINITION).unwrap();
    let item = &query[query.root()];
    let select: Vec<String> = item.select.iter().map(|s| s.expr.to_string()).collect();
    assert_eq!(select, vec!["t0.item_number", "t0.name"]);
    let order: Vec<(String, SortDirection)> = item
        .order_by
        .iter()
        .map(|o| (o.expr.to_string(), o.direction))
        .collect();
    assert_eq!(
        order,
        vec![
            ("t0.created_on".to_string(), SortDirection::Descending),
            ("t0.name".to_string(), SortDirection::Ascending),
        ]
    );
}

#[test]
fn test_references_become_joins() {
    let query = parse_query_definition(DEFINITION).unwrap();
    let root = query.root();
    let joins = &query[root].joins;
    assert_eq!(joins.len(), 2);

    let owner = &joins[0];
    assert_eq!(owner.left_property, "owned_by_id");
    assert_eq!(owner.right_property, "id");
    assert_eq!(owner.cardinality, Cardinality::OneToOne);
    assert_eq!(owner.kind, JoinType::LeftOuter);
    assert_eq!(
        query[owner.right].filter.as_ref().unwrap().to_string(),
        "t1.name like /^A/"
    );

    let bom = &joins[1];
    assert_eq!(bom.left_property, "id");
    assert_eq!(bom.right_property, "source_id");
    assert_eq!(bom.cardinality, Cardinality::OneToMany);
    assert_eq!(
        query[bom.right].filter.as_ref().unwrap().to_string(),
        "t2.quantity > @min_qty"
    );
}

#[test]
fn test_root_must_be_unique() {
    let two_roots = r#"<Item type="qry_QueryDefinition"><Relationships>
        <Item type="qry_QueryItem"><ref_id>A</ref_id><item_type keyed_name="Part"/></Item>
        <Item type="qry_QueryItem"><ref_id>B</ref_id><item_type keyed_name="Document"/></Item>
    </Relationships></Item>"#;
    let err = parse_query_definition(two_roots).unwrap_err();
    assert!(matches!(err, QueryError::AmbiguousReference(_)));
}

#[test]
fn test_condition_parser() {
    let query = Query::new("Part");
    let parser = ConditionParser::new(query.root(), None);
    let expr = parser
        .parse_fragment(
            r#"<condition><or><between><property name="cost"/><constant>1</constant><constant>5</constant></between><in><property name="state"/><constant>New</constant><constant>Draft</constant></in></or></condition>"#,
        )
        .unwrap()
        .unwrap();
    assert_eq!(
        expr.to_string(),
        "t0.cost between '1' and '5' or t0.state in ('New', 'Draft')"
    );
    assert_eq!(parser.parse_fragment("<condition/>").unwrap(), None);
    let err = parser
        .parse_fragment(r#"<condition><eq><property name="a" query_items_xpath="parent::Item"/><constant>1</constant></eq></condition>"#)
        .unwrap_err();
    assert!(matches!(err, QueryError::AmbiguousReference(_)));
    let err = parser.parse_fragment("<condition><exists/></condition>").unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)));
}
