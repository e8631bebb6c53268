use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_writer_empty_and_text_elements() {
    let mut writer = XmlTextWriter::new();
    writer.start("Item").unwrap();
    writer.attribute("type", "Part").unwrap();
    writer.leaf("name", "A & B").unwrap();
    writer.start("state").unwrap();
    writer.end_element().unwrap();
    writer.end_element().unwrap();
    assert_eq!(
        writer.into_string().unwrap(),
        r#"<Item type="Part"><name>A &amp; B</name><state/></Item>"#
    );
}

#[test]
fn test_writer_rejects_unbalanced() {
    let mut writer = XmlTextWriter::new();
    writer.start("Item").unwrap();
    assert!(writer.into_string().is_err());
    let mut writer = XmlTextWriter::new();
    assert!(writer.end_element().is_err());
}

#[test]
fn test_writer_declares_namespace_once() {
    let mut writer = XmlTextWriter::new();
    writer.start_element("a", "root", "urn:x").unwrap();
    writer.start_element("a", "child", "urn:x").unwrap();
    writer.end_element().unwrap();
    writer.end_element().unwrap();
    assert_eq!(
        writer.into_string().unwrap(),
        r#"<a:root xmlns:a="urn:x"><a:child/></a:root>"#
    );
}

#[test]
fn test_read_into_recorder() {
    let mut recorder = EventRecorder::new();
    read_xml("<Item type='Part'><id>ABC</id></Item>", &mut recorder).unwrap();
    assert_eq!(
        recorder.events,
        vec![
            XmlEvent::StartElement {
                prefix: String::new(),
                local_name: "Item".to_string(),
                namespace: String::new(),
            },
            XmlEvent::StartAttribute {
                prefix: String::new(),
                local_name: "type".to_string(),
                namespace: String::new(),
            },
            XmlEvent::Text("Part".to_string()),
            XmlEvent::EndAttribute,
            XmlEvent::StartElement {
                prefix: String::new(),
                local_name: "id".to_string(),
                namespace: String::new(),
            },
            XmlEvent::Text("ABC".to_string()),
            XmlEvent::EndElement,
            XmlEvent::EndElement,
        ]
    );
}

#[test]
fn test_replay_through_writer() {
    let mut recorder = EventRecorder::new();
    read_xml(
        "<AML>\n  <Item type=\"Part\" action=\"get\">\n    <name>&lt;x&gt;</name>\n  </Item>\n</AML>",
        &mut recorder,
    )
    .unwrap();
    let mut writer = XmlTextWriter::new();
    recorder.replay(&mut writer).unwrap();
    assert_eq!(
        writer.into_string().unwrap(),
        r#"<AML><Item type="Part" action="get"><name>&lt;x&gt;</name></Item></AML>"#
    );
}

#[test]
fn test_read_malformed_is_xml_error() {
    let mut recorder = EventRecorder::new();
    let err = read_xml("<Item><id></Item>", &mut recorder).unwrap_err();
    assert!(matches!(err, crate::QueryError::Xml(_)));
}

#[test]
fn test_element_tree() {
    let root = Element::parse(
        r#"<qry_QueryItem ref_id="A"><alias>Part</alias><item_type keyed_name="Part">1</item_type></qry_QueryItem>"#,
    )
    .unwrap();
    assert_eq!(root.attr("ref_id"), Some("A"));
    assert_eq!(root.value("alias"), Some("Part"));
    assert_eq!(root.value("ref_id"), Some("A"));
    assert_eq!(
        root.child("item_type").and_then(|c| c.attr("keyed_name")),
        Some("Part")
    );
}
