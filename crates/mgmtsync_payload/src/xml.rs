//! XML payload helpers built on `quick-xml`.
//!
//! Management payloads are flat: the fields of interest are the direct
//! children of the root element. Namespace prefixes are ignored when matching
//! element names.

use crate::error::{PayloadError, PayloadResult};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

/// A direct child of the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootChild {
    /// Local name of the element.
    pub name: String,
    /// Text content, or `None` when the element has child elements.
    pub text: Option<String>,
}

/// Returns the direct children of the root element in document order.
pub fn root_children(xml: &str) -> PayloadResult<Vec<RootChild>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut children = Vec::new();
    let mut depth = 0usize;
    let mut current: Option<RootChild> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == 2 {
                    current = Some(RootChild {
                        name: local_name(e.local_name().as_ref()),
                        text: Some(String::new()),
                    });
                } else if depth > 2 {
                    if let Some(child) = current.as_mut() {
                        child.text = None;
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if depth == 1 {
                    children.push(RootChild {
                        name: local_name(e.local_name().as_ref()),
                        text: Some(String::new()),
                    });
                } else if depth > 1 {
                    if let Some(child) = current.as_mut() {
                        child.text = None;
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if depth == 2 {
                    let text = e.unescape().map_err(|e| PayloadError::xml(e.to_string()))?;
                    if let Some(buf) = current.as_mut().and_then(|c| c.text.as_mut()) {
                        buf.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if depth == 2 {
                    let raw = e.into_inner();
                    if let Some(buf) = current.as_mut().and_then(|c| c.text.as_mut()) {
                        buf.push_str(&String::from_utf8_lossy(&raw));
                    }
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some(child) = current.take() {
                        children.push(child);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PayloadError::xml(e.to_string())),
            Ok(_) => {}
        }
    }

    if depth != 0 {
        return Err(PayloadError::xml("unexpected end of document"));
    }
    Ok(children)
}

/// Returns the text of the first direct child of the root named `name`.
pub fn root_child_text(xml: &str, name: &str) -> PayloadResult<Option<String>> {
    Ok(root_children(xml)?
        .into_iter()
        .find(|child| child.name == name)
        .and_then(|child| child.text))
}

/// Rewrites `xml` without the direct children of the root named in `names`.
pub fn exclude_root_children(xml: &str, names: &[&str]) -> PayloadResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    let mut depth = 0usize;
    let mut skipping: Option<usize> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| PayloadError::xml(e.to_string()))?;
        match &event {
            Event::Eof => break,
            Event::Start(e) => {
                depth += 1;
                if skipping.is_none()
                    && depth == 2
                    && names.contains(&local_name(e.local_name().as_ref()).as_str())
                {
                    skipping = Some(depth);
                    continue;
                }
            }
            Event::End(_) => {
                let closing = depth;
                depth = depth.saturating_sub(1);
                if let Some(level) = skipping {
                    if closing == level {
                        skipping = None;
                    }
                    continue;
                }
            }
            Event::Empty(e) => {
                if skipping.is_none()
                    && depth == 1
                    && names.contains(&local_name(e.local_name().as_ref()).as_str())
                {
                    continue;
                }
            }
            _ => {}
        }
        if skipping.is_some() {
            continue;
        }
        writer
            .write_event(event)
            .map_err(|e| PayloadError::xml(e.to_string()))?;
    }

    String::from_utf8(writer.into_inner()).map_err(|e| PayloadError::xml(e.to_string()))
}

/// Converts a raw element name to an owned string.
pub(crate) fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLE: &str = r#"<role-properties xmlns="http://marklogic.com/manage/role/properties">
  <role-name>sample-app-role1</role-name>
  <description>First &amp; best</description>
  <privileges>
    <privilege><privilege-name>rest-reader</privilege-name></privilege>
  </privileges>
  <compartment/>
</role-properties>"#;

    #[test]
    fn reads_direct_children() {
        let children = root_children(ROLE).unwrap();
        let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["role-name", "description", "privileges", "compartment"]);
        assert_eq!(children[1].text.as_deref(), Some("First & best"));
        assert_eq!(children[2].text, None);
        assert_eq!(children[3].text.as_deref(), Some(""));
    }

    #[test]
    fn field_lookup_ignores_prefixes() {
        let xml = r#"<m:user xmlns:m="urn:x"><m:user-name>jane</m:user-name></m:user>"#;
        assert_eq!(
            root_child_text(xml, "user-name").unwrap().as_deref(),
            Some("jane")
        );
        assert_eq!(root_child_text(xml, "password").unwrap(), None);
    }

    #[test]
    fn nested_elements_are_not_root_fields() {
        assert_eq!(root_child_text(ROLE, "privilege-name").unwrap(), None);
    }

    #[test]
    fn cdata_is_field_text() {
        let xml = "<task><task-path><![CDATA[/a b.xqy]]></task-path></task>";
        assert_eq!(
            root_child_text(xml, "task-path").unwrap().as_deref(),
            Some("/a b.xqy")
        );
    }

    #[test]
    fn exclude_removes_whole_subtrees() {
        let out = exclude_root_children(ROLE, &["privileges", "compartment"]).unwrap();
        assert!(!out.contains("privilege"));
        assert!(!out.contains("compartment"));
        assert!(out.contains("<role-name>sample-app-role1</role-name>"));
        assert!(out.contains("First &amp; best"));
        let names: Vec<_> = root_children(&out)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["role-name", "description"]);
    }

    #[test]
    fn exclude_only_touches_root_children() {
        let xml = "<a><b><c>1</c></b><c>2</c></a>";
        let out = exclude_root_children(xml, &["c"]).unwrap();
        assert_eq!(out, "<a><b><c>1</c></b></a>");
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            root_children("<a><b></a>"),
            Err(PayloadError::Xml { .. })
        ));
    }
}
