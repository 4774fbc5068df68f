use crate::error::{Error, Result};
use crate::model::Document;
use crate::options::Format;

pub fn render(document: &Document, format: Format) -> Result<String> {
    match format {
        Format::Json => serde_json::to_string_pretty(document)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| Error::Render(e.to_string())),
        Format::Yaml => serde_yaml::to_string(document).map_err(|e| Error::Render(e.to_string())),
    }
}

/// Parse a base or override document, YAML or JSON.
///
/// YAML is first read into a JSON value: plain keys such as `200:` then
/// arrive as strings, which the typed model requires.
pub fn parse_document(kind: &'static str, bytes: &[u8]) -> Result<Document> {
    let invalid = |message: String| Error::InvalidDocument { kind, message };
    let value: serde_json::Value =
        serde_yaml::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = r#"
openapi: 3.1.0
info:
  title: Base
  version: 1.2.3
paths:
  /health:
    get:
      responses:
        200:
          description: ok
components:
  schemas:
    Shared:
      type: object
      x-origin: base
"#;

    #[test]
    fn yaml_documents_with_numeric_status_keys_parse() {
        let document = parse_document("base", BASE.as_bytes()).unwrap();
        assert_eq!(document.info.title, "Base");
        let get = document.paths["/health"].get.as_ref().unwrap();
        assert_eq!(get.responses["200"].description, "ok");
        assert_eq!(
            document.components.schemas["Shared"].extensions["x-origin"],
            serde_json::json!("base")
        );
    }

    #[test]
    fn json_and_yaml_render_the_same_document() {
        let document = parse_document("base", BASE.as_bytes()).unwrap();
        let json = render(&document, Format::Json).unwrap();
        let yaml = render(&document, Format::Yaml).unwrap();
        assert_eq!(parse_document("base", json.as_bytes()).unwrap(), document);
        assert_eq!(parse_document("base", yaml.as_bytes()).unwrap(), document);
        assert!(json.ends_with("}\n"));
    }

    #[test]
    fn garbage_is_an_invalid_document() {
        assert!(matches!(
            parse_document("override", b"info: [unclosed"),
            Err(Error::InvalidDocument { kind: "override", .. })
        ));
    }
}
