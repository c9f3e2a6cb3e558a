//! `stack.xml`
//!
//! Only the subset of OpenRaster that a flat layer stack needs: one `<image>`
//! with `<layer>` elements, top-most first. The reader is a small attribute
//! scanner rather than a full XML parser; nested `<stack>` elements are
//! flattened in document order.

use std::fmt::Write as _;

use crate::error::{PaintError, Result};

pub const STACK_VERSION: &str = "0.0.1";

/// One `<layer>` element
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestLayer {
    pub name: String,
    pub src: String,
    pub x: i32,
    pub y: i32,
    pub opacity: f32,
    pub visible: bool,
}

impl ManifestLayer {
    pub fn new(name: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            src: src.into(),
            x: 0,
            y: 0,
            opacity: 1.0,
            visible: true,
        }
    }
}

/// Parsed `stack.xml`
#[derive(Debug, Clone, PartialEq)]
pub struct StackManifest {
    pub width: u32,
    pub height: u32,
    pub version: String,
    /// Top-most first
    pub layers: Vec<ManifestLayer>,
}

impl StackManifest {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            version: STACK_VERSION.to_string(),
            layers: Vec::new(),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            xml,
            "<image w=\"{}\" h=\"{}\" version=\"{}\">",
            self.width,
            self.height,
            escape(&self.version)
        );
        xml.push_str("  <stack>\n");
        for layer in &self.layers {
            let _ = writeln!(
                xml,
                "    <layer name=\"{}\" src=\"{}\" x=\"{}\" y=\"{}\" opacity=\"{}\" visible=\"{}\"/>",
                escape(&layer.name),
                escape(&layer.src),
                layer.x,
                layer.y,
                format_opacity(layer.opacity),
                layer.visible
            );
        }
        xml.push_str("  </stack>\n</image>\n");
        xml
    }

    /// Parse `stack.xml` text
    ///
    /// # Errors
    /// `ManifestFormat` when there is no `<image>` element with numeric `w`
    /// and `h`, a layer has no `src`, or an attribute is malformed.
    pub fn parse(xml: &str) -> Result<Self> {
        let image_attrs = find_elements(xml, "image")?
            .into_iter()
            .next()
            .ok_or_else(|| manifest_error("missing <image> element"))?;
        let image_attrs = parse_attributes(image_attrs)?;

        let width = required_number(&image_attrs, "w")?;
        let height = required_number(&image_attrs, "h")?;
        let version = lookup(&image_attrs, "version").unwrap_or(STACK_VERSION).to_string();

        let mut layers = Vec::new();
        for body in find_elements(xml, "layer")? {
            let attrs = parse_attributes(body)?;
            let src = lookup(&attrs, "src")
                .ok_or_else(|| manifest_error("layer without src"))?
                .to_string();
            let name = lookup(&attrs, "name").unwrap_or_default().to_string();
            let x = optional_number(&attrs, "x")?.unwrap_or(0);
            let y = optional_number(&attrs, "y")?.unwrap_or(0);
            let opacity = match lookup(&attrs, "opacity") {
                Some(v) => v
                    .trim()
                    .parse::<f32>()
                    .map_err(|_| manifest_error(format!("bad opacity '{v}'")))?
                    .clamp(0.0, 1.0),
                None => 1.0,
            };
            // `visible="true|false"`, or OpenRaster's `visibility="visible|hidden"`
            let visible = match (lookup(&attrs, "visible"), lookup(&attrs, "visibility")) {
                (Some(v), _) => v != "false",
                (None, Some(v)) => v != "hidden",
                (None, None) => true,
            };
            layers.push(ManifestLayer {
                name,
                src,
                x,
                y,
                opacity,
                visible,
            });
        }

        Ok(Self {
            width,
            height,
            version,
            layers,
        })
    }
}

fn format_opacity(opacity: f32) -> String {
    if opacity.fract() == 0.0 {
        format!("{opacity:.1}")
    } else {
        format!("{opacity}")
    }
}

fn manifest_error(reason: impl Into<String>) -> PaintError {
    PaintError::ManifestFormat { reason: reason.into() }
}

fn lookup<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn required_number<T: std::str::FromStr>(attrs: &[(String, String)], key: &str) -> Result<T> {
    optional_number(attrs, key)?.ok_or_else(|| manifest_error(format!("<image> missing '{key}'")))
}

fn optional_number<T: std::str::FromStr>(attrs: &[(String, String)], key: &str) -> Result<Option<T>> {
    lookup(attrs, key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| manifest_error(format!("bad number for '{key}': '{v}'")))
        })
        .transpose()
}

/// Escape text for use inside a double-quoted attribute
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Resolve the five predefined entities and numeric character references
pub fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| manifest_error(format!("unterminated entity in '{text}'")))?;
        let entity = &after[..semi];
        let decoded = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| manifest_error(format!("unknown entity '&{entity};'")))?
            }
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Attribute text of every `<name ...>` start tag, in document order
fn find_elements<'a>(xml: &'a str, name: &str) -> Result<Vec<&'a str>> {
    let open = format!("<{name}");
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(pos) = xml[from..].find(&open) {
        let start = from + pos + open.len();
        let boundary = xml[start..].chars().next();
        if !matches!(boundary, Some(c) if c.is_whitespace() || c == '/' || c == '>') {
            from = start;
            continue;
        }
        let end = tag_end(xml, start).ok_or_else(|| manifest_error(format!("unterminated <{name}> tag")))?;
        found.push(xml[start..end].trim_end_matches('/'));
        from = end + 1;
    }
    Ok(found)
}

/// Index of the `>` closing a tag whose attributes start at `start`,
/// skipping quoted values
fn tag_end(xml: &str, start: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in xml[start..].char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(start + i),
            _ => {}
        }
    }
    None
}

fn parse_attributes(body: &str) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    let mut rest = body.trim();
    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| manifest_error(format!("attribute without value in '{body}'")))?;
        let key = rest[..eq].trim().to_string();
        let value_part = rest[eq + 1..].trim_start();
        let quote = value_part
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| manifest_error(format!("unquoted value for '{key}'")))?;
        let close = value_part[1..]
            .find(quote)
            .ok_or_else(|| manifest_error(format!("unterminated value for '{key}'")))?;
        let value = unescape(&value_part[1..1 + close])?;
        attrs.push((key, value));
        rest = value_part[close + 2..].trim_start();
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> StackManifest {
        let mut manifest = StackManifest::new(640, 480);
        manifest.layers.push(ManifestLayer::new("Ink & \"Lines\"", "data/layer0.png"));
        let mut hidden = ManifestLayer::new("Sketch", "data/layer1.png");
        hidden.visible = false;
        hidden.opacity = 0.25;
        manifest.layers.push(hidden);
        manifest
    }

    #[test]
    fn test_xml_shape() {
        let xml = sample().to_xml();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<image w=\"640\" h=\"480\" version=\"0.0.1\">"));
        assert!(xml.contains(
            "<layer name=\"Ink &amp; &quot;Lines&quot;\" src=\"data/layer0.png\" x=\"0\" y=\"0\" opacity=\"1.0\" visible=\"true\"/>"
        ));
        assert!(xml.contains("opacity=\"0.25\" visible=\"false\""));
    }

    #[test]
    fn test_parse_own_output() {
        let manifest = sample();
        assert_eq!(StackManifest::parse(&manifest.to_xml()).unwrap(), manifest);
    }

    #[test]
    fn test_parse_foreign_stack() {
        let xml = r#"<?xml version='1.0' encoding='UTF-8'?>
<image version="0.0.3" w="100" h="50" xres="72">
 <stack name="root">
  <stack name="group">
   <layer composite-op="svg:src-over" name="a > b" opacity="0.5" src="data/a.png" visibility="hidden" x="10" y="-4" />
  </stack>
  <layer name="bg" src="data/bg.png"/>
 </stack>
</image>"#;
        let manifest = StackManifest::parse(xml).unwrap();
        assert_eq!((manifest.width, manifest.height), (100, 50));
        assert_eq!(manifest.layers.len(), 2);
        let a = &manifest.layers[0];
        assert_eq!(a.name, "a > b");
        assert!(!a.visible);
        assert_eq!((a.x, a.y), (10, -4));
        assert_eq!(manifest.layers[1].src, "data/bg.png");
        assert!(manifest.layers[1].visible);
    }

    #[test]
    fn test_missing_size_rejected() {
        let err = StackManifest::parse("<image><stack/></image>").unwrap_err();
        assert_eq!(err.error_code(), "MANIFEST_FORMAT");
    }

    #[test]
    fn test_unescape_numeric() {
        assert_eq!(unescape("caf&#233; &#x41;&lt;").unwrap(), "café A<");
        assert!(unescape("&bogus;").is_err());
    }
}
