//! Minimal KML reader for land boundary polygons.
//!
//! Only the document structure and polygon outer boundaries are kept:
//! `kml`, `Document` and `Folder` become [`KmlNode::Group`], `Placemark`
//! becomes [`KmlNode::Feature`] with the `outerBoundaryIs` rings of its
//! polygons (directly or inside a `MultiGeometry`). Holes are ignored.

use crate::land::LandPolygon;
use crate::{MeshError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A node of a KML document.
#[derive(Debug, Clone, PartialEq)]
pub enum KmlNode {
    /// Container of other nodes.
    Group {
        /// Child nodes in document order.
        children: Vec<KmlNode>,
    },
    /// A placemark and its polygon outer boundaries.
    Feature {
        /// Outer boundary of each polygon.
        polygons: Vec<LandPolygon>,
    },
}

impl KmlNode {
    /// All polygons below this node, depth first in document order.
    pub fn polygons(&self) -> Vec<LandPolygon> {
        let mut out = Vec::new();
        self.collect_polygons(&mut out);
        out
    }

    fn collect_polygons(&self, out: &mut Vec<LandPolygon>) {
        match self {
            KmlNode::Group { children } => {
                for child in children {
                    child.collect_polygons(out);
                }
            }
            KmlNode::Feature { polygons } => out.extend(polygons.iter().cloned()),
        }
    }
}

/// Parse a KML file.
pub fn parse_file(path: &Path) -> Result<KmlNode> {
    let file = File::open(path)?;
    parse(Reader::from_reader(BufReader::new(file)))
}

/// Parse KML text.
pub fn parse_str(text: &str) -> Result<KmlNode> {
    parse(Reader::from_reader(text.as_bytes()))
}

fn parse<R: BufRead>(mut reader: Reader<R>) -> Result<KmlNode> {
    // Root group collects top-level nodes
    let mut stack = vec![KmlNode::Group {
        children: Vec::new(),
    }];
    let mut outer_depth = 0usize;
    let mut inner_depth = 0usize;
    let mut coordinates: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"kml" | b"Document" | b"Folder" => stack.push(KmlNode::Group {
                    children: Vec::new(),
                }),
                b"Placemark" => stack.push(KmlNode::Feature {
                    polygons: Vec::new(),
                }),
                b"outerBoundaryIs" => outer_depth += 1,
                b"innerBoundaryIs" => inner_depth += 1,
                b"coordinates" => coordinates = Some(String::new()),
                _ => {}
            },
            Event::Text(t) => {
                if let Some(text) = coordinates.as_mut() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| MeshError::Kml(e.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(c) => {
                if let Some(text) = coordinates.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"kml" | b"Document" | b"Folder" | b"Placemark" => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| MeshError::Kml("unbalanced document".to_string()))?;
                    match stack.last_mut() {
                        Some(KmlNode::Group { children }) => children.push(node),
                        _ => {
                            return Err(MeshError::Kml(
                                "container nested inside a placemark".to_string(),
                            ))
                        }
                    }
                }
                b"outerBoundaryIs" => outer_depth = outer_depth.saturating_sub(1),
                b"innerBoundaryIs" => inner_depth = inner_depth.saturating_sub(1),
                b"coordinates" => {
                    let text = coordinates.take().unwrap_or_default();
                    if outer_depth > 0 && inner_depth == 0 {
                        if let Some(KmlNode::Feature { polygons }) = stack.last_mut() {
                            polygons.push(LandPolygon::new(parse_coordinates(&text)?));
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(MeshError::Kml("unexpected end of document".to_string()));
    }
    stack
        .pop()
        .ok_or_else(|| MeshError::Kml("empty document".to_string()))
}

/// Parse whitespace separated `lon,lat[,alt]` tuples.
fn parse_coordinates(text: &str) -> Result<Vec<(f64, f64)>> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let lon = parts.next().and_then(|v| v.parse::<f64>().ok());
            let lat = parts.next().and_then(|v| v.parse::<f64>().ok());
            lon.zip(lat)
                .ok_or_else(|| MeshError::Kml(format!("bad coordinate tuple '{}'", tuple)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>land</name>
    <Folder>
      <Folder>
        <Placemark>
          <name>island</name>
          <Polygon>
            <outerBoundaryIs><LinearRing><coordinates>
              0,0 1,0 1,1 0,1 0,0
            </coordinates></LinearRing></outerBoundaryIs>
            <innerBoundaryIs><LinearRing><coordinates>
              0.4,0.4 0.6,0.4 0.6,0.6 0.4,0.4
            </coordinates></LinearRing></innerBoundaryIs>
          </Polygon>
        </Placemark>
      </Folder>
    </Folder>
    <Placemark>
      <MultiGeometry>
        <Polygon><outerBoundaryIs><LinearRing>
          <coordinates>10,10,0 11,10,0 11,11,0 10,10,0</coordinates>
        </LinearRing></outerBoundaryIs></Polygon>
        <Polygon><outerBoundaryIs><LinearRing>
          <coordinates>20,20 21,20 21,21 20,20</coordinates>
        </LinearRing></outerBoundaryIs></Polygon>
      </MultiGeometry>
    </Placemark>
    <Placemark><Point><coordinates>5,5</coordinates></Point></Placemark>
  </Document>
</kml>"#;

    #[test]
    fn test_nested_folders_flatten() {
        let root = parse_str(NESTED).unwrap();
        let polygons = root.polygons();
        assert_eq!(polygons.len(), 3);
        assert_eq!(polygons[0].ring().len(), 5);
        assert_eq!(polygons[1].ring()[1], (11.0, 10.0));
        assert_eq!(polygons[2].ring()[0], (20.0, 20.0));
    }

    #[test]
    fn test_tree_shape() {
        let root = parse_str(NESTED).unwrap();
        // root -> kml -> Document
        let KmlNode::Group { children } = &root else {
            panic!("root is not a group");
        };
        let KmlNode::Group { children } = &children[0] else {
            panic!("kml is not a group");
        };
        let KmlNode::Group { children } = &children[0] else {
            panic!("Document is not a group");
        };
        assert_eq!(children.len(), 3);
        assert!(matches!(&children[0], KmlNode::Group { .. }));
        assert!(matches!(&children[1], KmlNode::Feature { polygons } if polygons.len() == 2));
        assert!(matches!(&children[2], KmlNode::Feature { polygons } if polygons.is_empty()));
    }

    #[test]
    fn test_bad_coordinates() {
        let text = "<kml><Placemark><Polygon><outerBoundaryIs><LinearRing>\
                    <coordinates>0,0 x,1 1,1</coordinates>\
                    </LinearRing></outerBoundaryIs></Polygon></Placemark></kml>";
        assert!(matches!(parse_str(text), Err(MeshError::Kml(_))));
    }

    #[test]
    fn test_mismatched_tags() {
        assert!(parse_str("<kml><Folder></kml>").is_err());
    }
}
