//! Binary STL primitives.
//!
//! Layout: an 80 byte header, a little-endian `u32` triangle count, then 50
//! bytes per triangle (normal and three vertices as little-endian `f32`
//! triples, followed by a zero `u16` attribute).

use std::io::{self, Write};

/// Length of the STL header.
pub const HEADER_LEN: usize = 80;

/// Length of one triangle record.
pub const TRIANGLE_LEN: usize = 50;

/// Header text written by [`crate::MeshBuilder`].
pub const DEFAULT_HEADER: &str = "Generated by demstl";

/// A point (or direction) in mesh space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn sub(self, other: Vertex) -> Vertex {
        Vertex::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    fn cross(self, other: Vertex) -> Vertex {
        Vertex::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Dot product.
    pub fn dot(self, other: Vertex) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.x.to_le_bytes())?;
        w.write_all(&self.y.to_le_bytes())?;
        w.write_all(&self.z.to_le_bytes())
    }
}

/// A facet and its normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub normal: Vertex,
    pub vertices: [Vertex; 3],
}

impl Triangle {
    /// Triangle with normal `(v2 - v1) × (v3 - v1)`, not normalized.
    pub fn new(v1: Vertex, v2: Vertex, v3: Vertex) -> Self {
        let normal = v2.sub(v1).cross(v3.sub(v1));
        Self {
            normal,
            vertices: [v1, v2, v3],
        }
    }

    /// Same triangle with a unit normal. Degenerate triangles keep a zero
    /// normal.
    pub fn with_unit_normal(self) -> Self {
        let len = self.normal.length();
        let normal = if len > 0.0 {
            Vertex::new(self.normal.x / len, self.normal.y / len, self.normal.z / len)
        } else {
            Vertex::default()
        };
        Self { normal, ..self }
    }

    /// Centroid of the three vertices.
    pub fn centroid(&self) -> Vertex {
        let [a, b, c] = self.vertices;
        Vertex::new(
            (a.x + b.x + c.x) / 3.0,
            (a.y + b.y + c.y) / 3.0,
            (a.z + b.z + c.z) / 3.0,
        )
    }

    /// Write the 50 byte record.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.normal.write_to(w)?;
        for v in &self.vertices {
            v.write_to(w)?;
        }
        w.write_all(&0u16.to_le_bytes())
    }
}

/// Streams triangles into a binary STL.
///
/// The triangle count is written up front, so the writer checks that
/// exactly that many triangles follow.
pub struct StlWriter<W: Write> {
    inner: W,
    expected: u32,
    written: u32,
}

impl<W: Write> StlWriter<W> {
    /// Write the header and triangle count. `header` is truncated to 80
    /// bytes and zero padded.
    pub fn new(mut inner: W, header: &str, triangle_count: u32) -> io::Result<Self> {
        let mut bytes = [0u8; HEADER_LEN];
        let text = header.as_bytes();
        let len = text.len().min(HEADER_LEN);
        bytes[..len].copy_from_slice(&text[..len]);
        inner.write_all(&bytes)?;
        inner.write_all(&triangle_count.to_le_bytes())?;
        Ok(Self {
            inner,
            expected: triangle_count,
            written: 0,
        })
    }

    /// Append one triangle.
    pub fn write_triangle(&mut self, triangle: &Triangle) -> io::Result<()> {
        if self.written == self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("more than the declared {} triangles", self.expected),
            ));
        }
        triangle.write_to(&mut self.inner)?;
        self.written += 1;
        Ok(())
    }

    /// Triangles written so far.
    pub fn written(&self) -> u32 {
        self.written
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.written != self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "declared {} triangles but wrote {}",
                    self.expected, self.written
                ),
            ));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}
